//! Property handles: one remote (or locally exposed) property each.
//!
//! [`PropertyProxyBase`] is the storage form an interface keeps: name,
//! update policy, cached value, and the change-notification channels.
//! [`PropertyProxy`] is the typed wrapper; its accessors enforce that the
//! cached tagged-union value matches the statically requested type.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use log::warn;
use zvariant::{OwnedValue, Type, Value};

use crate::constants::PROPERTIES_INTERFACE;
use crate::events::{EventRegistry, SubscriptionId};
use crate::interface::InterfaceProxy;
use crate::models::{PropertyRole, PropertyUpdateType, ProxyError};

/// Outbound notification an adapter-role property emits when set locally.
#[derive(Debug, Clone)]
pub enum PropertyEvent {
    /// The property changed and the new value is carried in full.
    Changed { name: String, value: OwnedValue },
    /// The property changed but only an invalidation marker is sent;
    /// readers must fetch the value again.
    Invalidated { name: String },
}

/// Type-erased property handle.
pub struct PropertyProxyBase {
    name: String,
    update_type: PropertyUpdateType,
    role: PropertyRole,
    cached: Mutex<Option<OwnedValue>>,
    interface: RwLock<Weak<InterfaceProxy>>,
    // typed observers fire before generic ones on updated_value()
    typed_changed: EventRegistry<OwnedValue>,
    changed: EventRegistry<OwnedValue>,
    emissions: EventRegistry<PropertyEvent>,
}

impl PropertyProxyBase {
    /// Creates a detached property handle. The update policy and role are
    /// fixed for the handle's lifetime.
    pub fn create(name: &str, update_type: PropertyUpdateType, role: PropertyRole) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            update_type,
            role,
            cached: Mutex::new(None),
            interface: RwLock::new(Weak::new()),
            typed_changed: EventRegistry::new(),
            changed: EventRegistry::new(),
            emissions: EventRegistry::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_type(&self) -> PropertyUpdateType {
        self.update_type
    }

    pub fn role(&self) -> PropertyRole {
        self.role
    }

    /// The interface currently owning this property, if any.
    pub fn interface(&self) -> Option<Arc<InterfaceProxy>> {
        self.interface
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    pub(crate) fn set_interface(&self, interface: &Arc<InterfaceProxy>) {
        *self
            .interface
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(interface);
    }

    pub(crate) fn clear_interface(&self) {
        *self
            .interface
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }

    /// The last value seen for this property, as a tagged-union value.
    pub fn variant_value(&self) -> Option<OwnedValue> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets the property.
    ///
    /// On a proxy-role handle this forwards a `Properties.Set` call to
    /// the remote object through the owning interface; when the update
    /// policy is [`PropertyUpdateType::DoesNotUpdate`] the property is
    /// read-only and the write is a successful no-op (the remote side is
    /// authoritative and would ignore it anyway).
    ///
    /// On an adapter-role handle this stores the value and emits the
    /// notification shaped by the update policy: the full new value, a
    /// bare invalidation marker, or nothing.
    pub fn set_value(&self, value: OwnedValue) -> crate::Result<()> {
        match self.role {
            PropertyRole::Proxy => self.set_remote(value),
            PropertyRole::Adapter => {
                *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
                match self.update_type {
                    PropertyUpdateType::Updates => self.emissions.emit(&PropertyEvent::Changed {
                        name: self.name.clone(),
                        value,
                    }),
                    PropertyUpdateType::Invalidates => {
                        self.emissions.emit(&PropertyEvent::Invalidated {
                            name: self.name.clone(),
                        })
                    }
                    PropertyUpdateType::DoesNotUpdate => {}
                }
                Ok(())
            }
        }
    }

    fn set_remote(&self, value: OwnedValue) -> crate::Result<()> {
        if self.update_type == PropertyUpdateType::DoesNotUpdate {
            // read-only: fire and forget
            return Ok(());
        }
        let interface = self.interface().ok_or(ProxyError::Detached)?;
        let object = interface.object().ok_or(ProxyError::Detached)?;
        let mut msg = object.create_call_message(Some(PROPERTIES_INTERFACE), "Set");
        msg.append(interface.name())?;
        msg.append(self.name.clone())?;
        msg.append_value(value, "v");
        object.call(&msg, None)?;
        Ok(())
    }

    /// Called by the dispatch layer when a change notification arrives:
    /// stores the new value, then fires the typed observers followed by
    /// the generic ones.
    pub fn updated_value(&self, value: OwnedValue) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
        self.typed_changed.emit(&value);
        self.changed.emit(&value);
    }

    /// Observes every change as a tagged-union value.
    pub fn on_variant_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&OwnedValue) + Send + Sync + 'static,
    {
        self.changed.subscribe(callback)
    }

    /// Observes the adapter-role outbound notifications.
    pub fn on_emission<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyEvent) + Send + Sync + 'static,
    {
        self.emissions.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.typed_changed.unsubscribe(id)
            || self.changed.unsubscribe(id)
            || self.emissions.unsubscribe(id)
    }

    pub(crate) fn subscribe_typed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&OwnedValue) + Send + Sync + 'static,
    {
        self.typed_changed.subscribe(callback)
    }
}

/// Typed property handle over a shared [`PropertyProxyBase`].
pub struct PropertyProxy<T> {
    base: Arc<PropertyProxyBase>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyProxy<T>
where
    T: Type
        + Into<Value<'static>>
        + TryFrom<OwnedValue, Error = zvariant::Error>
        + Send
        + Sync
        + 'static,
{
    /// Wraps an untyped handle. Type agreement is checked at access time,
    /// not here.
    pub fn from_base(base: Arc<PropertyProxyBase>) -> Self {
        Self {
            base,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn base(&self) -> &Arc<PropertyProxyBase> {
        &self.base
    }

    /// Typed variant of [`PropertyProxyBase::set_value`].
    pub fn set_value(&self, value: T) -> crate::Result<()> {
        let value: Value<'static> = value.into();
        self.base.set_value(value.try_to_owned()?)
    }

    /// The cached value, decoded as `T`. Fails with
    /// [`ProxyError::TypeMismatch`] when the cached value's runtime type
    /// does not match, or [`ProxyError::NoCachedValue`] when nothing has
    /// been cached yet.
    pub fn value(&self) -> crate::Result<T> {
        let value = self
            .base
            .variant_value()
            .ok_or_else(|| ProxyError::NoCachedValue(self.base.name().to_string()))?;
        T::try_from(value).map_err(|e| {
            ProxyError::TypeMismatch(format!(
                "property {:?} cannot be read as {}: {e}",
                self.base.name(),
                std::any::type_name::<T>()
            ))
        })
    }

    /// Observes changes with the value already decoded as `T`. Changes
    /// whose runtime type does not decode are logged and skipped.
    pub fn on_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let property = self.base.name().to_string();
        self.base.subscribe_typed(move |value| {
            match T::try_from(value.clone()) {
                Ok(decoded) => callback(&decoded),
                Err(e) => warn!(
                    "change for property {property:?} does not decode as {}: {e}",
                    std::any::type_name::<T>()
                ),
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.base.unsubscribe(id)
    }
}

impl<T> Clone for PropertyProxy<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            _marker: PhantomData,
        }
    }
}
