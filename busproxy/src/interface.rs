//! One named interface of one remote object.
//!
//! An [`InterfaceProxy`] owns the method, signal, and property handles
//! registered under it and is itself owned by exactly one
//! [`ObjectProxy`](crate::object::ObjectProxy) at a time. Its name is
//! mutable; renaming notifies the owning object through the rename
//! channel so the object can re-key its interface map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use log::{debug, warn};
use zvariant::OwnedValue;

use crate::events::{EventRegistry, SubscriptionId};
use crate::method::{MethodProxy, MethodProxyBase};
use crate::models::{PropertyRole, PropertyUpdateType, ProxyError};
use crate::object::ObjectProxy;
use crate::property::{PropertyProxy, PropertyProxyBase};
use crate::signal::{ProxySignal, SignalProxy};
use crate::signature::{ArgList, MethodReturn};

/// Payload of the rename notification channel.
#[derive(Clone)]
pub struct InterfaceRenamed {
    pub from: String,
    pub to: String,
    pub interface: Arc<InterfaceProxy>,
}

pub struct InterfaceProxy {
    name: RwLock<String>,
    object: RwLock<Weak<ObjectProxy>>,
    methods: Mutex<HashMap<String, Arc<MethodProxyBase>>>,
    signals: Mutex<HashMap<String, Arc<dyn ProxySignal>>>,
    properties: Mutex<HashMap<String, Arc<PropertyProxyBase>>>,
    renamed: EventRegistry<InterfaceRenamed>,
}

impl InterfaceProxy {
    /// Creates an empty, detached interface with the given non-empty name.
    pub fn create(name: &str) -> crate::Result<Arc<Self>> {
        if name.is_empty() {
            return Err(ProxyError::InvalidInterfaceName);
        }
        Ok(Arc::new(Self {
            name: RwLock::new(name.to_string()),
            object: RwLock::new(Weak::new()),
            methods: Mutex::new(HashMap::new()),
            signals: Mutex::new(HashMap::new()),
            properties: Mutex::new(HashMap::new()),
            renamed: EventRegistry::new(),
        }))
    }

    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Renames the interface and notifies the rename channel with
    /// `(old, new, self)`. The method/signal/property collections are
    /// keyed by their own names and are left untouched.
    ///
    /// When the interface is owned by an object, the owner re-keys its
    /// map synchronously from the rename notification, so the re-key has
    /// completed by the time this returns. Between the name update and
    /// that notification a concurrent reader of the owner's map may
    /// still find this handle under the old key while [`name`] already
    /// reports the new one.
    ///
    /// [`name`]: InterfaceProxy::name
    pub fn set_name(self: &Arc<Self>, new_name: &str) -> crate::Result<()> {
        if new_name.is_empty() {
            return Err(ProxyError::InvalidInterfaceName);
        }
        let old = {
            let mut name = self.name.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *name, new_name.to_string())
        };
        if old == new_name {
            return Ok(());
        }
        debug!("interface {old:?} renamed to {new_name:?}");
        self.renamed.emit(&InterfaceRenamed {
            from: old,
            to: new_name.to_string(),
            interface: self.clone(),
        });
        Ok(())
    }

    /// The object currently owning this interface, if any.
    pub fn object(&self) -> Option<Arc<ObjectProxy>> {
        self.object
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    pub(crate) fn set_object(&self, object: &Arc<ObjectProxy>) {
        *self.object.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(object);
    }

    pub(crate) fn clear_object(&self) {
        *self.object.write().unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }

    /// Observes renames of this interface.
    pub fn on_renamed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&InterfaceRenamed) + Send + Sync + 'static,
    {
        self.renamed.subscribe(callback)
    }

    pub fn unsubscribe_renamed(&self, id: SubscriptionId) -> bool {
        self.renamed.unsubscribe(id)
    }

    // ---- methods ----

    /// Adds a pre-built method. Fails with
    /// [`ProxyError::DuplicateMethod`] when a method of the same name is
    /// already registered.
    pub fn add_method(self: &Arc<Self>, method: Arc<MethodProxyBase>) -> crate::Result<()> {
        let name = method.name().to_string();
        let mut methods = self.methods.lock().unwrap_or_else(PoisonError::into_inner);
        if methods.contains_key(&name) {
            return Err(ProxyError::DuplicateMethod(name));
        }
        method.set_interface(self);
        methods.insert(name, method);
        Ok(())
    }

    /// Creates a typed method proxy whose protocol signature is computed
    /// from `A` and registers it under `method_name`.
    pub fn create_method<R, A>(
        self: &Arc<Self>,
        method_name: &str,
    ) -> crate::Result<MethodProxy<R, A>>
    where
        R: MethodReturn,
        A: ArgList,
    {
        let debug_signature = format!(
            "{}({})",
            std::any::type_name::<R>(),
            A::type_names()
        );
        let base = MethodProxyBase::create(method_name, &A::signature(), &debug_signature);
        self.add_method(base.clone())?;
        Ok(MethodProxy::from_base(base))
    }

    pub fn method(&self, name: &str) -> Option<Arc<MethodProxyBase>> {
        self.methods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    // ---- signals ----

    /// Creates a typed signal proxy and registers it under `signal_name`.
    /// Fails with [`ProxyError::DuplicateSignal`] on a name collision.
    pub fn create_signal<A>(&self, signal_name: &str) -> crate::Result<Arc<SignalProxy<A>>>
    where
        A: ArgList,
    {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        if signals.contains_key(signal_name) {
            return Err(ProxyError::DuplicateSignal(signal_name.to_string()));
        }
        let signal = SignalProxy::<A>::create(signal_name);
        signals.insert(signal_name.to_string(), signal.clone());
        Ok(signal)
    }

    pub fn signal(&self, name: &str) -> Option<Arc<dyn ProxySignal>> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Typed signal lookup; `None` when the name is unknown or the stored
    /// signal was created with a different argument list.
    pub fn typed_signal<A>(&self, name: &str) -> Option<Arc<SignalProxy<A>>>
    where
        A: ArgList,
    {
        self.signal(name)
            .and_then(|signal| signal.as_any().downcast::<SignalProxy<A>>().ok())
    }

    pub fn has_signal(&self, name: &str) -> bool {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Delivers an incoming signal to the matching local proxy.
    ///
    /// Called by the bus dispatch thread once the interface name has
    /// matched. Returns `true` when a signal proxy of that name existed
    /// and its observers were fired; a body that does not decode against
    /// the proxy's signature is logged and dropped.
    pub fn dispatch_signal(&self, member: &str, body: &[OwnedValue]) -> bool {
        let Some(signal) = self.signal(member) else {
            return false;
        };
        match signal.dispatch(body) {
            Ok(()) => true,
            Err(e) => {
                warn!("incoming signal {member:?} on {:?} dropped: {e}", self.name());
                false
            }
        }
    }

    // ---- properties ----

    /// Adds a pre-built property handle. Fails with
    /// [`ProxyError::DuplicateProperty`] on a name collision.
    pub fn add_property(self: &Arc<Self>, property: Arc<PropertyProxyBase>) -> crate::Result<()> {
        let name = property.name().to_string();
        let mut properties = self
            .properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if properties.contains_key(&name) {
            return Err(ProxyError::DuplicateProperty(name));
        }
        property.set_interface(self);
        properties.insert(name, property);
        Ok(())
    }

    /// Creates a typed proxy-role property handle and registers it.
    pub fn create_property<T>(
        self: &Arc<Self>,
        property_name: &str,
        update_type: PropertyUpdateType,
    ) -> crate::Result<PropertyProxy<T>>
    where
        T: zvariant::Type
            + Into<zvariant::Value<'static>>
            + TryFrom<OwnedValue, Error = zvariant::Error>
            + Send
            + Sync
            + 'static,
    {
        let base = PropertyProxyBase::create(property_name, update_type, PropertyRole::Proxy);
        self.add_property(base.clone())?;
        Ok(PropertyProxy::from_base(base))
    }

    pub fn property(&self, name: &str) -> Option<Arc<PropertyProxyBase>> {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Cached value of the named property.
    pub fn property_value(&self, name: &str) -> crate::Result<OwnedValue> {
        let property = self
            .property(name)
            .ok_or_else(|| ProxyError::UnknownProperty(name.to_string()))?;
        property
            .variant_value()
            .ok_or_else(|| ProxyError::NoCachedValue(name.to_string()))
    }

    /// Pass-through to the named property's `set_value`.
    pub fn set_property_value(&self, name: &str, value: OwnedValue) -> crate::Result<()> {
        let property = self
            .property(name)
            .ok_or_else(|| ProxyError::UnknownProperty(name.to_string()))?;
        property.set_value(value)
    }

    /// Routes an incoming property change notification into the matching
    /// handle. Returns `false` when the property is unknown here.
    pub fn property_updated(&self, name: &str, value: OwnedValue) -> bool {
        match self.property(name) {
            Some(property) => {
                property.updated_value(value);
                true
            }
            None => {
                debug!("change for unknown property {name:?} on {:?}", self.name());
                false
            }
        }
    }
}

impl Drop for InterfaceProxy {
    fn drop(&mut self) {
        // Member handles may outlive the interface; clear their
        // back-references so they report detachment instead of holding a
        // dead weak link.
        for method in self
            .methods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            method.clear_interface();
        }
        for property in self
            .properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            property.clear_interface();
        }
    }
}
