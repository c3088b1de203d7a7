//! Local proxies for remote bus objects.
//!
//! An [`ObjectProxy`] binds a destination and object path to a
//! connection and owns the interfaces registered for that object. The
//! interface collection is an insertion-ordered multimap: several
//! interfaces may share a name (deliberately, e.g. while migrating
//! between two revisions of an interface), and `interface(name)` returns
//! the first one registered. One interface may be marked as the default
//! and is used by the operations that take no interface name.
//!
//! Locking: the interface multimap sits behind a reader/writer lock held
//! only for structural changes; the identity fields (connection,
//! destination, path, default interface) have their own lock because they
//! are read on every call construction and written rarely. Notifications
//! always fire after locks are released, and no lock is held while a
//! blocking call waits on the connection.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use log::debug;
use zvariant::{OwnedObjectPath, OwnedValue};

use crate::connection::{Connection, PendingCall};
use crate::events::{EventRegistry, SubscriptionId};
use crate::interface::{InterfaceProxy, InterfaceRenamed};
use crate::message::{CallMessage, ReturnMessage};
use crate::method::{MethodProxy, MethodProxyBase};
use crate::models::{parse_object_path, ProxyError};
use crate::signal::SignalProxy;
use crate::signature::{ArgList, MethodReturn};

/// Payload of the default-interface notification channel.
#[derive(Clone)]
pub struct DefaultInterfaceChanged {
    pub previous: Option<Arc<InterfaceProxy>>,
    pub current: Option<Arc<InterfaceProxy>>,
}

struct Identity {
    connection: Option<Arc<dyn Connection>>,
    destination: String,
    path: OwnedObjectPath,
    default_interface: Option<Arc<InterfaceProxy>>,
}

struct InterfaceEntry {
    /// Registration key, kept in sync with the interface's own name by
    /// the rename subscription.
    key: String,
    interface: Arc<InterfaceProxy>,
}

pub struct ObjectProxy {
    identity: Mutex<Identity>,
    interfaces: RwLock<Vec<InterfaceEntry>>,
    rename_subscriptions: Mutex<Vec<(usize, SubscriptionId)>>,
    interface_added: EventRegistry<Arc<InterfaceProxy>>,
    interface_removed: EventRegistry<Arc<InterfaceProxy>>,
    default_changed: EventRegistry<DefaultInterfaceChanged>,
}

/// Builder for [`ObjectProxy`]. A path is required; connection and
/// destination are optional and may be (re)bound later.
#[derive(Default)]
pub struct ObjectProxyBuilder {
    connection: Option<Arc<dyn Connection>>,
    destination: String,
    path: Option<OwnedObjectPath>,
}

impl ObjectProxyBuilder {
    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Bus name of the peer owning the object. An empty destination means
    /// "any owner".
    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Validates and sets the object path.
    pub fn path(mut self, path: &str) -> crate::Result<Self> {
        self.path = Some(parse_object_path(path)?);
        Ok(self)
    }

    pub fn build(self) -> crate::Result<Arc<ObjectProxy>> {
        let path = self
            .path
            .ok_or_else(|| ProxyError::InvalidPath(String::new()))?;
        Ok(Arc::new(ObjectProxy {
            identity: Mutex::new(Identity {
                connection: self.connection,
                destination: self.destination,
                path,
                default_interface: None,
            }),
            interfaces: RwLock::new(Vec::new()),
            rename_subscriptions: Mutex::new(Vec::new()),
            interface_added: EventRegistry::new(),
            interface_removed: EventRegistry::new(),
            default_changed: EventRegistry::new(),
        }))
    }
}

impl ObjectProxy {
    pub fn builder() -> ObjectProxyBuilder {
        ObjectProxyBuilder::default()
    }

    /// Creates a proxy for `path` with no destination or connection bound.
    pub fn create(path: &str) -> crate::Result<Arc<Self>> {
        Self::builder().path(path)?.build()
    }

    /// Creates a proxy for `path` owned by the peer named `destination`.
    pub fn create_with_destination(destination: &str, path: &str) -> crate::Result<Arc<Self>> {
        Self::builder().destination(destination).path(path)?.build()
    }

    // ---- identity ----

    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.identity()
            .connection
            .clone()
    }

    pub fn set_connection(&self, connection: Arc<dyn Connection>) {
        self.identity().connection = Some(connection);
    }

    pub fn destination(&self) -> String {
        self.identity().destination.clone()
    }

    pub fn set_destination(&self, destination: impl Into<String>) {
        self.identity().destination = destination.into();
    }

    pub fn path(&self) -> OwnedObjectPath {
        self.identity().path.clone()
    }

    /// Re-points the proxy at a different object path; validates first.
    pub fn set_path(&self, path: &str) -> crate::Result<()> {
        let path = parse_object_path(path)?;
        self.identity().path = path;
        Ok(())
    }

    fn identity(&self) -> std::sync::MutexGuard<'_, Identity> {
        self.identity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- interface collection ----

    /// Snapshot of the interface multimap in insertion order.
    pub fn interfaces(&self) -> Vec<(String, Arc<InterfaceProxy>)> {
        self.interfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| (entry.key.clone(), entry.interface.clone()))
            .collect()
    }

    /// The first interface registered under `name`.
    pub fn interface(&self, name: &str) -> Option<Arc<InterfaceProxy>> {
        self.interfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| entry.key == name)
            .map(|entry| entry.interface.clone())
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.interface(name).is_some()
    }

    pub fn has_interface_handle(&self, interface: &Arc<InterfaceProxy>) -> bool {
        self.interfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.interface, interface))
    }

    /// Adds `interface` to this object. Returns `false` without side
    /// effects when the same handle is already present. On success the
    /// object subscribes to the handle's renames (to keep its map keyed
    /// correctly) and emits an interface-added notification.
    pub fn add_interface(self: &Arc<Self>, interface: Arc<InterfaceProxy>) -> bool {
        {
            let mut interfaces = self
                .interfaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if interfaces
                .iter()
                .any(|entry| Arc::ptr_eq(&entry.interface, &interface))
            {
                return false;
            }
            interfaces.push(InterfaceEntry {
                key: interface.name(),
                interface: interface.clone(),
            });
        }

        interface.set_object(self);
        let weak = Arc::downgrade(self);
        let id = interface.on_renamed(move |renamed| {
            if let Some(object) = weak.upgrade() {
                object.rekey_interface(renamed);
            }
        });
        self.rename_subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Arc::as_ptr(&interface) as usize, id));

        debug!("interface {:?} added to {}", interface.name(), self.path());
        self.interface_added.emit(&interface);
        true
    }

    /// Creates a new empty interface named `name` and adds it. Always
    /// creates a fresh handle, even when an interface with the same name
    /// already exists.
    pub fn create_interface(self: &Arc<Self>, name: &str) -> crate::Result<Arc<InterfaceProxy>> {
        let interface = InterfaceProxy::create(name)?;
        self.add_interface(interface.clone());
        Ok(interface)
    }

    /// Removes the first interface registered under `name`, returning it.
    pub fn remove_interface(self: &Arc<Self>, name: &str) -> Option<Arc<InterfaceProxy>> {
        let removed = {
            let mut interfaces = self
                .interfaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let position = interfaces.iter().position(|entry| entry.key == name)?;
            interfaces.remove(position).interface
        };
        self.finish_removal(&removed);
        Some(removed)
    }

    /// Removes the given handle by identity. Returns `false` when it is
    /// not present.
    pub fn remove_interface_handle(self: &Arc<Self>, interface: &Arc<InterfaceProxy>) -> bool {
        let removed = {
            let mut interfaces = self
                .interfaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(position) = interfaces
                .iter()
                .position(|entry| Arc::ptr_eq(&entry.interface, interface))
            else {
                return false;
            };
            interfaces.remove(position).interface
        };
        self.finish_removal(&removed);
        true
    }

    fn finish_removal(&self, removed: &Arc<InterfaceProxy>) {
        let key = Arc::as_ptr(removed) as usize;
        let subscription = {
            let mut subscriptions = self
                .rename_subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscriptions
                .iter()
                .position(|(ptr, _)| *ptr == key)
                .map(|position| subscriptions.remove(position).1)
        };
        if let Some(id) = subscription {
            removed.unsubscribe_renamed(id);
        }
        removed.clear_object();

        debug!("interface {:?} removed from {}", removed.name(), self.path());
        self.interface_removed.emit(removed);

        let was_default = {
            let mut identity = self.identity();
            match &identity.default_interface {
                Some(current) if Arc::ptr_eq(current, removed) => {
                    identity.default_interface.take()
                }
                _ => None,
            }
        };
        if let Some(previous) = was_default {
            self.default_changed.emit(&DefaultInterfaceChanged {
                previous: Some(previous),
                current: None,
            });
        }
    }

    /// Re-keys the multimap entry for a renamed interface. The entry
    /// keeps its position, so insertion-order semantics survive the
    /// rename, and default-interface identity is deliberately untouched.
    fn rekey_interface(&self, renamed: &InterfaceRenamed) {
        let mut interfaces = self
            .interfaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = interfaces
            .iter_mut()
            .find(|entry| Arc::ptr_eq(&entry.interface, &renamed.interface))
        {
            entry.key = renamed.to.clone();
        }
    }

    // ---- default interface ----

    pub fn default_interface(&self) -> Option<Arc<InterfaceProxy>> {
        self.identity().default_interface.clone()
    }

    /// Marks the first interface registered under `new_default_name` as
    /// the default. Returns `false` when no such interface exists.
    pub fn set_default_interface(&self, new_default_name: &str) -> bool {
        match self.interface(new_default_name) {
            Some(interface) => self.set_default_interface_handle(&interface),
            None => false,
        }
    }

    /// Marks the given handle as the default. Returns `false` when it is
    /// not part of this object. Re-setting the current default is a
    /// successful no-op that emits nothing.
    pub fn set_default_interface_handle(&self, new_default: &Arc<InterfaceProxy>) -> bool {
        // The membership check and the swap must share one critical
        // section, or a concurrent removal can land between them and the
        // removed handle becomes a dangling default. Lock order is
        // interfaces then identity, same as finish_removal (which drops
        // the interfaces lock before taking identity), so this cannot
        // deadlock.
        let previous = {
            let interfaces = self
                .interfaces
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if !interfaces
                .iter()
                .any(|entry| Arc::ptr_eq(&entry.interface, new_default))
            {
                return false;
            }
            let mut identity = self.identity();
            if let Some(current) = &identity.default_interface {
                if Arc::ptr_eq(current, new_default) {
                    return true;
                }
            }
            identity.default_interface.replace(new_default.clone())
        };
        self.default_changed.emit(&DefaultInterfaceChanged {
            previous,
            current: Some(new_default.clone()),
        });
        true
    }

    /// Clears the default interface. Emits a default-changed notification
    /// only when one was actually set.
    pub fn remove_default_interface(&self) {
        let previous = self.identity().default_interface.take();
        if let Some(previous) = previous {
            self.default_changed.emit(&DefaultInterfaceChanged {
                previous: Some(previous),
                current: None,
            });
        }
    }

    // ---- methods ----

    /// Adds `method` to the named interface, creating the interface
    /// first when absent.
    pub fn add_method(
        self: &Arc<Self>,
        interface_name: &str,
        method: Arc<MethodProxyBase>,
    ) -> crate::Result<()> {
        let interface = match self.interface(interface_name) {
            Some(interface) => interface,
            None => self.create_interface(interface_name)?,
        };
        interface.add_method(method)
    }

    /// Adds `method` to the default interface. Fails with
    /// [`ProxyError::NoDefaultInterface`] when none is set.
    pub fn add_method_to_default(&self, method: Arc<MethodProxyBase>) -> crate::Result<()> {
        let interface = self
            .default_interface()
            .ok_or(ProxyError::NoDefaultInterface)?;
        interface.add_method(method)
    }

    /// Creates a typed method proxy on the named interface, creating the
    /// interface first when absent.
    pub fn create_method<R, A>(
        self: &Arc<Self>,
        interface_name: &str,
        method_name: &str,
    ) -> crate::Result<MethodProxy<R, A>>
    where
        R: MethodReturn,
        A: ArgList,
    {
        let interface = match self.interface(interface_name) {
            Some(interface) => interface,
            None => self.create_interface(interface_name)?,
        };
        interface.create_method(method_name)
    }

    /// Creates a typed signal proxy on the named interface, creating the
    /// interface first when absent.
    pub fn create_signal<A>(
        self: &Arc<Self>,
        interface_name: &str,
        signal_name: &str,
    ) -> crate::Result<Arc<SignalProxy<A>>>
    where
        A: ArgList,
    {
        let interface = match self.interface(interface_name) {
            Some(interface) => interface,
            None => self.create_interface(interface_name)?,
        };
        interface.create_signal(signal_name)
    }

    // ---- calls ----

    /// Builds an outbound call envelope addressed to this object. Pure
    /// data construction, no I/O.
    pub fn create_call_message(&self, interface: Option<&str>, method: &str) -> CallMessage {
        let identity = self.identity();
        let destination = if identity.destination.is_empty() {
            None
        } else {
            Some(identity.destination.as_str())
        };
        CallMessage::new(destination, identity.path.clone(), interface, method)
    }

    /// Sends `message` and blocks until the reply. No internal lock is
    /// held while waiting.
    pub fn call(
        &self,
        message: &CallMessage,
        timeout: Option<Duration>,
    ) -> crate::Result<ReturnMessage> {
        let connection = self.connection().ok_or(ProxyError::NoConnection)?;
        connection.send_blocking(message, timeout)
    }

    /// Sends `message` without blocking; completion and cancellation
    /// semantics are the connection's.
    pub fn call_async(
        &self,
        message: &CallMessage,
        timeout: Option<Duration>,
    ) -> crate::Result<PendingCall> {
        let connection = self.connection().ok_or(ProxyError::NoConnection)?;
        connection.send_async(message, timeout)
    }

    // ---- dispatch ----

    /// Routes an incoming signal to every interface registered under
    /// `interface_name`. Returns how many signal proxies fired.
    pub fn dispatch_signal(
        &self,
        interface_name: &str,
        member: &str,
        body: &[OwnedValue],
    ) -> usize {
        let targets: Vec<Arc<InterfaceProxy>> = self
            .interfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.key == interface_name)
            .map(|entry| entry.interface.clone())
            .collect();
        targets
            .into_iter()
            .filter(|interface| interface.dispatch_signal(member, body))
            .count()
    }

    // ---- notifications ----

    /// Observes interfaces being added.
    pub fn on_interface_added<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<InterfaceProxy>) + Send + Sync + 'static,
    {
        self.interface_added.subscribe(callback)
    }

    /// Observes interfaces being removed.
    pub fn on_interface_removed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<InterfaceProxy>) + Send + Sync + 'static,
    {
        self.interface_removed.subscribe(callback)
    }

    /// Observes default-interface swaps.
    pub fn on_default_interface_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DefaultInterfaceChanged) + Send + Sync + 'static,
    {
        self.default_changed.subscribe(callback)
    }

    /// Removes a subscription made through any of the `on_*` channels.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.interface_added.unsubscribe(id)
            || self.interface_removed.unsubscribe(id)
            || self.default_changed.unsubscribe(id)
    }
}

impl Drop for ObjectProxy {
    fn drop(&mut self) {
        let interfaces = std::mem::take(
            &mut *self
                .interfaces
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut subscriptions = std::mem::take(
            &mut *self
                .rename_subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for entry in interfaces {
            let key = Arc::as_ptr(&entry.interface) as usize;
            if let Some(position) = subscriptions.iter().position(|(ptr, _)| *ptr == key) {
                let (_, id) = subscriptions.remove(position);
                entry.interface.unsubscribe_renamed(id);
            }
            entry.interface.clear_object();
        }
    }
}
