//! Signal proxies: local observables fed by incoming bus signals.
//!
//! An interface stores its signals as [`ProxySignal`] trait objects so
//! the dispatch thread can deliver an opaque body without knowing the
//! concrete argument types; [`SignalProxy`] is the typed variant handed
//! back by `create_signal`, and typed retrieval downcasts at that
//! boundary only.

use std::any::Any;
use std::sync::Arc;

use zvariant::OwnedValue;

use crate::events::{EventRegistry, SubscriptionId};
use crate::signature::ArgList;

/// Capability surface every stored signal proxy exposes.
pub trait ProxySignal: Send + Sync {
    fn name(&self) -> &str;

    /// Protocol signature of the signal arguments.
    fn signature(&self) -> &str;

    /// Decodes `body` and fans it out to the local observers. Fails with
    /// a type mismatch when the body is not compatible with the signal's
    /// signature.
    fn dispatch(&self, body: &[OwnedValue]) -> crate::Result<()>;

    /// Upcast used for typed retrieval.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A typed signal proxy with locally registered observers.
pub struct SignalProxy<A: ArgList> {
    name: String,
    signature: String,
    observers: EventRegistry<A>,
}

impl<A: ArgList> SignalProxy<A> {
    pub(crate) fn create(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            signature: A::signature(),
            observers: EventRegistry::new(),
        })
    }

    /// Registers an observer invoked for every matching incoming signal.
    pub fn connect<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

impl<A: ArgList> ProxySignal for SignalProxy<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn dispatch(&self, body: &[OwnedValue]) -> crate::Result<()> {
        let args = A::from_values(body)?;
        self.observers.emit(&args);
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
