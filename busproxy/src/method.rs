//! Method proxies: local callables that forward to a remote method.
//!
//! [`MethodProxyBase`] is the type-erased form stored in an interface's
//! method collection: it knows its name and signatures and can send an
//! opaque body. [`MethodProxy`] layers compile-time argument and return
//! types on top and is what `create_method` hands back.

use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use zvariant::OwnedValue;

use crate::connection::{PendingCall, PendingReply};
use crate::interface::InterfaceProxy;
use crate::message::{CallMessage, ReturnMessage};
use crate::models::ProxyError;
use crate::signature::{ArgList, MethodReturn};

/// Type-erased method proxy.
pub struct MethodProxyBase {
    name: String,
    signature: String,
    debug_signature: String,
    interface: RwLock<Weak<InterfaceProxy>>,
}

impl MethodProxyBase {
    /// Creates a detached method proxy. It becomes callable once added to
    /// an interface that is itself attached to an object.
    pub fn create(name: &str, signature: &str, debug_signature: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            signature: signature.to_string(),
            debug_signature: debug_signature.to_string(),
            interface: RwLock::new(Weak::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Protocol signature of the call arguments.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Human-readable rendering of the method's Rust-level signature,
    /// for diagnostics.
    pub fn debug_signature(&self) -> &str {
        &self.debug_signature
    }

    /// The interface currently owning this method, if any.
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

    /// Builds a call envelope addressed to this method through the owning
    /// object, with an empty body.
    pub fn create_call_message(&self) -> crate::Result<CallMessage> {
        let (object, interface_name) = self.route()?;
        Ok(object.create_call_message(Some(&interface_name), &self.name))
    }

    /// Sends `body` as a blocking call through the owning object.
    pub fn call_with_body(
        &self,
        body: Vec<OwnedValue>,
        signature: &str,
        timeout: Option<Duration>,
    ) -> crate::Result<ReturnMessage> {
        let (object, interface_name) = self.route()?;
        let mut msg = object.create_call_message(Some(&interface_name), &self.name);
        msg.set_body(body, signature);
        object.call(&msg, timeout)
    }

    /// Non-blocking variant of [`call_with_body`].
    ///
    /// [`call_with_body`]: MethodProxyBase::call_with_body
    pub fn call_async_with_body(
        &self,
        body: Vec<OwnedValue>,
        signature: &str,
        timeout: Option<Duration>,
    ) -> crate::Result<PendingCall> {
        let (object, interface_name) = self.route()?;
        let mut msg = object.create_call_message(Some(&interface_name), &self.name);
        msg.set_body(body, signature);
        object.call_async(&msg, timeout)
    }

    fn route(&self) -> crate::Result<(Arc<crate::object::ObjectProxy>, String)> {
        let interface = self.interface().ok_or(ProxyError::Detached)?;
        let object = interface.object().ok_or(ProxyError::Detached)?;
        Ok((object, interface.name()))
    }
}

/// Typed method proxy over a shared [`MethodProxyBase`].
pub struct MethodProxy<R, A> {
    base: Arc<MethodProxyBase>,
    _marker: PhantomData<fn(A) -> R>,
}

impl<R, A> MethodProxy<R, A>
where
    R: MethodReturn,
    A: ArgList,
{
    pub(crate) fn from_base(base: Arc<MethodProxyBase>) -> Self {
        Self {
            base,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn signature(&self) -> &str {
        self.base.signature()
    }

    /// The shared type-erased handle this wrapper rides on.
    pub fn base(&self) -> &Arc<MethodProxyBase> {
        &self.base
    }

    /// Invokes the remote method, blocking until the decoded reply.
    pub fn call(&self, args: A, timeout: Option<Duration>) -> crate::Result<R> {
        let body = args.into_values()?;
        let reply = self.base.call_with_body(body, &A::signature(), timeout)?;
        R::from_body(reply.into_body())
    }

    /// Invokes the remote method without blocking; the returned handle
    /// resolves to the decoded reply.
    pub fn call_async(&self, args: A, timeout: Option<Duration>) -> crate::Result<PendingReply<R>> {
        let body = args.into_values()?;
        let pending = self
            .base
            .call_async_with_body(body, &A::signature(), timeout)?;
        Ok(PendingReply::new(pending))
    }
}

impl<R, A> Clone for MethodProxy<R, A> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            _marker: PhantomData,
        }
    }
}
