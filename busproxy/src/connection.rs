//! The bus-connection boundary and pending-call handles.
//!
//! The proxy graph never talks to a socket itself; everything outbound
//! goes through a [`Connection`] implementation supplied by the host
//! application (a real bus backend, or a mock in tests).

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;

use crate::message::{CallMessage, ReturnMessage};
use crate::models::ProxyError;
use crate::signature::MethodReturn;

/// A live bus connection able to carry method calls.
///
/// Timeouts are `Option<Duration>`: `None` defers to the connection's
/// configured default, which may itself mean "wait indefinitely" or a
/// fixed deadline depending on the backend.
pub trait Connection: Send + Sync {
    /// Sends `call` and blocks the calling thread until the reply
    /// arrives. Fails with [`ProxyError::Timeout`] when the deadline
    /// passes, or [`ProxyError::Remote`] when the peer answers with an
    /// error reply.
    fn send_blocking(
        &self,
        call: &CallMessage,
        timeout: Option<Duration>,
    ) -> crate::Result<ReturnMessage>;

    /// Sends `call` without blocking and returns a handle that resolves
    /// to the reply. Dropping the handle abandons the call; a reply that
    /// arrives afterwards is discarded by the connection.
    fn send_async(
        &self,
        call: &CallMessage,
        timeout: Option<Duration>,
    ) -> crate::Result<PendingCall>;
}

/// The caller's half of an in-flight asynchronous call.
///
/// Resolve it either by `.await`ing it or with the blocking [`wait`]
/// method.
///
/// [`wait`]: PendingCall::wait
pub struct PendingCall {
    rx: oneshot::Receiver<crate::Result<ReturnMessage>>,
}

/// The connection's half of an in-flight call: resolve it once with the
/// outcome. Dropping it unresolved completes the pending call with
/// [`ProxyError::NoReply`].
pub struct ReplyHandle {
    tx: oneshot::Sender<crate::Result<ReturnMessage>>,
}

impl PendingCall {
    /// Creates a connected pair of reply handle and pending call.
    pub fn channel() -> (ReplyHandle, PendingCall) {
        let (tx, rx) = oneshot::channel();
        (ReplyHandle { tx }, PendingCall { rx })
    }

    /// Blocks the calling thread until the call completes.
    pub fn wait(self) -> crate::Result<ReturnMessage> {
        futures::executor::block_on(self)
    }
}

impl Future for PendingCall {
    type Output = crate::Result<ReturnMessage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(ProxyError::NoReply)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl ReplyHandle {
    /// Completes the pending call. A send to an abandoned call is a no-op.
    pub fn resolve(self, outcome: crate::Result<ReturnMessage>) {
        let _ = self.tx.send(outcome);
    }
}

/// A [`PendingCall`] that decodes its reply into `R` on completion.
pub struct PendingReply<R> {
    inner: PendingCall,
    _marker: PhantomData<fn() -> R>,
}

impl<R: MethodReturn> PendingReply<R> {
    pub(crate) fn new(inner: PendingCall) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Blocks the calling thread until the call completes and decodes
    /// the reply.
    pub fn wait(self) -> crate::Result<R> {
        futures::executor::block_on(self)
    }
}

impl<R: MethodReturn> Future for PendingReply<R> {
    type Output = crate::Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(outcome) => {
                Poll::Ready(outcome.and_then(|reply| R::from_body(reply.into_body())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_pending_call_yields_the_reply() {
        let (handle, pending) = PendingCall::channel();
        handle.resolve(Ok(ReturnMessage::new(Vec::new(), "")));
        assert!(pending.wait().is_ok());
    }

    #[test]
    fn dropped_handle_means_no_reply() {
        let (handle, pending) = PendingCall::channel();
        drop(handle);
        assert!(matches!(pending.wait(), Err(ProxyError::NoReply)));
    }

    #[test]
    fn abandoned_call_ignores_the_late_reply() {
        let (handle, pending) = PendingCall::channel();
        drop(pending);
        handle.resolve(Ok(ReturnMessage::empty()));
    }
}
