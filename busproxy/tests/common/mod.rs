//! Shared test doubles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use busproxy::{CallMessage, Connection, PendingCall, ReturnMessage};

/// A scripted in-memory connection: records every outbound call and
/// answers with queued replies (an empty return message once the queue
/// runs dry).
pub struct MockConnection {
    sent: Mutex<Vec<CallMessage>>,
    replies: Mutex<VecDeque<busproxy::Result<ReturnMessage>>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        })
    }

    pub fn queue_reply(&self, reply: busproxy::Result<ReturnMessage>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn sent(&self) -> Vec<CallMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Connection for MockConnection {
    fn send_blocking(
        &self,
        call: &CallMessage,
        _timeout: Option<Duration>,
    ) -> busproxy::Result<ReturnMessage> {
        self.sent.lock().unwrap().push(call.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ReturnMessage::empty()))
    }

    fn send_async(
        &self,
        call: &CallMessage,
        timeout: Option<Duration>,
    ) -> busproxy::Result<PendingCall> {
        let outcome = self.send_blocking(call, timeout);
        let (handle, pending) = PendingCall::channel();
        handle.resolve(outcome);
        Ok(pending)
    }
}
