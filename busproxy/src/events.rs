//! Observer registries for change notifications.
//!
//! Every notification channel in the proxy graph (interface added/removed,
//! default interface changed, interface renamed, property changed) is an
//! [`EventRegistry`]: an explicit mapping from subscription token to
//! callback. Emission snapshots the callback list and invokes it with the
//! registry lock released, so a callback may unsubscribe itself, or call
//! back into the structure that owns the registry, without deadlocking.

use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Token identifying one subscription on one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A token-keyed list of callbacks for one event type.
pub struct EventRegistry<E> {
    handlers: Mutex<Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Registers `callback` and returns the token that removes it again.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes the subscription for `id`. Returns `false` if it was not
    /// (or no longer) registered here.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    /// Delivers `event` synchronously to every currently registered
    /// callback, in subscription order. The registry lock is not held
    /// while callbacks run.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribe_and_emit() {
        let registry = EventRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        registry.subscribe(move |ev: &u32| {
            assert_eq!(*ev, 7);
            h.fetch_add(1, Ordering::SeqCst);
        });
        registry.emit(&7);
        registry.emit(&7);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = EventRegistry::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = registry.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        registry.emit(&());
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let registry = Arc::new(EventRegistry::<()>::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let reg = registry.clone();
        let stored = slot.clone();
        let h = hits.clone();
        let id = registry.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = stored.lock().unwrap().take() {
                reg.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        registry.emit(&());
        registry.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delivery_follows_subscription_order() {
        let registry = EventRegistry::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let log = order.clone();
            registry.subscribe(move |_| log.lock().unwrap().push(tag));
        }
        registry.emit(&());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
