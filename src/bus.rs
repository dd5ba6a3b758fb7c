//! Payload-free change bus.
//!
//! Subscribers are told only that something changed; they re-read the store
//! to find out what. Callbacks are invoked outside the subscriber lock, in no
//! particular order, and must tolerate duplicate notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
}

impl BusInner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<(u64, Callback)>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cloneable handle; every clone publishes to the same subscriber set.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers().push((id, Arc::new(callback)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every current subscriber once.
    pub fn publish(&self) {
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Registration guard returned by [`ChangeBus::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = ChangeBus::new();
        let (a, on_a) = counter();
        let (b, on_b) = counter();
        let _sa = bus.subscribe(on_a);
        let _sb = bus.subscribe(on_b);

        bus.publish();
        bus.clone().publish();

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = ChangeBus::new();
        let (count, on_change) = counter();
        let sub = bus.subscribe(on_change);

        bus.publish();
        sub.unsubscribe();
        bus.publish();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_may_subscribe_reentrantly() {
        let bus = ChangeBus::new();
        let inner_bus = bus.clone();
        let nested = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&nested);
        let _sub = bus.subscribe(move || {
            let sub = inner_bus.subscribe(|| {});
            keep.lock().unwrap().push(sub);
        });

        bus.publish();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = ChangeBus::new();
        let sub = bus.subscribe(|| {});
        drop(bus);
        drop(sub);
    }
}
