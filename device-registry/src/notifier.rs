//! Change notification fan-out
//!
//! Subscribers register per event kind and get a `SubscriptionId` back.
//! Delivery walks a copy of the subscriber list taken when the event is
//! broadcast, so callbacks may subscribe or unsubscribe freely; changes take
//! effect from the next event on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use device_backend::{DeviceEvent, PropertyChanges};

use crate::iter::NotifierIterator;

/// Token returned by every `on_*` registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type DeviceCallback = Arc<dyn Fn(&str) + Send + Sync>;
type ChangeCallback = Arc<dyn Fn(&str, &PropertyChanges) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    added: Vec<(SubscriptionId, DeviceCallback)>,
    removed: Vec<(SubscriptionId, DeviceCallback)>,
    changed: Vec<(SubscriptionId, ChangeCallback)>,
    streams: Vec<mpsc::Sender<DeviceEvent>>,
}

/// Ordered subscriber lists for added, removed and property-changed events
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    subscribers: Mutex<Subscribers>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_device_added<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.subscribers.lock().added.push((id, Arc::new(callback)));
        id
    }

    pub fn on_device_removed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.subscribers.lock().removed.push((id, Arc::new(callback)));
        id
    }

    pub fn on_property_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &PropertyChanges) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.subscribers.lock().changed.push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.added.len() + subscribers.removed.len() + subscribers.changed.len();

        subscribers.added.retain(|(sub, _)| *sub != id);
        subscribers.removed.retain(|(sub, _)| *sub != id);
        subscribers.changed.retain(|(sub, _)| *sub != id);

        let after = subscribers.added.len() + subscribers.removed.len() + subscribers.changed.len();
        before != after
    }

    /// Blocking iterator over every event broadcast from now on
    pub fn subscribe_iter(&self) -> NotifierIterator {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().streams.push(tx);
        NotifierIterator::new(rx)
    }

    /// Number of callback subscriptions (iterators not included)
    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers.added.len() + subscribers.removed.len() + subscribers.changed.len()
    }

    /// Deliver one event to every current subscriber, in registration order
    pub fn broadcast(&self, event: &DeviceEvent) {
        trace!("Broadcasting {:?}", event);

        match event {
            DeviceEvent::Added(udi) => {
                let callbacks: Vec<DeviceCallback> = {
                    let subscribers = self.subscribers.lock();
                    subscribers.added.iter().map(|(_, cb)| Arc::clone(cb)).collect()
                };
                for callback in callbacks {
                    callback(udi);
                }
            }
            DeviceEvent::Removed(udi) => {
                let callbacks: Vec<DeviceCallback> = {
                    let subscribers = self.subscribers.lock();
                    subscribers.removed.iter().map(|(_, cb)| Arc::clone(cb)).collect()
                };
                for callback in callbacks {
                    callback(udi);
                }
            }
            DeviceEvent::PropertyChanged { udi, changes } => {
                let callbacks: Vec<ChangeCallback> = {
                    let subscribers = self.subscribers.lock();
                    subscribers.changed.iter().map(|(_, cb)| Arc::clone(cb)).collect()
                };
                for callback in callbacks {
                    callback(udi, changes);
                }
            }
        }

        // Dropped iterators are pruned here.
        self.subscribers
            .lock()
            .streams
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drop every subscription and end every iterator
    pub fn clear(&self) {
        let mut subscribers = self.subscribers.lock();
        *subscribers = Subscribers::default();
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.lock();
        f.debug_struct("ChangeNotifier")
            .field("added", &subscribers.added.len())
            .field("removed", &subscribers.removed.len())
            .field("changed", &subscribers.changed.len())
            .field("streams", &subscribers.streams.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |udi: &str| sink.lock().push(udi.to_string()))
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let notifier = ChangeNotifier::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            notifier.on_device_added(move |_| order.lock().push(n));
        }

        notifier.broadcast(&DeviceEvent::added("/a"));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_kinds_are_separate() {
        let notifier = ChangeNotifier::new();
        let (added, on_added) = recorder();
        let (removed, on_removed) = recorder();
        notifier.on_device_added(on_added);
        notifier.on_device_removed(on_removed);

        notifier.broadcast(&DeviceEvent::added("/a"));
        notifier.broadcast(&DeviceEvent::removed("/b"));

        assert_eq!(*added.lock(), vec!["/a".to_string()]);
        assert_eq!(*removed.lock(), vec!["/b".to_string()]);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = ChangeNotifier::new();
        let (seen, on_added) = recorder();
        let id = notifier.on_device_added(on_added);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.broadcast(&DeviceEvent::added("/a"));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_during_delivery_affects_next_event() {
        let notifier = Arc::new(ChangeNotifier::new());
        let (seen, on_added) = recorder();

        let victim = Arc::new(Mutex::new(None));
        {
            let notifier_ref = Arc::clone(&notifier);
            let victim = Arc::clone(&victim);
            notifier.on_device_added(move |_| {
                if let Some(id) = victim.lock().take() {
                    notifier_ref.unsubscribe(id);
                }
            });
        }
        *victim.lock() = Some(notifier.on_device_added(on_added));

        // Snapshot taken before delivery: the victim still sees this one.
        notifier.broadcast(&DeviceEvent::added("/first"));
        notifier.broadcast(&DeviceEvent::added("/second"));

        assert_eq!(*seen.lock(), vec!["/first".to_string()]);
    }

    #[test]
    fn test_property_changes_are_passed_through() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        notifier.on_property_changed(move |udi, changes| {
            sink.lock().push((udi.to_string(), changes.len()));
        });

        let mut changes = PropertyChanges::new();
        changes.insert("Size".to_string(), device_backend::ChangeKind::Modified);
        notifier.broadcast(&DeviceEvent::PropertyChanged {
            udi: "/a".to_string(),
            changes,
        });

        assert_eq!(*seen.lock(), vec![("/a".to_string(), 1)]);
    }

    #[test]
    fn test_iterator_sees_only_later_events() {
        let notifier = ChangeNotifier::new();
        notifier.broadcast(&DeviceEvent::added("/early"));

        let events = notifier.subscribe_iter();
        notifier.broadcast(&DeviceEvent::added("/late"));

        assert_eq!(events.try_iter().collect::<Vec<_>>(), vec![DeviceEvent::added("/late")]);
    }

    #[test]
    fn test_clear_ends_iterators() {
        let notifier = ChangeNotifier::new();
        let events = notifier.subscribe_iter();
        notifier.on_device_added(|_| {});

        notifier.clear();
        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(events.recv(), None);
    }
}
