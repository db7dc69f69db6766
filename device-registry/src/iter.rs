//! Blocking iterator over registry events
//!
//! Provides various iteration patterns for consuming events:
//! - Blocking: `recv()`, `for event in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::mpsc;
use std::time::Duration;

use device_backend::DeviceEvent;

/// Blocking iterator over events broadcast by a `ChangeNotifier`
///
/// Sees only events broadcast after it was created. The iterator ends once
/// the notifier is torn down.
///
/// # Example
///
/// ```rust,ignore
/// let events = registry.notifier().subscribe_iter();
///
/// // Non-blocking drain after processing backend events
/// registry.process_events();
/// for event in events.try_iter() {
///     println!("{:?}", event);
/// }
/// ```
pub struct NotifierIterator {
    rx: mpsc::Receiver<DeviceEvent>,
}

impl NotifierIterator {
    pub(crate) fn new(rx: mpsc::Receiver<DeviceEvent>) -> Self {
        Self { rx }
    }

    /// Block until the next event is available
    ///
    /// Returns `None` once the notifier is gone.
    pub fn recv(&self) -> Option<DeviceEvent> {
        self.rx.recv().ok()
    }

    /// Block until the next event or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DeviceEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<DeviceEvent> {
        self.rx.try_recv().ok()
    }

    /// Iterator over the events queued right now
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterator that waits up to `timeout` for each event
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for NotifierIterator {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available events
pub struct TryIter<'a> {
    inner: &'a NotifierIterator,
}

impl Iterator for TryIter<'_> {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a> {
    inner: &'a NotifierIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIter<'_> {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_try_recv_empty() {
        let (tx, rx) = mpsc::channel();
        let iter = NotifierIterator::new(rx);
        assert!(iter.try_recv().is_none());
        drop(tx);
    }

    #[test]
    fn test_try_iter_drains_in_order() {
        let (tx, rx) = mpsc::channel();
        let iter = NotifierIterator::new(rx);

        tx.send(DeviceEvent::added("/a")).unwrap();
        tx.send(DeviceEvent::removed("/a")).unwrap();

        let events: Vec<_> = iter.try_iter().collect();
        assert_eq!(events, vec![DeviceEvent::added("/a"), DeviceEvent::removed("/a")]);
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_recv_timeout() {
        let (tx, rx) = mpsc::channel();
        let iter = NotifierIterator::new(rx);

        let start = Instant::now();
        assert!(iter.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));

        let sender = tx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sender.send(DeviceEvent::added("/b")).unwrap();
        });
        assert_eq!(
            iter.recv_timeout(Duration::from_millis(500)),
            Some(DeviceEvent::added("/b"))
        );
        drop(tx);
    }

    #[test]
    fn test_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel();
        let mut iter = NotifierIterator::new(rx);
        tx.send(DeviceEvent::added("/c")).unwrap();
        drop(tx);

        assert_eq!(iter.next(), Some(DeviceEvent::added("/c")));
        assert_eq!(iter.next(), None);
    }
}
