//! # Event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel. Publishing never blocks
//! and never fails: with no receiver the event is simply dropped, and a
//! receiver that falls more than `capacity` events behind sees
//! `RecvError::Lagged(n)` and skips ahead.
//!
//! ```text
//! runner ─────┐
//! controller ─┼──► Bus ──► Manager listener ──► SubscriberSet
//! workers ────┘
//! ```

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable, non-blocking publisher of runtime [`Event`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every current receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn publish_without_receivers_is_dropped() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::AllStoppedWithin));
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::AllStoppedWithin);
    }
}
