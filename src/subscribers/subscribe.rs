//! # Subscriber trait.
//!
//! Each subscriber gets its own bounded queue and worker task inside
//! [`SubscriberSet`](crate::SubscriberSet):
//! - a slow subscriber only fills its own queue;
//! - on overflow the event is dropped for that subscriber only and
//!   `EventKind::SubscriberOverflow` is published;
//! - panics are caught and published as `EventKind::SubscriberPanicked`;
//! - events are delivered FIFO per subscriber.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Runs on the subscriber's own worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events. Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity for this subscriber (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
