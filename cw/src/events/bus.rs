//! Event Bus - pub/sub for engine events
//!
//! The EventBus uses a tokio broadcast channel so every subscriber (signal
//! forwarder, alert delivery, loggers) sees every event. The engine emits,
//! adapters subscribe.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::EngineEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Central event bus for engine output
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped. A full
    /// channel drops the oldest events for slow subscribers.
    pub fn emit(&self, event: EngineEvent) {
        debug!(event_type = event.event_type(), "EventBus::emit");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_emit_reaches_every_subscriber() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(EngineEvent::Tick { tick: 1 });

        assert_eq!(rx1.recv().await.unwrap(), EngineEvent::Tick { tick: 1 });
        assert_eq!(rx2.recv().await.unwrap(), EngineEvent::Tick { tick: 1 });
        assert!(matches!(rx1.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        // Must not panic
        bus.emit(EngineEvent::Tick { tick: 1 });
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for tick in 0..5 {
            bus.emit(EngineEvent::Tick { tick });
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap(), EngineEvent::Tick { tick: 3 });
    }
}
