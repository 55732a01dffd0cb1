//! Main Coordinator task implementation

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::handle::CoordinatorHandle;
use super::messages::CoordRequest;
use crate::engine::Engine;
use crate::events::EventBus;

/// Serializes every tick, command and read against one [`Engine`]
pub struct Coordinator {
    engine: Engine,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
}

impl Coordinator {
    pub fn new(engine: Engine) -> Self {
        let buffer = engine.config().coordinator.channel_buffer.max(1);
        debug!(buffer, "Coordinator::new: called");
        let (tx, rx) = mpsc::channel(buffer);
        Self { engine, tx, rx }
    }

    /// Get a sender for raw requests
    pub fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// The engine's event bus; subscribe before calling [`Coordinator::run`]
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.engine.event_bus()
    }

    /// Run the Coordinator task
    ///
    /// Consumes the Coordinator and runs until shutdown is requested or every
    /// handle is dropped. The engine, and with it the event bus, is dropped
    /// on exit so bus subscribers see the channel close.
    pub async fn run(self) {
        let Coordinator { mut engine, tx, mut rx } = self;
        drop(tx);

        info!("Coordinator started");
        let mut handled: u64 = 0;

        while let Some(req) = rx.recv().await {
            handled += 1;
            debug!(kind = req.kind(), "Coordinator: request");

            // Reply send failures mean the caller gave up waiting; nothing to do
            match req {
                CoordRequest::Tick { reply_tx } => {
                    let _ = reply_tx.send(engine.tick());
                }

                CoordRequest::Detection { event, reply_tx } => {
                    let _ = reply_tx.send(engine.on_detection_event(event));
                }
                CoordRequest::Acknowledge {
                    alert_id,
                    unit_id,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.on_acknowledgment(&alert_id, &unit_id));
                }

                CoordRequest::RegisterSignal { signal, reply_tx } => {
                    let _ = reply_tx.send(engine.register_signal(signal));
                }
                CoordRequest::Override {
                    signal_id,
                    duration,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.request_override(&signal_id, duration));
                }
                CoordRequest::Preempt {
                    signal_id,
                    duration,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.request_preempt(&signal_id, duration));
                }
                CoordRequest::Release { signal_id, reply_tx } => {
                    let _ = reply_tx.send(engine.request_release(&signal_id));
                }
                CoordRequest::SetConnected {
                    signal_id,
                    connected,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.set_signal_connected(&signal_id, connected));
                }

                CoordRequest::CreateCorridor {
                    corridor_id,
                    vehicle_type,
                    route,
                    duration,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.request_corridor(&corridor_id, &vehicle_type, route, duration));
                }
                CoordRequest::AbortCorridor { corridor_id, reply_tx } => {
                    let _ = reply_tx.send(engine.request_abort(&corridor_id));
                }

                CoordRequest::RegisterUnit { unit, reply_tx } => {
                    let _ = reply_tx.send(engine.register_unit(unit));
                }
                CoordRequest::UpdateUnitStatus {
                    unit_id,
                    status,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.update_unit_status(&unit_id, status));
                }
                CoordRequest::UpdateUnitLocation {
                    unit_id,
                    location,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.update_unit_location(&unit_id, location));
                }
                CoordRequest::DispatchAlert {
                    class,
                    vehicle_type,
                    location,
                    radius_km,
                    reply_tx,
                } => {
                    let _ = reply_tx.send(engine.dispatch_alert(class, &vehicle_type, location, radius_km));
                }
                CoordRequest::ArchiveAlerts { cutoff, reply_tx } => {
                    let _ = reply_tx.send(engine.archive_alerts(cutoff));
                }

                CoordRequest::GetSnapshot { reply_tx } => {
                    let _ = reply_tx.send(engine.snapshot());
                }
                CoordRequest::GetStats { reply_tx } => {
                    let _ = reply_tx.send(engine.stats());
                }
                CoordRequest::GetSignal { signal_id, reply_tx } => {
                    let _ = reply_tx.send(engine.signal(&signal_id));
                }
                CoordRequest::GetCorridor { corridor_id, reply_tx } => {
                    let _ = reply_tx.send(engine.corridor(&corridor_id));
                }
                CoordRequest::GetAlert { alert_id, reply_tx } => {
                    let _ = reply_tx.send(engine.alert(&alert_id));
                }
                CoordRequest::GetEventLog { filter, reply_tx } => {
                    let _ = reply_tx.send(engine.event_log(&filter));
                }
                CoordRequest::GetTime { reply_tx } => {
                    let _ = reply_tx.send(engine.now());
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        info!(handled, ticks = engine.tick_count(), "Coordinator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::domain::{
        AlertClass, AlertStatus, CorridorStatus, Location, Phase, Planar, Signal, SignalMode, Unit, UnitStatus,
    };
    use crate::error::EngineError;
    use crate::events::{EngineEvent, LogFilter, LogKind};
    use chrono::Utc;
    use tokio::sync::oneshot;

    fn engine() -> Engine {
        Engine::new(
            Config::default(),
            Arc::new(ManualClock::new(Utc::now())),
            Arc::new(Planar),
        )
    }

    async fn seeded() -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
        let coord = Coordinator::new(engine());
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        let timing = Config::default().signals.timing();
        for (id, location) in [("S1", "Main St & 5th Ave"), ("S2", "Main St & 4th Ave"), ("S3", "Broadway")] {
            handle.register_signal(Signal::new(id, location, &timing)).await.unwrap();
        }
        for (id, x) in [("U1", 1.0), ("U2", 2.0), ("U3", 20.0)] {
            handle
                .register_unit(Unit::new(id, id, Location::new(id, x, 0.0), Utc::now()))
                .await
                .unwrap();
        }
        (handle, task)
    }

    #[tokio::test]
    async fn test_requests_are_answered_in_order() {
        let (handle, task) = seeded().await;

        let signal = handle.request_override("S1", Some(60)).await.unwrap();
        assert_eq!(signal.mode, SignalMode::Emergency);
        assert_eq!(signal.phase, Phase::Green);

        let report = handle.tick().await.unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(handle.signal("S1").await.unwrap().unwrap().phase_time_remaining, 59);

        assert!(handle.request_release("S1").await.unwrap());
        assert!(!handle.request_release("S1").await.unwrap());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_release_of_corridor_member_is_refused() {
        let (handle, task) = seeded().await;
        handle
            .request_corridor("COR1", "Ambulance", vec!["S1".to_string(), "S2".to_string()], 10)
            .await
            .unwrap();

        let err = handle.request_release("S1").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { ref state, .. } if state == "held by corridor COR1"));
        assert!(handle.request_preempt("S2", None).await.is_err());

        assert_eq!(handle.signal("S1").await.unwrap().unwrap().mode, SignalMode::Emergency);
        assert_eq!(handle.signal("S2").await.unwrap().unwrap().mode, SignalMode::Emergency);
        assert_eq!(
            handle.corridor("COR1").await.unwrap().unwrap().status,
            CorridorStatus::Active
        );

        handle.request_abort("COR1").await.unwrap();
        assert!(!handle.request_release("S1").await.unwrap());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_now_reads_engine_clock() {
        let start = Utc::now() - chrono::Duration::days(1);
        let coord = Coordinator::new(Engine::new(
            Config::default(),
            Arc::new(ManualClock::new(start)),
            Arc::new(Planar),
        ));
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        assert_eq!(handle.now().await.unwrap(), start);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_weak_handle_does_not_keep_coordinator_alive() {
        let coord = Coordinator::new(engine());
        let handle = coord.handle();
        let weak = handle.downgrade();
        let task = tokio::spawn(coord.run());

        assert!(weak.upgrade().is_some());
        drop(handle);
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("coordinator should stop")
            .unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_errors_cross_the_channel() {
        let (handle, task) = seeded().await;

        let err = handle.request_override("S9", None).await.unwrap_err();
        assert!(err.is_not_found());

        handle.set_signal_connected("S2", false).await.unwrap();
        let err = handle.request_override("S2", None).await.unwrap_err();
        assert_eq!(err, EngineError::Disconnected("S2".to_string()));

        let err = handle
            .request_corridor("COR1", "Ambulance", Vec::new(), 120)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyRoute);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_corridor_and_alert_flow() {
        let (handle, task) = seeded().await;

        let activation = handle
            .request_corridor(
                "COR1",
                "Fire Truck",
                vec!["S1".to_string(), "S2".to_string(), "S3".to_string()],
                120,
            )
            .await
            .unwrap();
        assert!(!activation.is_degraded());

        let alert = handle
            .dispatch_alert(AlertClass::Emergency, "Fire Truck", Location::new("Main", 0.0, 0.0), None)
            .await
            .unwrap();
        assert_eq!(alert.alert.recipient_ids().len(), 2);

        let acked = handle.on_acknowledgment(&alert.alert.id, "U1").await.unwrap();
        assert_eq!(acked.status, AlertStatus::Delivered);

        let aborted = handle.request_abort("COR1").await.unwrap();
        assert_eq!(aborted.status, CorridorStatus::Aborted);
        let s1 = handle.signal("S1").await.unwrap().unwrap();
        assert_eq!(s1.mode, SignalMode::Normal);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.aborted_corridors, 1);
        assert_eq!(stats.alerts_sent, 1);
        assert_eq!(stats.units_alerted, 2);

        let log = handle.event_log(LogFilter::kind(LogKind::RouteClear)).await.unwrap();
        assert_eq!(log.len(), 2);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_reach_the_bus() {
        let coord = Coordinator::new(engine());
        let handle = coord.handle();
        let mut rx = coord.event_bus().subscribe();
        let task = tokio::spawn(coord.run());

        let timing = Config::default().signals.timing();
        handle.register_signal(Signal::new("S1", "Main", &timing)).await.unwrap();
        handle.request_override("S1", Some(30)).await.unwrap();

        let registered = rx.recv().await.unwrap().as_signal_command().unwrap();
        assert_eq!(registered.phase, Phase::Red);
        let overridden = rx.recv().await.unwrap();
        assert_eq!(
            overridden,
            EngineEvent::SignalCommand {
                signal_id: "S1".to_string(),
                phase: Phase::Green,
                mode: SignalMode::Emergency,
            }
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_after_shutdown_is_channel_closed() {
        let (handle, task) = seeded().await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(handle.tick().await.unwrap_err(), EngineError::ChannelClosed);
        assert_eq!(handle.shutdown().await.unwrap_err(), EngineError::ChannelClosed);
    }

    #[tokio::test]
    async fn test_stops_when_all_handles_dropped() {
        let coord = Coordinator::new(engine());
        let sender = coord.sender();
        let task = tokio::spawn(coord.run());

        let (reply_tx, reply_rx) = oneshot::channel();
        sender.send(CoordRequest::GetStats { reply_tx }).await.unwrap();
        assert_eq!(reply_rx.await.unwrap().total_signals, 0);

        drop(sender);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unit_updates_affect_later_dispatch() {
        let (handle, task) = seeded().await;

        let unit = handle.update_unit_status("U1", UnitStatus::Busy).await.unwrap();
        assert_eq!(unit.status, UnitStatus::Busy);
        handle
            .update_unit_location("U3", Location::new("Downtown", 0.5, 0.0))
            .await
            .unwrap();

        let alert = handle
            .dispatch_alert(AlertClass::Warning, "Police", Location::new("Main", 0.0, 0.0), Some(5.0))
            .await
            .unwrap();
        let recipients: Vec<&str> = alert.alert.recipient_ids().iter().map(String::as_str).collect();
        assert_eq!(recipients, vec!["U2", "U3"]);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
