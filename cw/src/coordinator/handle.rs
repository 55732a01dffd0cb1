//! CoordinatorHandle - client interface to the engine

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::CoordRequest;
use crate::domain::{
    AlertClass, AlertSnapshot, Corridor, CorridorActivation, DetectionEvent, DetectionOutcome, Location, Signal, Unit,
    UnitStatus,
};
use crate::engine::{EngineSnapshot, EngineStats, TickReport};
use crate::error::{EngineError, EngineResult};
use crate::events::{LogEntry, LogFilter};

/// Handle for adapters, the ticker and operators to talk to the Coordinator
///
/// Cloneable; every call is one request/reply round trip. Once the
/// Coordinator has stopped, every call fails with `ChannelClosed`.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        Self { tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> CoordRequest) -> EngineResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn tick(&self) -> EngineResult<TickReport> {
        self.request(|reply_tx| CoordRequest::Tick { reply_tx }).await
    }

    // === Inbound events ===

    pub async fn on_detection_event(&self, event: DetectionEvent) -> EngineResult<DetectionOutcome> {
        debug!(vehicle_type = %event.vehicle_type, "CoordinatorHandle::on_detection_event: called");
        self.request(|reply_tx| CoordRequest::Detection { event, reply_tx }).await
    }

    pub async fn on_acknowledgment(&self, alert_id: &str, unit_id: &str) -> EngineResult<AlertSnapshot> {
        debug!(%alert_id, %unit_id, "CoordinatorHandle::on_acknowledgment: called");
        self.request(|reply_tx| CoordRequest::Acknowledge {
            alert_id: alert_id.to_string(),
            unit_id: unit_id.to_string(),
            reply_tx,
        })
        .await?
    }

    // === Signals ===

    pub async fn register_signal(&self, signal: Signal) -> EngineResult<()> {
        debug!(signal_id = %signal.id, "CoordinatorHandle::register_signal: called");
        self.request(|reply_tx| CoordRequest::RegisterSignal { signal, reply_tx })
            .await?
    }

    /// `duration` of None uses the configured override window
    pub async fn request_override(&self, signal_id: &str, duration: Option<u64>) -> EngineResult<Signal> {
        debug!(%signal_id, ?duration, "CoordinatorHandle::request_override: called");
        self.request(|reply_tx| CoordRequest::Override {
            signal_id: signal_id.to_string(),
            duration,
            reply_tx,
        })
        .await?
    }

    pub async fn request_preempt(&self, signal_id: &str, duration: Option<u64>) -> EngineResult<Signal> {
        debug!(%signal_id, ?duration, "CoordinatorHandle::request_preempt: called");
        self.request(|reply_tx| CoordRequest::Preempt {
            signal_id: signal_id.to_string(),
            duration,
            reply_tx,
        })
        .await?
    }

    pub async fn request_release(&self, signal_id: &str) -> EngineResult<bool> {
        debug!(%signal_id, "CoordinatorHandle::request_release: called");
        self.request(|reply_tx| CoordRequest::Release {
            signal_id: signal_id.to_string(),
            reply_tx,
        })
        .await?
    }

    pub async fn set_signal_connected(&self, signal_id: &str, connected: bool) -> EngineResult<bool> {
        debug!(%signal_id, connected, "CoordinatorHandle::set_signal_connected: called");
        self.request(|reply_tx| CoordRequest::SetConnected {
            signal_id: signal_id.to_string(),
            connected,
            reply_tx,
        })
        .await?
    }

    // === Corridors ===

    pub async fn request_corridor(
        &self,
        corridor_id: &str,
        vehicle_type: &str,
        route: Vec<String>,
        duration: u64,
    ) -> EngineResult<CorridorActivation> {
        debug!(%corridor_id, %vehicle_type, ?route, duration, "CoordinatorHandle::request_corridor: called");
        self.request(|reply_tx| CoordRequest::CreateCorridor {
            corridor_id: corridor_id.to_string(),
            vehicle_type: vehicle_type.to_string(),
            route,
            duration,
            reply_tx,
        })
        .await?
    }

    /// Returns once the corridor is ABORTED and its signals released
    pub async fn request_abort(&self, corridor_id: &str) -> EngineResult<Corridor> {
        debug!(%corridor_id, "CoordinatorHandle::request_abort: called");
        self.request(|reply_tx| CoordRequest::AbortCorridor {
            corridor_id: corridor_id.to_string(),
            reply_tx,
        })
        .await?
    }

    // === Responders and alerts ===

    pub async fn register_unit(&self, unit: Unit) -> EngineResult<()> {
        debug!(unit_id = %unit.id, "CoordinatorHandle::register_unit: called");
        self.request(|reply_tx| CoordRequest::RegisterUnit { unit, reply_tx }).await?
    }

    pub async fn update_unit_status(&self, unit_id: &str, status: UnitStatus) -> EngineResult<Unit> {
        self.request(|reply_tx| CoordRequest::UpdateUnitStatus {
            unit_id: unit_id.to_string(),
            status,
            reply_tx,
        })
        .await?
    }

    pub async fn update_unit_location(&self, unit_id: &str, location: Location) -> EngineResult<Unit> {
        self.request(|reply_tx| CoordRequest::UpdateUnitLocation {
            unit_id: unit_id.to_string(),
            location,
            reply_tx,
        })
        .await?
    }

    /// `radius_km` of None uses the configured dispatch radius
    pub async fn dispatch_alert(
        &self,
        class: AlertClass,
        vehicle_type: &str,
        location: Location,
        radius_km: Option<f64>,
    ) -> EngineResult<AlertSnapshot> {
        debug!(%class, %vehicle_type, ?radius_km, "CoordinatorHandle::dispatch_alert: called");
        self.request(|reply_tx| CoordRequest::DispatchAlert {
            class,
            vehicle_type: vehicle_type.to_string(),
            location,
            radius_km,
            reply_tx,
        })
        .await?
    }

    pub async fn archive_alerts(&self, cutoff: DateTime<Utc>) -> EngineResult<usize> {
        self.request(|reply_tx| CoordRequest::ArchiveAlerts { cutoff, reply_tx })
            .await
    }

    // === Reads ===

    pub async fn snapshot(&self) -> EngineResult<EngineSnapshot> {
        self.request(|reply_tx| CoordRequest::GetSnapshot { reply_tx }).await
    }

    pub async fn stats(&self) -> EngineResult<EngineStats> {
        self.request(|reply_tx| CoordRequest::GetStats { reply_tx }).await
    }

    pub async fn signal(&self, signal_id: &str) -> EngineResult<Option<Signal>> {
        self.request(|reply_tx| CoordRequest::GetSignal {
            signal_id: signal_id.to_string(),
            reply_tx,
        })
        .await
    }

    pub async fn corridor(&self, corridor_id: &str) -> EngineResult<Option<Corridor>> {
        self.request(|reply_tx| CoordRequest::GetCorridor {
            corridor_id: corridor_id.to_string(),
            reply_tx,
        })
        .await
    }

    pub async fn alert(&self, alert_id: &str) -> EngineResult<Option<AlertSnapshot>> {
        self.request(|reply_tx| CoordRequest::GetAlert {
            alert_id: alert_id.to_string(),
            reply_tx,
        })
        .await
    }

    pub async fn event_log(&self, filter: LogFilter) -> EngineResult<Vec<LogEntry>> {
        self.request(|reply_tx| CoordRequest::GetEventLog { filter, reply_tx })
            .await
    }

    /// Current time on the engine's clock, for stamping records built outside it
    pub async fn now(&self) -> EngineResult<DateTime<Utc>> {
        self.request(|reply_tx| CoordRequest::GetTime { reply_tx }).await
    }

    /// A handle that does not keep the Coordinator alive
    pub fn downgrade(&self) -> WeakCoordinatorHandle {
        WeakCoordinatorHandle {
            tx: self.tx.downgrade(),
        }
    }

    /// Ask the Coordinator to stop after the requests already queued
    pub async fn shutdown(&self) -> EngineResult<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

/// Non-owning [`CoordinatorHandle`] for background tasks
///
/// The Coordinator stops once every strong handle is dropped, whatever weak
/// handles are still around.
#[derive(Debug, Clone)]
pub struct WeakCoordinatorHandle {
    tx: mpsc::WeakSender<CoordRequest>,
}

impl WeakCoordinatorHandle {
    /// None once the Coordinator has stopped or every strong handle is gone
    pub fn upgrade(&self) -> Option<CoordinatorHandle> {
        self.tx.upgrade().map(CoordinatorHandle::new)
    }
}
