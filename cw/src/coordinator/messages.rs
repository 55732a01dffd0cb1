//! Message types for the Coordinator

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::domain::{
    AlertClass, AlertSnapshot, Corridor, CorridorActivation, DetectionEvent, DetectionOutcome, Location, Signal, Unit,
    UnitStatus,
};
use crate::engine::{EngineSnapshot, EngineStats, TickReport};
use crate::error::EngineResult;
use crate::events::{LogEntry, LogFilter};

/// Reply channel for operations that can fail
pub type Reply<T> = oneshot::Sender<EngineResult<T>>;

/// Requests to the Coordinator task
///
/// Every request carries its own reply channel; the Coordinator handles them
/// strictly one at a time.
#[derive(Debug)]
pub enum CoordRequest {
    /// Advance signals and corridors by one tick
    Tick { reply_tx: oneshot::Sender<TickReport> },

    // === Inbound events ===
    Detection {
        event: DetectionEvent,
        reply_tx: oneshot::Sender<DetectionOutcome>,
    },
    Acknowledge {
        alert_id: String,
        unit_id: String,
        reply_tx: Reply<AlertSnapshot>,
    },

    // === Signals ===
    RegisterSignal { signal: Signal, reply_tx: Reply<()> },
    Override {
        signal_id: String,
        duration: Option<u64>,
        reply_tx: Reply<Signal>,
    },
    Preempt {
        signal_id: String,
        duration: Option<u64>,
        reply_tx: Reply<Signal>,
    },
    Release { signal_id: String, reply_tx: Reply<bool> },
    SetConnected {
        signal_id: String,
        connected: bool,
        reply_tx: Reply<bool>,
    },

    // === Corridors ===
    CreateCorridor {
        corridor_id: String,
        vehicle_type: String,
        route: Vec<String>,
        duration: u64,
        reply_tx: Reply<CorridorActivation>,
    },
    AbortCorridor { corridor_id: String, reply_tx: Reply<Corridor> },

    // === Responders and alerts ===
    RegisterUnit { unit: Unit, reply_tx: Reply<()> },
    UpdateUnitStatus {
        unit_id: String,
        status: UnitStatus,
        reply_tx: Reply<Unit>,
    },
    UpdateUnitLocation {
        unit_id: String,
        location: Location,
        reply_tx: Reply<Unit>,
    },
    DispatchAlert {
        class: AlertClass,
        vehicle_type: String,
        location: Location,
        radius_km: Option<f64>,
        reply_tx: Reply<AlertSnapshot>,
    },
    ArchiveAlerts {
        cutoff: DateTime<Utc>,
        reply_tx: oneshot::Sender<usize>,
    },

    // === Reads ===
    GetSnapshot { reply_tx: oneshot::Sender<EngineSnapshot> },
    GetStats { reply_tx: oneshot::Sender<EngineStats> },
    GetSignal {
        signal_id: String,
        reply_tx: oneshot::Sender<Option<Signal>>,
    },
    GetCorridor {
        corridor_id: String,
        reply_tx: oneshot::Sender<Option<Corridor>>,
    },
    GetAlert {
        alert_id: String,
        reply_tx: oneshot::Sender<Option<AlertSnapshot>>,
    },
    GetEventLog {
        filter: LogFilter,
        reply_tx: oneshot::Sender<Vec<LogEntry>>,
    },
    /// Current time on the engine's clock
    GetTime { reply_tx: oneshot::Sender<DateTime<Utc>> },

    /// Stop processing; pending handles see `ChannelClosed`
    Shutdown,
}

impl CoordRequest {
    /// Request name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            CoordRequest::Tick { .. } => "Tick",
            CoordRequest::Detection { .. } => "Detection",
            CoordRequest::Acknowledge { .. } => "Acknowledge",
            CoordRequest::RegisterSignal { .. } => "RegisterSignal",
            CoordRequest::Override { .. } => "Override",
            CoordRequest::Preempt { .. } => "Preempt",
            CoordRequest::Release { .. } => "Release",
            CoordRequest::SetConnected { .. } => "SetConnected",
            CoordRequest::CreateCorridor { .. } => "CreateCorridor",
            CoordRequest::AbortCorridor { .. } => "AbortCorridor",
            CoordRequest::RegisterUnit { .. } => "RegisterUnit",
            CoordRequest::UpdateUnitStatus { .. } => "UpdateUnitStatus",
            CoordRequest::UpdateUnitLocation { .. } => "UpdateUnitLocation",
            CoordRequest::DispatchAlert { .. } => "DispatchAlert",
            CoordRequest::ArchiveAlerts { .. } => "ArchiveAlerts",
            CoordRequest::GetSnapshot { .. } => "GetSnapshot",
            CoordRequest::GetStats { .. } => "GetStats",
            CoordRequest::GetSignal { .. } => "GetSignal",
            CoordRequest::GetCorridor { .. } => "GetCorridor",
            CoordRequest::GetAlert { .. } => "GetAlert",
            CoordRequest::GetEventLog { .. } => "GetEventLog",
            CoordRequest::GetTime { .. } => "GetTime",
            CoordRequest::Shutdown => "Shutdown",
        }
    }
}
