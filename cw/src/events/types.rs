//! Event types for engine activity streaming
//!
//! These events represent everything the engine tells the outside world:
//! - Desired signal state (for the controller adapter)
//! - Corridor lifecycle
//! - Alert dispatch and acknowledgment
//! - Detections and unit updates

use serde::{Deserialize, Serialize};

use crate::domain::{AlertSnapshot, Corridor, Detection, Phase, SignalCommand, SignalMode, Unit};

/// Core event enum - the vocabulary of engine activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    // === Signals ===
    /// Desired state for a physical signal
    SignalCommand {
        #[serde(rename = "signal-id")]
        signal_id: String,
        phase: Phase,
        mode: SignalMode,
    },
    /// Controller reported a connectivity change
    SignalConnectivity {
        #[serde(rename = "signal-id")]
        signal_id: String,
        connected: bool,
    },

    // === Corridors ===
    /// A corridor was created or changed status
    CorridorUpdated { corridor: Corridor },

    // === Alerts ===
    AlertDispatched { alert: AlertSnapshot },
    /// An acknowledgment changed the alert
    AlertUpdated { alert: AlertSnapshot },

    // === Inputs ===
    DetectionRecorded { detection: Detection },
    UnitUpdated { unit: Unit },

    /// A tick finished processing
    Tick { tick: u64 },
}

impl EngineEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::SignalCommand { .. } => "SignalCommand",
            EngineEvent::SignalConnectivity { .. } => "SignalConnectivity",
            EngineEvent::CorridorUpdated { .. } => "CorridorUpdated",
            EngineEvent::AlertDispatched { .. } => "AlertDispatched",
            EngineEvent::AlertUpdated { .. } => "AlertUpdated",
            EngineEvent::DetectionRecorded { .. } => "DetectionRecorded",
            EngineEvent::UnitUpdated { .. } => "UnitUpdated",
            EngineEvent::Tick { .. } => "Tick",
        }
    }

    /// The command carried by a `SignalCommand` event
    pub fn as_signal_command(&self) -> Option<SignalCommand> {
        match self {
            EngineEvent::SignalCommand { signal_id, phase, mode } => Some(SignalCommand {
                signal_id: signal_id.clone(),
                phase: *phase,
                mode: *mode,
            }),
            _ => None,
        }
    }
}

impl From<SignalCommand> for EngineEvent {
    fn from(cmd: SignalCommand) -> Self {
        EngineEvent::SignalCommand {
            signal_id: cmd.signal_id,
            phase: cmd.phase,
            mode: cmd.mode,
        }
    }
}
