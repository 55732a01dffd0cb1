//! Read models handed out by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AlertSnapshot, AlertStatus, Corridor, CorridorStatus, Detection, Signal, SignalMode, Unit};

use super::core::Engine;

/// What one tick changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    #[serde(rename = "phase-changes")]
    pub phase_changes: usize,
    /// Corridors that became CLEARING or COMPLETED this tick
    #[serde(rename = "corridor-updates")]
    pub corridor_updates: Vec<Corridor>,
}

/// Point-in-time copy of every collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub tick: u64,
    #[serde(rename = "taken-at")]
    pub taken_at: DateTime<Utc>,
    pub signals: Vec<Signal>,
    /// Live corridors
    pub corridors: Vec<Corridor>,
    /// Completed and aborted corridors, oldest first
    #[serde(rename = "finished-corridors")]
    pub finished_corridors: Vec<Corridor>,
    pub units: Vec<Unit>,
    /// Live alerts
    pub alerts: Vec<AlertSnapshot>,
    #[serde(rename = "recent-detections")]
    pub recent_detections: Vec<Detection>,
}

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineStats {
    pub ticks: u64,
    pub total_signals: usize,
    pub connected_signals: usize,
    /// Signals in EMERGENCY or PREEMPTED mode
    pub signals_in_override: usize,
    pub active_corridors: usize,
    pub completed_corridors: usize,
    pub aborted_corridors: usize,
    /// Members released by completed corridors
    pub cleared_intersections: u64,
    pub alerts_sent: u64,
    pub alerts_acknowledged: usize,
    /// Sum of recipients over every alert
    pub units_alerted: usize,
    pub vehicles_detected: u64,
    pub total_units: usize,
    pub available_units: usize,
}

impl Engine {
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            tick: self.ticks,
            taken_at: self.now(),
            signals: self.signals.signals().cloned().collect(),
            corridors: self.corridors.live().cloned().collect(),
            finished_corridors: self.corridors.archive().to_vec(),
            units: self.responders.units().cloned().collect(),
            alerts: self.alerts.live().map(|a| a.snapshot()).collect(),
            recent_detections: self.detections.iter().cloned().collect(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            ticks: self.ticks,
            total_signals: self.signals.len(),
            connected_signals: self.signals.signals().filter(|s| s.connected).count(),
            signals_in_override: self.signals.signals().filter(|s| s.mode != SignalMode::Normal).count(),
            active_corridors: self.corridors.live_count(),
            completed_corridors: self.corridors.count_archived(CorridorStatus::Completed),
            aborted_corridors: self.corridors.count_archived(CorridorStatus::Aborted),
            cleared_intersections: self.corridors.cleared_intersections(),
            alerts_sent: self.alerts.sent_count(),
            alerts_acknowledged: self
                .alerts
                .all()
                .filter(|a| a.status() == AlertStatus::Acknowledged)
                .count(),
            units_alerted: self.alerts.all().map(|a| a.recipient_ids().len()).sum(),
            vehicles_detected: self.vehicles_detected,
            total_units: self.responders.len(),
            available_units: self.responders.count_available(),
        }
    }
}
