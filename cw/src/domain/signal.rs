//! Traffic signal state

use serde::{Deserialize, Serialize};

/// Signal light phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Red,
    Yellow,
    Green,
}

impl Phase {
    /// Next phase in the normal cycle: RED -> GREEN -> YELLOW -> RED
    pub fn next(self) -> Self {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Yellow,
            Phase::Yellow => Phase::Red,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Red => write!(f, "RED"),
            Phase::Yellow => write!(f, "YELLOW"),
            Phase::Green => write!(f, "GREEN"),
        }
    }
}

/// Operating mode of a signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalMode {
    #[default]
    Normal,
    Preempted,
    Emergency,
}

impl std::fmt::Display for SignalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalMode::Normal => write!(f, "NORMAL"),
            SignalMode::Preempted => write!(f, "PREEMPTED"),
            SignalMode::Emergency => write!(f, "EMERGENCY"),
        }
    }
}

/// Normal-cycle phase durations, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTiming {
    pub red_secs: u64,
    pub yellow_secs: u64,
    pub green_secs: u64,
}

impl SignalTiming {
    /// Configured duration of a phase in the normal cycle
    pub fn duration_for(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Red => self.red_secs,
            Phase::Yellow => self.yellow_secs,
            Phase::Green => self.green_secs,
        }
    }
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            red_secs: 30,
            yellow_secs: 5,
            green_secs: 30,
        }
    }
}

/// A controllable traffic light at one intersection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub location: String,
    pub phase: Phase,
    pub mode: SignalMode,
    #[serde(rename = "phase-time-remaining")]
    pub phase_time_remaining: u64,
    pub connected: bool,
    /// Hold window re-armed while an override is in force
    #[serde(rename = "override-secs", default, skip_serializing_if = "Option::is_none")]
    pub override_secs: Option<u64>,
}

impl Signal {
    /// Create a connected signal at the start of its RED phase
    pub fn new(id: impl Into<String>, location: impl Into<String>, timing: &SignalTiming) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            phase: Phase::Red,
            mode: SignalMode::Normal,
            phase_time_remaining: timing.red_secs,
            connected: true,
            override_secs: None,
        }
    }

    /// Start the signal at a given phase with a full phase duration
    pub fn starting_at(mut self, phase: Phase, timing: &SignalTiming) -> Self {
        self.phase = phase;
        self.phase_time_remaining = timing.duration_for(phase);
        self
    }

    /// Mark the signal as disconnected
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Whether an emergency or preemption override is in force
    pub fn is_overridden(&self) -> bool {
        self.mode != SignalMode::Normal
    }

    /// Desired-state command for the controller adapter
    pub fn command(&self) -> SignalCommand {
        SignalCommand {
            signal_id: self.id.clone(),
            phase: self.phase,
            mode: self.mode,
        }
    }
}

/// Desired-state command consumed by the signal-controller adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCommand {
    #[serde(rename = "signal-id")]
    pub signal_id: String,
    pub phase: Phase,
    pub mode: SignalMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle_order() {
        assert_eq!(Phase::Red.next(), Phase::Green);
        assert_eq!(Phase::Green.next(), Phase::Yellow);
        assert_eq!(Phase::Yellow.next(), Phase::Red);
    }

    #[test]
    fn test_new_signal_starts_red() {
        let timing = SignalTiming::default();
        let signal = Signal::new("SIG001", "Main St & 5th Ave", &timing);
        assert_eq!(signal.phase, Phase::Red);
        assert_eq!(signal.mode, SignalMode::Normal);
        assert_eq!(signal.phase_time_remaining, 30);
        assert!(signal.connected);
        assert!(!signal.is_overridden());
    }

    #[test]
    fn test_phase_serializes_uppercase() {
        let json = serde_json::to_string(&Phase::Yellow).unwrap();
        assert_eq!(json, "\"YELLOW\"");
        let mode: SignalMode = serde_json::from_str("\"EMERGENCY\"").unwrap();
        assert_eq!(mode, SignalMode::Emergency);
    }
}
