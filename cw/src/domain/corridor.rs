//! Green corridor records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Corridor lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorridorStatus {
    Active,
    Clearing,
    Completed,
    Aborted,
}

impl CorridorStatus {
    /// ACTIVE or CLEARING: still holding its signals
    pub fn is_live(self) -> bool {
        matches!(self, CorridorStatus::Active | CorridorStatus::Clearing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }
}

impl std::fmt::Display for CorridorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorridorStatus::Active => write!(f, "ACTIVE"),
            CorridorStatus::Clearing => write!(f, "CLEARING"),
            CorridorStatus::Completed => write!(f, "COMPLETED"),
            CorridorStatus::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// A time-bounded emergency override across an ordered route of signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub id: String,
    #[serde(rename = "vehicle-type")]
    pub vehicle_type: String,
    /// Route as requested, in travel order
    pub route: Vec<String>,
    /// Route members that were usable at activation and carry the override
    pub members: Vec<String>,
    pub status: CorridorStatus,
    #[serde(rename = "duration-secs")]
    pub duration_secs: u64,
    #[serde(rename = "clearance-remaining")]
    pub clearance_remaining: u64,
    #[serde(rename = "created-at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "finished-at", default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Corridor {
    /// Whether this corridor currently holds the given signal
    pub fn holds(&self, signal_id: &str) -> bool {
        self.status.is_live() && self.members.iter().any(|m| m == signal_id)
    }
}

/// Why a route member was left out of a corridor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Unknown,
    Disconnected,
}

/// A route member excluded at activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMember {
    #[serde(rename = "signal-id")]
    pub signal_id: String,
    pub reason: SkipReason,
}

/// Result of a successful corridor creation
///
/// A non-empty `skipped` list marks a degraded activation: the corridor is
/// live over the usable subset of its route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorActivation {
    pub corridor: Corridor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedMember>,
}

impl CorridorActivation {
    pub fn is_degraded(&self) -> bool {
        !self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor(status: CorridorStatus) -> Corridor {
        Corridor {
            id: "COR1".to_string(),
            vehicle_type: "Ambulance".to_string(),
            route: vec!["S1".to_string(), "S2".to_string()],
            members: vec!["S1".to_string()],
            status,
            duration_secs: 120,
            clearance_remaining: 120,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    #[test]
    fn test_live_statuses() {
        assert!(CorridorStatus::Active.is_live());
        assert!(CorridorStatus::Clearing.is_live());
        assert!(CorridorStatus::Completed.is_terminal());
        assert!(CorridorStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_holds_only_members_while_live() {
        let live = corridor(CorridorStatus::Clearing);
        assert!(live.holds("S1"));
        assert!(!live.holds("S2"));

        let done = corridor(CorridorStatus::Completed);
        assert!(!done.holds("S1"));
    }

    #[test]
    fn test_activation_degraded_flag() {
        let mut activation = CorridorActivation {
            corridor: corridor(CorridorStatus::Active),
            skipped: vec![],
        };
        assert!(!activation.is_degraded());

        activation.skipped.push(SkippedMember {
            signal_id: "S2".to_string(),
            reason: SkipReason::Disconnected,
        });
        assert!(activation.is_degraded());
    }
}
