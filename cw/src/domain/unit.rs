//! Responder units

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Location;

/// Responder availability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    #[default]
    Available,
    Busy,
    Responding,
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitStatus::Available => write!(f, "AVAILABLE"),
            UnitStatus::Busy => write!(f, "BUSY"),
            UnitStatus::Responding => write!(f, "RESPONDING"),
        }
    }
}

/// A responder resource (police unit, patrol car)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    #[serde(rename = "call-sign")]
    pub call_sign: String,
    pub location: Location,
    pub status: UnitStatus,
    #[serde(rename = "last-seen")]
    pub last_seen: DateTime<Utc>,
}

impl Unit {
    pub fn new(id: impl Into<String>, call_sign: impl Into<String>, location: Location, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            call_sign: call_sign.into(),
            location,
            status: UnitStatus::Available,
            last_seen: now,
        }
    }

    pub fn with_status(mut self, status: UnitStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == UnitStatus::Available
    }
}
