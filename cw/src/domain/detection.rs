//! Classified detection events fed in by the vehicle/siren detector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::AlertSnapshot;
use super::corridor::CorridorActivation;
use super::geo::Location;

/// A classified emergency-vehicle sighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(rename = "vehicle-type")]
    pub vehicle_type: String,
    pub location: Location,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    #[serde(rename = "siren-confirmed", default)]
    pub siren_confirmed: bool,
    /// Planned route, when the detector knows where the vehicle is heading
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<String>,
}

impl DetectionEvent {
    pub fn new(vehicle_type: impl Into<String>, location: Location, confidence: f64, siren_confirmed: bool) -> Self {
        Self {
            vehicle_type: vehicle_type.into(),
            location,
            confidence,
            siren_confirmed,
            route: Vec::new(),
        }
    }

    pub fn with_route(mut self, route: Vec<String>) -> Self {
        self.route = route;
        self
    }
}

/// A recorded detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    #[serde(rename = "detected-at")]
    pub detected_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DetectionEvent,
}

/// What the coordinator did with a detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    #[serde(rename = "detection-id")]
    pub detection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corridor: Option<CorridorActivation>,
    /// Why no alert was dispatched, or why the corridor could not be formed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl DetectionOutcome {
    pub fn dispatched(&self) -> bool {
        self.alert.is_some()
    }
}
