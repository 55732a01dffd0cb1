//! Domain types: signals, corridors, responder units, alerts, detections

mod alert;
mod corridor;
mod detection;
mod geo;
mod id;
mod signal;
mod unit;

pub use alert::{Alert, AlertClass, AlertSnapshot, AlertStatus};
pub use corridor::{Corridor, CorridorActivation, CorridorStatus, SkipReason, SkippedMember};
pub use detection::{Detection, DetectionEvent, DetectionOutcome};
pub use geo::{DistanceMetric, EARTH_RADIUS_KM, GeoPoint, Haversine, Location, Planar};
pub use id::generate_id;
pub use signal::{Phase, Signal, SignalCommand, SignalMode, SignalTiming};
pub use unit::{Unit, UnitStatus};
