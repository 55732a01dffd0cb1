//! Detection intake and the dispatch policy

use tracing::{debug, info, warn};

use crate::config::AlertConfig;
use crate::domain::{AlertClass, Detection, DetectionEvent, DetectionOutcome, generate_id};
use crate::events::{EngineEvent, LogKind, Severity};

use super::core::Engine;

/// Alert class for a detection, or None if it stays below the dispatch threshold
///
/// Siren-confirmed sightings are EMERGENCY; visual-only ones are WARNING.
pub fn classify(event: &DetectionEvent, policy: &AlertConfig) -> Option<AlertClass> {
    if event.confidence.is_nan() || event.confidence < policy.confidence_threshold {
        return None;
    }
    Some(if event.siren_confirmed {
        AlertClass::Emergency
    } else {
        AlertClass::Warning
    })
}

impl Engine {
    /// Record a detection and act on it
    ///
    /// Above threshold an alert is dispatched around the sighting. An
    /// EMERGENCY sighting carrying a route also gets a corridor when
    /// auto-corridor is on. A corridor that cannot be formed is noted in the
    /// outcome rather than failing the detection.
    pub fn on_detection_event(&mut self, event: DetectionEvent) -> DetectionOutcome {
        debug!(
            vehicle_type = %event.vehicle_type,
            confidence = event.confidence,
            siren = event.siren_confirmed,
            "Engine::on_detection_event: called"
        );
        let detection = Detection {
            id: generate_id("DET"),
            detected_at: self.now(),
            event,
        };
        self.vehicles_detected += 1;
        self.detections.push_front(detection.clone());
        self.detections.truncate(self.config.coordinator.recent_detections.max(1));
        self.bus.emit(EngineEvent::DetectionRecorded {
            detection: detection.clone(),
        });

        let event = &detection.event;
        let mut outcome = DetectionOutcome {
            detection_id: detection.id.clone(),
            alert: None,
            corridor: None,
            notes: Vec::new(),
        };

        let Some(class) = classify(event, &self.config.alerts) else {
            warn!(
                detection_id = %detection.id,
                confidence = event.confidence,
                threshold = self.config.alerts.confidence_threshold,
                "Detection below dispatch threshold"
            );
            outcome.notes.push(format!(
                "confidence {:.2} below threshold {:.2}",
                event.confidence, self.config.alerts.confidence_threshold
            ));
            self.note(
                LogKind::Detection,
                Severity::Info,
                Some(&event.vehicle_type),
                event.location.label.clone(),
                format!(
                    "{} sighted at {:.0}% confidence, not dispatched",
                    event.vehicle_type,
                    event.confidence * 100.0
                ),
            );
            return outcome;
        };

        info!(detection_id = %detection.id, vehicle_type = %event.vehicle_type, %class, "Detection accepted");
        self.note(
            LogKind::Detection,
            Severity::Warning,
            Some(&event.vehicle_type),
            event.location.label.clone(),
            format!(
                "{} detected at {:.0}% confidence{}",
                event.vehicle_type,
                event.confidence * 100.0,
                if event.siren_confirmed { ", siren confirmed" } else { "" }
            ),
        );

        match self.dispatch_alert(class, &event.vehicle_type, event.location.clone(), None) {
            Ok(alert) => outcome.alert = Some(alert),
            Err(e) => {
                warn!(detection_id = %detection.id, error = %e, "Alert dispatch failed");
                outcome.notes.push(format!("alert not dispatched: {e}"));
            }
        }

        if event.route.is_empty() {
            return outcome;
        }
        if class != AlertClass::Emergency {
            outcome.notes.push("route ignored: siren not confirmed".to_string());
            return outcome;
        }
        if !self.config.alerts.auto_corridor {
            outcome.notes.push("route ignored: auto-corridor disabled".to_string());
            return outcome;
        }

        let corridor_id = generate_id("COR");
        let duration = self.config.corridor.default_duration_secs;
        match self.request_corridor(&corridor_id, &event.vehicle_type, event.route.clone(), duration) {
            Ok(activation) => outcome.corridor = Some(activation),
            Err(e) => {
                warn!(detection_id = %detection.id, %corridor_id, error = %e, "Automatic corridor failed");
                self.note(
                    LogKind::RouteClear,
                    Severity::Error,
                    Some(&event.vehicle_type),
                    event.route.join(" > "),
                    format!("Corridor for detection {} not formed: {e}", detection.id),
                );
                outcome.notes.push(format!("corridor not formed: {e}"));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Location;

    fn sighting(confidence: f64, siren: bool) -> DetectionEvent {
        DetectionEvent::new("Ambulance", Location::new("Main St", 0.0, 0.0), confidence, siren)
    }

    #[test]
    fn test_classify_thresholds() {
        let policy = AlertConfig::default();
        assert_eq!(classify(&sighting(0.95, true), &policy), Some(AlertClass::Emergency));
        assert_eq!(classify(&sighting(0.95, false), &policy), Some(AlertClass::Warning));
        assert_eq!(classify(&sighting(0.8, true), &policy), Some(AlertClass::Emergency));
        assert_eq!(classify(&sighting(0.79, true), &policy), None);
        assert_eq!(classify(&sighting(f64::NAN, true), &policy), None);
    }
}
