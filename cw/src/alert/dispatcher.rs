//! AlertDispatcher - alert creation and acknowledgment tracking

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{Alert, AlertClass, AlertStatus, Location, generate_id};
use crate::error::{EngineError, EngineResult, EntityKind};
use crate::responder::ResponderDirectory;

/// Outcome of applying an acknowledgment
#[derive(Debug, Clone, PartialEq)]
pub struct AckOutcome {
    pub alert: Alert,
    /// False when the unit had already acknowledged
    pub newly_acked: bool,
    pub previous_status: AlertStatus,
}

impl AckOutcome {
    pub fn status_changed(&self) -> bool {
        self.alert.status() != self.previous_status
    }
}

/// Owns live alerts and the archive of retired ones
#[derive(Debug, Default)]
pub struct AlertDispatcher {
    live: BTreeMap<String, Alert>,
    archive: Vec<Alert>,
    sent: u64,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an alert addressed to every AVAILABLE unit within `radius_km`
    ///
    /// Recipients are fixed now and never recomputed. An alert with no
    /// recipients is still recorded: lack of coverage is worth knowing about.
    pub fn dispatch(
        &mut self,
        directory: &ResponderDirectory,
        class: AlertClass,
        vehicle_type: &str,
        location: Location,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> EngineResult<Alert> {
        debug!(%class, %vehicle_type, location = %location, radius_km, "AlertDispatcher::dispatch: called");
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(EngineError::InvalidRadius(radius_km));
        }

        let recipients = directory.find_available_within(&location.point, radius_km);
        let alert = Alert::new(generate_id("ALT"), class, vehicle_type, location, recipients, now);
        info!(
            alert_id = %alert.id,
            %class,
            %vehicle_type,
            recipients = alert.recipient_ids().len(),
            "Alert dispatched"
        );

        self.sent += 1;
        self.live.insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    /// Apply an acknowledgment; repeating it is a no-op
    pub fn acknowledge(&mut self, alert_id: &str, unit_id: &str) -> EngineResult<AckOutcome> {
        debug!(%alert_id, %unit_id, "AlertDispatcher::acknowledge: called");
        let Some(alert) = self.live.get_mut(alert_id) else {
            if self.archive.iter().any(|a| a.id == alert_id) {
                return Err(EngineError::InvalidState {
                    kind: EntityKind::Alert,
                    id: alert_id.to_string(),
                    state: "archived".to_string(),
                    operation: "acknowledge",
                });
            }
            return Err(EngineError::not_found(EntityKind::Alert, alert_id));
        };

        let previous_status = alert.status();
        let newly_acked = alert.acknowledge(unit_id)?;
        if newly_acked && alert.status() == AlertStatus::Acknowledged {
            info!(%alert_id, recipients = alert.recipient_ids().len(), "Alert fully acknowledged");
        } else if !newly_acked {
            debug!(%alert_id, %unit_id, "AlertDispatcher::acknowledge: repeat acknowledgment ignored");
        }

        Ok(AckOutcome {
            alert: alert.clone(),
            newly_acked,
            previous_status,
        })
    }

    /// Move alerts created before `cutoff` to the archive; returns how many moved
    pub fn archive_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        debug!(%cutoff, "AlertDispatcher::archive_older_than: called");
        let expired: Vec<String> = self
            .live
            .values()
            .filter(|a| a.created_at < cutoff)
            .map(|a| a.id.clone())
            .collect();
        for id in &expired {
            if let Some(alert) = self.live.remove(id) {
                self.archive.push(alert);
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Alerts archived");
        }
        expired.len()
    }

    /// Look up an alert, live or archived
    pub fn get(&self, alert_id: &str) -> Option<&Alert> {
        self.live
            .get(alert_id)
            .or_else(|| self.archive.iter().find(|a| a.id == alert_id))
    }

    pub fn live(&self) -> impl Iterator<Item = &Alert> {
        self.live.values()
    }

    pub fn archive(&self) -> &[Alert] {
        &self.archive
    }

    /// Alerts dispatched since start, including archived ones
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    pub fn all(&self) -> impl Iterator<Item = &Alert> {
        self.live.values().chain(self.archive.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Planar, Unit, UnitStatus};
    use chrono::Duration;
    use std::sync::Arc;

    fn directory() -> ResponderDirectory {
        let now = Utc::now();
        let mut dir = ResponderDirectory::new(Arc::new(Planar));
        dir.register(Unit::new("U1", "Alpha-1", Location::new("a", 1.0, 0.0), now))
            .unwrap();
        dir.register(Unit::new("U2", "Bravo-2", Location::new("b", 2.0, 0.0), now))
            .unwrap();
        dir.register(Unit::new("U3", "Charlie-3", Location::new("c", 9.0, 0.0), now))
            .unwrap();
        dir
    }

    fn origin() -> Location {
        Location::new("Main St & 5th Ave", 0.0, 0.0)
    }

    #[test]
    fn test_dispatch_snapshots_recipients() {
        let mut dir = directory();
        let mut dispatcher = AlertDispatcher::new();
        let alert = dispatcher
            .dispatch(&dir, AlertClass::Emergency, "Ambulance", origin(), 5.0, Utc::now())
            .unwrap();
        assert_eq!(alert.recipient_ids().len(), 2);
        assert_eq!(alert.status(), AlertStatus::Sent);

        // Availability changes after dispatch do not touch the snapshot
        dir.update_status("U1", UnitStatus::Busy, Utc::now()).unwrap();
        let stored = dispatcher.get(&alert.id).unwrap();
        assert!(stored.recipient_ids().contains("U1"));
        assert!(dispatcher.acknowledge(&alert.id, "U1").is_ok());
    }

    #[test]
    fn test_dispatch_with_no_coverage_still_recorded() {
        let dir = directory();
        let mut dispatcher = AlertDispatcher::new();
        let alert = dispatcher
            .dispatch(&dir, AlertClass::Warning, "Police", Location::new("far", 500.0, 0.0), 5.0, Utc::now())
            .unwrap();
        assert!(alert.recipient_ids().is_empty());
        assert_eq!(dispatcher.get(&alert.id).unwrap().status(), AlertStatus::Sent);
        assert_eq!(dispatcher.sent_count(), 1);
    }

    #[test]
    fn test_dispatch_rejects_bad_radius() {
        let dir = directory();
        let mut dispatcher = AlertDispatcher::new();
        for radius in [-1.0, f64::NAN, f64::INFINITY] {
            let err = dispatcher
                .dispatch(&dir, AlertClass::Info, "Police", origin(), radius, Utc::now())
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidRadius(_)));
        }
        assert_eq!(dispatcher.sent_count(), 0);
    }

    #[test]
    fn test_acknowledge_transitions() {
        let dir = directory();
        let mut dispatcher = AlertDispatcher::new();
        let alert = dispatcher
            .dispatch(&dir, AlertClass::Emergency, "Fire Truck", origin(), 5.0, Utc::now())
            .unwrap();

        let first = dispatcher.acknowledge(&alert.id, "U1").unwrap();
        assert!(first.newly_acked);
        assert!(first.status_changed());
        assert_eq!(first.alert.status(), AlertStatus::Delivered);

        let repeat = dispatcher.acknowledge(&alert.id, "U1").unwrap();
        assert!(!repeat.newly_acked);
        assert!(!repeat.status_changed());
        assert_eq!(repeat.alert.acked_by().len(), 1);

        let last = dispatcher.acknowledge(&alert.id, "U2").unwrap();
        assert_eq!(last.previous_status, AlertStatus::Delivered);
        assert_eq!(last.alert.status(), AlertStatus::Acknowledged);
    }

    #[test]
    fn test_acknowledge_errors() {
        let dir = directory();
        let mut dispatcher = AlertDispatcher::new();
        let alert = dispatcher
            .dispatch(&dir, AlertClass::Emergency, "Ambulance", origin(), 5.0, Utc::now())
            .unwrap();

        assert!(dispatcher.acknowledge("ALT-missing", "U1").unwrap_err().is_not_found());
        assert!(matches!(
            dispatcher.acknowledge(&alert.id, "U3").unwrap_err(),
            EngineError::NotARecipient { .. }
        ));
    }

    #[test]
    fn test_archive_older_than() {
        let dir = directory();
        let mut dispatcher = AlertDispatcher::new();
        let now = Utc::now();
        let old = dispatcher
            .dispatch(&dir, AlertClass::Info, "Police", origin(), 5.0, now - Duration::hours(2))
            .unwrap();
        let fresh = dispatcher
            .dispatch(&dir, AlertClass::Info, "Police", origin(), 5.0, now)
            .unwrap();

        assert_eq!(dispatcher.archive_older_than(now - Duration::hours(1)), 1);
        assert_eq!(dispatcher.live().count(), 1);
        assert_eq!(dispatcher.archive().len(), 1);
        assert!(dispatcher.get(&old.id).is_some());
        assert!(dispatcher.get(&fresh.id).is_some());
        assert_eq!(dispatcher.all().count(), 2);

        let err = dispatcher.acknowledge(&old.id, "U1").unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn unit_ids() -> impl Strategy<Value = Vec<String>> {
            prop::collection::vec(0usize..8, 0..24).prop_map(|ids| ids.into_iter().map(|i| format!("U{i}")).collect())
        }

        proptest! {
            #[test]
            fn acked_never_exceeds_recipients(acks in unit_ids()) {
                let dir = directory();
                let mut dispatcher = AlertDispatcher::new();
                let alert = dispatcher
                    .dispatch(&dir, AlertClass::Emergency, "Ambulance", origin(), 5.0, Utc::now())
                    .unwrap();

                for unit_id in &acks {
                    let _ = dispatcher.acknowledge(&alert.id, unit_id);
                    let stored = dispatcher.get(&alert.id).unwrap();
                    prop_assert!(stored.acked_by().is_subset(stored.recipient_ids()));
                }
            }

            #[test]
            fn repeated_acks_are_idempotent(acks in unit_ids()) {
                let dir = directory();
                let mut once = AlertDispatcher::new();
                let mut twice = AlertDispatcher::new();
                let a = once.dispatch(&dir, AlertClass::Warning, "Police", origin(), 5.0, Utc::now()).unwrap();
                let b = twice.dispatch(&dir, AlertClass::Warning, "Police", origin(), 5.0, Utc::now()).unwrap();

                for unit_id in &acks {
                    let _ = once.acknowledge(&a.id, unit_id);
                    let _ = twice.acknowledge(&b.id, unit_id);
                    let _ = twice.acknowledge(&b.id, unit_id);
                }
                let a = once.get(&a.id).unwrap();
                let b = twice.get(&b.id).unwrap();
                prop_assert_eq!(a.acked_by(), b.acked_by());
                prop_assert_eq!(a.status(), b.status());
            }
        }
    }
}
