//! ResponderDirectory - responder units and proximity queries

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{DistanceMetric, GeoPoint, Location, Unit, UnitStatus};
use crate::error::{EngineError, EngineResult, EntityKind};

/// Owns the responder units; distance is computed per query with the injected metric
#[derive(Debug)]
pub struct ResponderDirectory {
    units: BTreeMap<String, Unit>,
    metric: Arc<dyn DistanceMetric>,
}

impl ResponderDirectory {
    pub fn new(metric: Arc<dyn DistanceMetric>) -> Self {
        debug!(?metric, "ResponderDirectory::new: called");
        Self {
            units: BTreeMap::new(),
            metric,
        }
    }

    pub fn register(&mut self, unit: Unit) -> EngineResult<()> {
        debug!(unit_id = %unit.id, call_sign = %unit.call_sign, "ResponderDirectory::register: called");
        if self.units.contains_key(&unit.id) {
            return Err(EngineError::duplicate(EntityKind::Unit, &unit.id));
        }
        self.units.insert(unit.id.clone(), unit);
        Ok(())
    }

    pub fn get(&self, unit_id: &str) -> Option<&Unit> {
        self.units.get(unit_id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn count_available(&self) -> usize {
        self.units.values().filter(|u| u.is_available()).count()
    }

    /// Distance from a point to a unit's last known location
    pub fn distance_km(&self, from: &GeoPoint, unit: &Unit) -> f64 {
        self.metric.distance_km(from, &unit.location.point)
    }

    /// AVAILABLE units within `radius_km` of `location`, boundary inclusive
    pub fn find_available_within(&self, location: &GeoPoint, radius_km: f64) -> BTreeSet<String> {
        let found: BTreeSet<String> = self
            .units
            .values()
            .filter(|u| u.is_available() && self.distance_km(location, u) <= radius_km)
            .map(|u| u.id.clone())
            .collect();
        debug!(?location, radius_km, count = found.len(), "ResponderDirectory::find_available_within");
        found
    }

    pub fn update_status(&mut self, unit_id: &str, status: UnitStatus, now: DateTime<Utc>) -> EngineResult<&Unit> {
        debug!(%unit_id, %status, "ResponderDirectory::update_status: called");
        let unit = self.unit_mut(unit_id)?;
        unit.status = status;
        unit.last_seen = now;
        Ok(&*unit)
    }

    pub fn update_location(&mut self, unit_id: &str, location: Location, now: DateTime<Utc>) -> EngineResult<&Unit> {
        debug!(%unit_id, location = %location, "ResponderDirectory::update_location: called");
        let unit = self.unit_mut(unit_id)?;
        unit.location = location;
        unit.last_seen = now;
        Ok(&*unit)
    }

    /// Refresh last-seen without changing anything else
    pub fn touch(&mut self, unit_id: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.unit_mut(unit_id)?.last_seen = now;
        Ok(())
    }

    fn unit_mut(&mut self, unit_id: &str) -> EngineResult<&mut Unit> {
        self.units
            .get_mut(unit_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Unit, unit_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Planar;
    use chrono::Duration;

    fn directory() -> ResponderDirectory {
        let now = Utc::now();
        let mut dir = ResponderDirectory::new(Arc::new(Planar));
        dir.register(Unit::new("U1", "Alpha-1", Location::new("Downtown", 0.8, 0.0), now))
            .unwrap();
        dir.register(Unit::new("U2", "Bravo-2", Location::new("Midtown", 1.2, 0.0), now).with_status(UnitStatus::Responding))
            .unwrap();
        dir.register(Unit::new("U3", "Charlie-3", Location::new("Eastside", 3.0, 4.0), now))
            .unwrap();
        dir.register(Unit::new("U4", "Delta-4", Location::new("Northside", 0.0, 5.1), now))
            .unwrap();
        dir
    }

    #[test]
    fn test_find_available_within_radius() {
        let dir = directory();
        let found = dir.find_available_within(&GeoPoint::new(0.0, 0.0), 5.0);
        // U2 is responding, U4 is 5.1 km out
        let expected: BTreeSet<String> = ["U1", "U3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let dir = directory();
        // U3 sits at exactly 5.0 km
        assert!(dir.find_available_within(&GeoPoint::new(0.0, 0.0), 5.0).contains("U3"));
        assert!(!dir.find_available_within(&GeoPoint::new(0.0, 0.0), 4.999).contains("U3"));
    }

    #[test]
    fn test_no_units_in_range_is_empty() {
        let dir = directory();
        assert!(dir.find_available_within(&GeoPoint::new(100.0, 100.0), 1.0).is_empty());
    }

    #[test]
    fn test_update_status_and_location() {
        let mut dir = directory();
        let later = Utc::now() + Duration::seconds(30);

        let unit = dir.update_status("U1", UnitStatus::Busy, later).unwrap();
        assert_eq!(unit.status, UnitStatus::Busy);
        assert_eq!(unit.last_seen, later);
        assert!(!dir.find_available_within(&GeoPoint::new(0.0, 0.0), 5.0).contains("U1"));

        dir.update_location("U4", Location::new("Downtown", 0.0, 1.0), later).unwrap();
        assert!(dir.find_available_within(&GeoPoint::new(0.0, 0.0), 5.0).contains("U4"));
    }

    #[test]
    fn test_unknown_unit_not_found() {
        let mut dir = directory();
        assert!(dir.update_status("U9", UnitStatus::Busy, Utc::now()).unwrap_err().is_not_found());
        assert!(
            dir.update_location("U9", Location::new("x", 0.0, 0.0), Utc::now())
                .unwrap_err()
                .is_not_found()
        );
        assert!(dir.touch("U9", Utc::now()).is_err());
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let mut dir = directory();
        let err = dir
            .register(Unit::new("U1", "Alpha-1", Location::new("Downtown", 0.0, 0.0), Utc::now()))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId { .. }));
        assert_eq!(dir.len(), 4);
        assert_eq!(dir.count_available(), 3);
    }
}
