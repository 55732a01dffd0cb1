//! CorridorManager - green corridor lifecycle over the signal registry

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{Corridor, CorridorActivation, CorridorStatus, SkipReason, SkippedMember};
use crate::error::{EngineError, EngineResult, EntityKind};
use crate::signals::SignalRegistry;

/// Owns live corridors and the archive of finished ones
///
/// The manager is the only writer of corridor-owned signal overrides: it
/// overrides members on creation and releases them on completion or abort.
#[derive(Debug)]
pub struct CorridorManager {
    live: BTreeMap<String, Corridor>,
    archive: Vec<Corridor>,
    /// Fraction of the original duration below which a corridor is CLEARING
    clearing_threshold: f64,
    tick_secs: u64,
    cleared_intersections: u64,
}

impl CorridorManager {
    pub fn new(clearing_threshold: f64, tick_secs: u64) -> Self {
        debug!(clearing_threshold, tick_secs, "CorridorManager::new: called");
        Self {
            live: BTreeMap::new(),
            archive: Vec::new(),
            clearing_threshold,
            tick_secs,
            cleared_intersections: 0,
        }
    }

    /// Activate a corridor over the usable members of `route`
    ///
    /// Unknown and disconnected members are skipped and reported in the
    /// activation; the corridor fails only when nothing on the route is usable.
    /// If overriding a member fails, members already overridden are restored.
    pub fn create(
        &mut self,
        registry: &mut SignalRegistry,
        corridor_id: &str,
        vehicle_type: &str,
        route: Vec<String>,
        duration: u64,
        now: DateTime<Utc>,
    ) -> EngineResult<CorridorActivation> {
        debug!(%corridor_id, %vehicle_type, ?route, duration, "CorridorManager::create: called");
        if route.is_empty() {
            return Err(EngineError::EmptyRoute);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = route.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(EngineError::DuplicateRouteMember(dup.clone()));
        }
        if duration == 0 {
            return Err(EngineError::InvalidDuration);
        }
        if self.live.contains_key(corridor_id) {
            return Err(EngineError::duplicate(EntityKind::Corridor, corridor_id));
        }

        let mut members = Vec::new();
        let mut skipped = Vec::new();
        for signal_id in &route {
            match registry.check_usable(signal_id) {
                Ok(_) => members.push(signal_id.clone()),
                Err(EngineError::Disconnected(_)) => {
                    debug!(%signal_id, "CorridorManager::create: member disconnected, skipping");
                    skipped.push(SkippedMember {
                        signal_id: signal_id.clone(),
                        reason: SkipReason::Disconnected,
                    });
                }
                Err(_) => {
                    debug!(%signal_id, "CorridorManager::create: member unknown, skipping");
                    skipped.push(SkippedMember {
                        signal_id: signal_id.clone(),
                        reason: SkipReason::Unknown,
                    });
                }
            }
        }
        if members.is_empty() {
            warn!(%corridor_id, "No usable signal on corridor route");
            return Err(EngineError::AllDisconnected(route));
        }

        let prior: Vec<_> = members.iter().filter_map(|id| registry.get(id).cloned()).collect();
        for (applied, signal_id) in members.iter().enumerate() {
            if let Err(e) = registry.override_signal(signal_id, duration) {
                warn!(%corridor_id, %signal_id, error = %e, "Override failed, rolling back corridor");
                for snapshot in prior.into_iter().take(applied) {
                    registry.restore(snapshot);
                }
                return Err(e);
            }
        }

        let corridor = Corridor {
            id: corridor_id.to_string(),
            vehicle_type: vehicle_type.to_string(),
            route,
            members,
            status: CorridorStatus::Active,
            duration_secs: duration,
            clearance_remaining: duration,
            created_at: now,
            finished_at: None,
        };
        if skipped.is_empty() {
            info!(%corridor_id, %vehicle_type, members = corridor.members.len(), "Corridor activated");
        } else {
            warn!(
                %corridor_id,
                %vehicle_type,
                members = corridor.members.len(),
                skipped = skipped.len(),
                "Corridor activated on partial route"
            );
        }
        self.live.insert(corridor.id.clone(), corridor.clone());
        Ok(CorridorActivation { corridor, skipped })
    }

    /// Decay clearance on every live corridor by one tick
    ///
    /// Returns the corridors whose status changed this tick. Completed
    /// corridors are archived and their members released.
    pub fn tick(&mut self, registry: &mut SignalRegistry, now: DateTime<Utc>) -> Vec<Corridor> {
        let mut transitioned = Vec::new();
        let mut completed = Vec::new();

        for corridor in self.live.values_mut() {
            corridor.clearance_remaining = corridor.clearance_remaining.saturating_sub(self.tick_secs);
            if corridor.clearance_remaining == 0 {
                corridor.status = CorridorStatus::Completed;
                corridor.finished_at = Some(now);
                completed.push(corridor.id.clone());
            } else if corridor.status == CorridorStatus::Active
                && (corridor.clearance_remaining as f64) <= self.clearing_threshold * corridor.duration_secs as f64
            {
                corridor.status = CorridorStatus::Clearing;
                info!(corridor_id = %corridor.id, remaining = corridor.clearance_remaining, "Corridor clearing");
                transitioned.push(corridor.clone());
            }
        }

        let finished: Vec<Corridor> = completed.iter().filter_map(|id| self.live.remove(id)).collect();
        for corridor in finished {
            let released = release_members(registry, &corridor, &self.live);
            self.cleared_intersections += released as u64;
            info!(corridor_id = %corridor.id, released, "Corridor completed");
            transitioned.push(corridor.clone());
            self.archive.push(corridor);
        }

        transitioned
    }

    /// Cancel a live corridor and release its signals immediately
    pub fn abort(
        &mut self,
        registry: &mut SignalRegistry,
        corridor_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Corridor> {
        debug!(%corridor_id, "CorridorManager::abort: called");
        let Some(mut corridor) = self.live.remove(corridor_id) else {
            return match self.archived(corridor_id) {
                Some(done) => Err(EngineError::InvalidState {
                    kind: EntityKind::Corridor,
                    id: corridor_id.to_string(),
                    state: done.status.to_string(),
                    operation: "abort",
                }),
                None => Err(EngineError::not_found(EntityKind::Corridor, corridor_id)),
            };
        };

        corridor.status = CorridorStatus::Aborted;
        corridor.finished_at = Some(now);
        let released = release_members(registry, &corridor, &self.live);
        info!(%corridor_id, released, remaining = corridor.clearance_remaining, "Corridor aborted");
        self.archive.push(corridor.clone());
        Ok(corridor)
    }

    /// Look up a corridor, live or archived (latest record for a reused id)
    pub fn get(&self, corridor_id: &str) -> Option<&Corridor> {
        self.live.get(corridor_id).or_else(|| self.archived(corridor_id))
    }

    fn archived(&self, corridor_id: &str) -> Option<&Corridor> {
        self.archive.iter().rev().find(|c| c.id == corridor_id)
    }

    pub fn live(&self) -> impl Iterator<Item = &Corridor> {
        self.live.values()
    }

    /// The live corridor holding `signal_id`, if any
    pub fn holder(&self, signal_id: &str) -> Option<&Corridor> {
        self.live.values().find(|c| c.holds(signal_id))
    }

    pub fn archive(&self) -> &[Corridor] {
        &self.archive
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn count_archived(&self, status: CorridorStatus) -> usize {
        self.archive.iter().filter(|c| c.status == status).count()
    }

    /// Members released by completed corridors so far
    pub fn cleared_intersections(&self) -> u64 {
        self.cleared_intersections
    }
}

/// Release a finished corridor's members, except those another live corridor still holds
fn release_members(registry: &mut SignalRegistry, corridor: &Corridor, live: &BTreeMap<String, Corridor>) -> usize {
    let mut released = 0;
    for signal_id in &corridor.members {
        if let Some(other) = live.values().find(|c| c.holds(signal_id)) {
            debug!(%signal_id, holder = %other.id, "release_members: still held by another corridor");
            continue;
        }
        match registry.release(signal_id) {
            Ok(true) => released += 1,
            Ok(false) => debug!(%signal_id, "release_members: already in normal cycle"),
            Err(e) => {
                warn!(corridor_id = %corridor.id, %signal_id, error = %e, "release_members: skipping member");
            }
        }
    }
    released
}
