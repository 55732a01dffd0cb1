//! Engine - single owner of every collection
//!
//! All mutation goes through `&mut self`, so whoever owns the engine (the
//! Coordinator task) serializes ticks and commands for free. Every operation
//! ends by flushing queued signal commands onto the event bus.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::alert::AlertDispatcher;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::corridor::CorridorManager;
use crate::domain::{
    AlertClass, AlertSnapshot, Corridor, CorridorActivation, CorridorStatus, Detection, DistanceMetric, Haversine,
    Location, Signal, Unit, UnitStatus,
};
use crate::error::{EngineError, EngineResult, EntityKind};
use crate::events::{EngineEvent, EventBus, EventLog, LogEntry, LogFilter, LogKind, Severity};
use crate::responder::ResponderDirectory;
use crate::signals::SignalRegistry;

use super::report::TickReport;

pub struct Engine {
    pub(super) config: Config,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) bus: Arc<EventBus>,
    pub(super) signals: SignalRegistry,
    pub(super) corridors: CorridorManager,
    pub(super) responders: ResponderDirectory,
    pub(super) alerts: AlertDispatcher,
    pub(super) log: EventLog,
    pub(super) detections: VecDeque<Detection>,
    pub(super) vehicles_detected: u64,
    pub(super) ticks: u64,
}

impl Engine {
    pub fn new(config: Config, clock: Arc<dyn Clock>, metric: Arc<dyn DistanceMetric>) -> Self {
        debug!(?config, ?clock, "Engine::new: called");
        let tick_secs = config.coordinator.tick_interval_secs;
        let bus = Arc::new(EventBus::new(config.coordinator.event_capacity));
        Self {
            signals: SignalRegistry::new(config.signals.timing(), tick_secs),
            corridors: CorridorManager::new(config.corridor.clearing_threshold, tick_secs),
            responders: ResponderDirectory::new(metric),
            alerts: AlertDispatcher::new(),
            log: EventLog::new(config.coordinator.event_log_capacity),
            detections: VecDeque::new(),
            vehicles_detected: 0,
            ticks: 0,
            clock,
            bus,
            config,
        }
    }

    /// Wall clock and great-circle distance
    pub fn with_defaults(config: Config) -> Self {
        Self::new(config, Arc::new(SystemClock), Arc::new(Haversine))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    // === Time ===

    /// Advance every signal and corridor by one tick
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let now = self.now();
        let phase_changes = self.signals.advance_all();
        let corridor_updates = self.corridors.tick(&mut self.signals, now);

        for corridor in &corridor_updates {
            let what = match corridor.status {
                CorridorStatus::Completed => "completed, route cleared",
                _ => "clearing",
            };
            self.note(
                LogKind::RouteClear,
                Severity::Info,
                Some(&corridor.vehicle_type),
                corridor.route.join(" > "),
                format!("Corridor {} {}", corridor.id, what),
            );
            self.bus.emit(EngineEvent::CorridorUpdated {
                corridor: corridor.clone(),
            });
        }
        self.flush();
        self.bus.emit(EngineEvent::Tick { tick: self.ticks });

        debug!(tick = self.ticks, phase_changes, corridors = corridor_updates.len(), "Engine::tick");
        TickReport {
            tick: self.ticks,
            phase_changes,
            corridor_updates,
        }
    }

    // === Signals ===

    pub fn register_signal(&mut self, signal: Signal) -> EngineResult<()> {
        let (id, location) = (signal.id.clone(), signal.location.clone());
        let result = self.signals.register(signal);
        if result.is_ok() {
            self.note(
                LogKind::System,
                Severity::Info,
                None,
                location,
                format!("Signal {id} registered"),
            );
        }
        self.flush();
        result
    }

    /// Override to emergency GREEN; `duration` defaults to the configured window
    pub fn request_override(&mut self, signal_id: &str, duration: Option<u64>) -> EngineResult<Signal> {
        let duration = duration.unwrap_or(self.config.signals.override_secs);
        let result = self.signals.override_signal(signal_id, duration).and_then(|_| self.signal_record(signal_id));
        self.after_signal_change(signal_id, &result, format!("Emergency override for {duration}s"));
        result
    }

    pub fn request_preempt(&mut self, signal_id: &str, duration: Option<u64>) -> EngineResult<Signal> {
        let duration = duration.unwrap_or(self.config.signals.override_secs);
        let result = self
            .check_not_held(signal_id, "preempt")
            .and_then(|_| self.signals.preempt(signal_id, duration))
            .and_then(|_| self.signal_record(signal_id));
        self.after_signal_change(signal_id, &result, format!("Preempted for {duration}s"));
        result
    }

    /// Returns false if the signal was already in its normal cycle
    ///
    /// A corridor member is refused; it goes back to normal when its corridor
    /// completes or is aborted.
    pub fn request_release(&mut self, signal_id: &str) -> EngineResult<bool> {
        let result = self
            .check_not_held(signal_id, "release")
            .and_then(|_| self.signals.release(signal_id));
        if let Ok(true) = result {
            let location = self.signal_location(signal_id);
            self.note(
                LogKind::SignalChange,
                Severity::Info,
                None,
                location,
                format!("Signal {signal_id} released to normal cycle"),
            );
        }
        self.flush();
        result
    }

    /// Record controller-reported connectivity; returns true if it changed
    pub fn set_signal_connected(&mut self, signal_id: &str, connected: bool) -> EngineResult<bool> {
        let result = self.signals.set_connected(signal_id, connected);
        if let Ok(true) = result {
            let location = self.signal_location(signal_id);
            let (severity, what) = if connected {
                (Severity::Info, "reconnected")
            } else {
                (Severity::Error, "lost connection")
            };
            self.note(
                LogKind::System,
                severity,
                None,
                location,
                format!("Signal {signal_id} {what}"),
            );
            self.bus.emit(EngineEvent::SignalConnectivity {
                signal_id: signal_id.to_string(),
                connected,
            });
        }
        self.flush();
        result
    }

    // === Corridors ===

    pub fn request_corridor(
        &mut self,
        corridor_id: &str,
        vehicle_type: &str,
        route: Vec<String>,
        duration: u64,
    ) -> EngineResult<CorridorActivation> {
        let now = self.now();
        let result = self
            .corridors
            .create(&mut self.signals, corridor_id, vehicle_type, route, duration, now);
        if let Ok(activation) = &result {
            self.record_activation(activation);
        }
        self.flush();
        result
    }

    /// Abort a live corridor; its signals are released before this returns
    pub fn request_abort(&mut self, corridor_id: &str) -> EngineResult<Corridor> {
        let now = self.now();
        let result = self.corridors.abort(&mut self.signals, corridor_id, now);
        if let Ok(corridor) = &result {
            self.note(
                LogKind::RouteClear,
                Severity::Warning,
                Some(&corridor.vehicle_type),
                corridor.route.join(" > "),
                format!(
                    "Corridor {} aborted with {}s remaining",
                    corridor.id, corridor.clearance_remaining
                ),
            );
            self.bus.emit(EngineEvent::CorridorUpdated {
                corridor: corridor.clone(),
            });
        }
        self.flush();
        result
    }

    pub(super) fn record_activation(&mut self, activation: &CorridorActivation) {
        let corridor = &activation.corridor;
        let (severity, description) = if activation.is_degraded() {
            let skipped: Vec<&str> = activation.skipped.iter().map(|s| s.signal_id.as_str()).collect();
            warn!(corridor_id = %corridor.id, ?skipped, "Corridor activated degraded");
            (
                Severity::Warning,
                format!(
                    "Corridor {} activated over {}/{} signals, skipped {}",
                    corridor.id,
                    corridor.members.len(),
                    corridor.route.len(),
                    skipped.join(", ")
                ),
            )
        } else {
            (
                Severity::Info,
                format!("Corridor {} activated for {}s", corridor.id, corridor.duration_secs),
            )
        };
        self.note(
            LogKind::RouteClear,
            severity,
            Some(&corridor.vehicle_type),
            corridor.route.join(" > "),
            description,
        );
        self.bus.emit(EngineEvent::CorridorUpdated {
            corridor: corridor.clone(),
        });
    }

    // === Responders ===

    pub fn register_unit(&mut self, unit: Unit) -> EngineResult<()> {
        let record = unit.clone();
        self.responders.register(unit)?;
        info!(unit_id = %record.id, call_sign = %record.call_sign, "Unit registered");
        self.bus.emit(EngineEvent::UnitUpdated { unit: record });
        Ok(())
    }

    pub fn update_unit_status(&mut self, unit_id: &str, status: UnitStatus) -> EngineResult<Unit> {
        let now = self.now();
        let unit = self.responders.update_status(unit_id, status, now)?.clone();
        self.bus.emit(EngineEvent::UnitUpdated { unit: unit.clone() });
        Ok(unit)
    }

    pub fn update_unit_location(&mut self, unit_id: &str, location: Location) -> EngineResult<Unit> {
        let now = self.now();
        let unit = self.responders.update_location(unit_id, location, now)?.clone();
        self.bus.emit(EngineEvent::UnitUpdated { unit: unit.clone() });
        Ok(unit)
    }

    // === Alerts ===

    /// Dispatch to AVAILABLE units near `location`; `radius_km` defaults to configuration
    pub fn dispatch_alert(
        &mut self,
        class: AlertClass,
        vehicle_type: &str,
        location: Location,
        radius_km: Option<f64>,
    ) -> EngineResult<AlertSnapshot> {
        let now = self.now();
        let radius_km = radius_km.unwrap_or(self.config.alerts.dispatch_radius_km);
        let alert = self
            .alerts
            .dispatch(&self.responders, class, vehicle_type, location, radius_km, now)?;

        let recipients = alert.recipient_ids().len();
        let (severity, description) = if recipients == 0 {
            warn!(alert_id = %alert.id, radius_km, "Alert has no recipients in range");
            (
                Severity::Error,
                format!("{class} alert {} found no available units within {radius_km} km", alert.id),
            )
        } else {
            let severity = match class {
                AlertClass::Emergency => Severity::Warning,
                _ => Severity::Info,
            };
            (
                severity,
                format!("{class} alert {} sent to {recipients} units", alert.id),
            )
        };
        self.note(
            LogKind::Alert,
            severity,
            Some(vehicle_type),
            alert.location.label.clone(),
            description,
        );

        let snapshot = alert.snapshot();
        self.bus.emit(EngineEvent::AlertDispatched {
            alert: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Apply a unit's acknowledgment; repeats are accepted and change nothing
    pub fn on_acknowledgment(&mut self, alert_id: &str, unit_id: &str) -> EngineResult<AlertSnapshot> {
        let now = self.now();
        let outcome = self.alerts.acknowledge(alert_id, unit_id)?;
        if let Err(e) = self.responders.touch(unit_id, now) {
            debug!(%unit_id, error = %e, "Engine::on_acknowledgment: recipient no longer in directory");
        }

        let snapshot = outcome.alert.snapshot();
        if outcome.newly_acked {
            let alert = &outcome.alert;
            self.note(
                LogKind::Alert,
                Severity::Info,
                Some(&alert.vehicle_type),
                alert.location.label.clone(),
                format!(
                    "Unit {unit_id} acknowledged alert {alert_id} ({}/{})",
                    alert.acked_by().len(),
                    alert.recipient_ids().len()
                ),
            );
            self.bus.emit(EngineEvent::AlertUpdated {
                alert: snapshot.clone(),
            });
        }
        Ok(snapshot)
    }

    /// Archive alerts created before `cutoff`
    pub fn archive_alerts(&mut self, cutoff: DateTime<Utc>) -> usize {
        let moved = self.alerts.archive_older_than(cutoff);
        if moved > 0 {
            self.note(
                LogKind::System,
                Severity::Info,
                None,
                "engine",
                format!("Archived {moved} alerts"),
            );
        }
        moved
    }

    // === Reads ===

    pub fn signal(&self, signal_id: &str) -> Option<Signal> {
        self.signals.get(signal_id).cloned()
    }

    pub fn corridor(&self, corridor_id: &str) -> Option<Corridor> {
        self.corridors.get(corridor_id).cloned()
    }

    pub fn alert(&self, alert_id: &str) -> Option<AlertSnapshot> {
        self.alerts.get(alert_id).map(|a| a.snapshot())
    }

    pub fn unit(&self, unit_id: &str) -> Option<Unit> {
        self.responders.get(unit_id).cloned()
    }

    /// Matching audit entries, newest first
    pub fn event_log(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.log.query(filter)
    }

    /// Newest first
    pub fn recent_detections(&self) -> Vec<Detection> {
        self.detections.iter().cloned().collect()
    }

    // === Internals ===

    pub(super) fn note(
        &mut self,
        kind: LogKind,
        severity: Severity,
        vehicle_type: Option<&str>,
        location: impl Into<String>,
        description: impl Into<String>,
    ) {
        let now = self.now();
        self.log.record(now, kind, severity, vehicle_type, location, description);
    }

    /// Forward queued desired-state commands to the bus
    pub(super) fn flush(&mut self) {
        for cmd in self.signals.drain_commands() {
            self.bus.emit(EngineEvent::from(cmd));
        }
    }

    fn signal_record(&self, signal_id: &str) -> EngineResult<Signal> {
        self.signals
            .get(signal_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(EntityKind::Signal, signal_id))
    }

    /// Corridor members are written only by the corridor manager
    fn check_not_held(&self, signal_id: &str, operation: &'static str) -> EngineResult<()> {
        match self.corridors.holder(signal_id) {
            Some(corridor) => {
                warn!(%signal_id, corridor_id = %corridor.id, operation, "Signal held by corridor, refusing");
                Err(EngineError::InvalidState {
                    kind: EntityKind::Signal,
                    id: signal_id.to_string(),
                    state: format!("held by corridor {}", corridor.id),
                    operation,
                })
            }
            None => Ok(()),
        }
    }

    fn signal_location(&self, signal_id: &str) -> String {
        self.signals
            .get(signal_id)
            .map(|s| s.location.clone())
            .unwrap_or_else(|| signal_id.to_string())
    }

    fn after_signal_change(&mut self, signal_id: &str, result: &EngineResult<Signal>, description: String) {
        if let Ok(signal) = result {
            self.note(
                LogKind::SignalChange,
                Severity::Warning,
                None,
                signal.location.clone(),
                format!("Signal {signal_id}: {description}, now {} {}", signal.mode, signal.phase),
            );
        }
        self.flush();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ticks", &self.ticks)
            .field("signals", &self.signals.len())
            .field("corridors", &self.corridors.live_count())
            .field("units", &self.responders.len())
            .finish()
    }
}
