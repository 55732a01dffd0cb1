//! Scripted scenarios for driving the engine offline
//!
//! A scenario seeds signals and units, then applies actions at tick offsets
//! through a [`CoordinatorHandle`], the same way live adapters would.
//!
//! ```yaml
//! name: downtown
//! signals:
//!   - id: SIG001
//!     location: Main St & 5th Ave
//! units:
//!   - id: U001
//!     call-sign: Patrol 1
//!     location: { label: Main St, lat: 40.7128, lon: -74.0060 }
//! actions:
//!   - at-tick: 5
//!     action: corridor
//!     id: COR1
//!     vehicle-type: Ambulance
//!     route: [SIG001]
//!     duration: 120
//! ```

use std::path::Path;
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::domain::{AlertClass, DetectionEvent, Location, Phase, Signal, SignalTiming, Unit, UnitStatus};
use crate::engine::{EngineSnapshot, EngineStats};
use crate::error::EngineError;

fn default_connected() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub signals: Vec<SignalSeed>,
    #[serde(default)]
    pub units: Vec<UnitSeed>,
    #[serde(default)]
    pub actions: Vec<ScheduledAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeed {
    pub id: String,
    pub location: String,
    /// Starting phase; RED when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default = "default_connected")]
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSeed {
    pub id: String,
    #[serde(rename = "call-sign")]
    pub call_sign: String,
    pub location: Location,
    #[serde(default)]
    pub status: UnitStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Applied before this tick runs; 0 is before the first tick
    #[serde(rename = "at-tick")]
    pub at_tick: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Override {
        signal: String,
        #[serde(default)]
        duration: Option<u64>,
    },
    Preempt {
        signal: String,
        #[serde(default)]
        duration: Option<u64>,
    },
    Release {
        signal: String,
    },
    Disconnect {
        signal: String,
    },
    Reconnect {
        signal: String,
    },
    Corridor {
        id: String,
        #[serde(rename = "vehicle-type")]
        vehicle_type: String,
        route: Vec<String>,
        duration: u64,
    },
    Abort {
        id: String,
    },
    Dispatch {
        class: AlertClass,
        #[serde(rename = "vehicle-type")]
        vehicle_type: String,
        location: Location,
        #[serde(rename = "radius-km", default)]
        radius_km: Option<f64>,
    },
    Detection {
        detection: DetectionEvent,
    },
    /// `alert` is the position of the alert in dispatch order, from 0
    Acknowledge {
        alert: usize,
        unit: String,
    },
    UnitStatus {
        unit: String,
        status: UnitStatus,
    },
    UnitLocation {
        unit: String,
        location: Location,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Override { .. } => "override",
            Action::Preempt { .. } => "preempt",
            Action::Release { .. } => "release",
            Action::Disconnect { .. } => "disconnect",
            Action::Reconnect { .. } => "reconnect",
            Action::Corridor { .. } => "corridor",
            Action::Abort { .. } => "abort",
            Action::Dispatch { .. } => "dispatch",
            Action::Detection { .. } => "detection",
            Action::Acknowledge { .. } => "acknowledge",
            Action::UnitStatus { .. } => "unit-status",
            Action::UnitLocation { .. } => "unit-location",
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "Scenario::load: called");
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read scenario file: {}", path.display()))?;
        let scenario: Scenario =
            serde_yaml::from_str(&content).context(format!("Failed to parse scenario file: {}", path.display()))?;
        info!(name = %scenario.name, actions = scenario.actions.len(), "Loaded scenario");
        Ok(scenario)
    }

    /// Last tick any action is scheduled for
    pub fn last_action_tick(&self) -> u64 {
        self.actions.iter().map(|a| a.at_tick).max().unwrap_or(0)
    }
}

/// An action the engine refused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFailure {
    #[serde(rename = "at-tick")]
    pub at_tick: u64,
    pub action: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub ticks: u64,
    #[serde(rename = "actions-applied")]
    pub actions_applied: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ActionFailure>,
    /// Alert ids in dispatch order
    pub alerts: Vec<String>,
    pub snapshot: EngineSnapshot,
    pub stats: EngineStats,
}

/// Register the scenario's signals and units
pub async fn seed(handle: &CoordinatorHandle, scenario: &Scenario, timing: &SignalTiming) -> Result<()> {
    debug!(signals = scenario.signals.len(), units = scenario.units.len(), "seed: called");
    for seed in &scenario.signals {
        let mut signal = Signal::new(&seed.id, &seed.location, timing);
        if let Some(phase) = seed.phase {
            signal = signal.starting_at(phase, timing);
        }
        if !seed.connected {
            signal = signal.disconnected();
        }
        handle
            .register_signal(signal)
            .await
            .context(format!("Failed to register signal {}", seed.id))?;
    }
    let now = handle.now().await.context("Failed to read engine clock")?;
    for seed in &scenario.units {
        let unit = Unit::new(&seed.id, &seed.call_sign, seed.location.clone(), now).with_status(seed.status);
        handle
            .register_unit(unit)
            .await
            .context(format!("Failed to register unit {}", seed.id))?;
    }
    Ok(())
}

/// Apply the scenario's actions over `ticks` ticks and report the end state
///
/// Refused actions are collected into the report; only a stopped
/// coordinator ends the run early. With `pace`, ticks are spaced that far
/// apart in wall time.
pub async fn run_scenario(
    handle: &CoordinatorHandle,
    scenario: &Scenario,
    ticks: u64,
    pace: Option<Duration>,
) -> Result<ScenarioReport> {
    debug!(name = %scenario.name, ticks, ?pace, "run_scenario: called");
    let mut actions: Vec<&ScheduledAction> = scenario.actions.iter().collect();
    actions.sort_by_key(|a| a.at_tick);
    let late = actions.iter().filter(|a| a.at_tick > ticks).count();
    if late > 0 {
        warn!(late, ticks, "Actions scheduled after the last tick will not run");
    }

    let mut runner = Runner {
        handle,
        alerts: Vec::new(),
        failures: Vec::new(),
        applied: 0,
    };
    let mut pending = actions.into_iter().peekable();
    let mut interval = pace.map(tokio::time::interval);

    for current in 0..=ticks {
        while let Some(scheduled) = pending.next_if(|a| a.at_tick == current) {
            runner.apply(current, &scheduled.action).await?;
        }
        if current == ticks {
            break;
        }
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
        handle.tick().await.context("Coordinator stopped mid-scenario")?;
    }

    let snapshot = handle.snapshot().await?;
    let stats = handle.stats().await?;
    info!(
        name = %scenario.name,
        applied = runner.applied,
        failures = runner.failures.len(),
        "Scenario finished"
    );
    Ok(ScenarioReport {
        name: scenario.name.clone(),
        ticks,
        actions_applied: runner.applied,
        failures: runner.failures,
        alerts: runner.alerts,
        snapshot,
        stats,
    })
}

struct Runner<'a> {
    handle: &'a CoordinatorHandle,
    alerts: Vec<String>,
    failures: Vec<ActionFailure>,
    applied: usize,
}

impl Runner<'_> {
    async fn apply(&mut self, at_tick: u64, action: &Action) -> Result<()> {
        debug!(at_tick, action = action.name(), "Runner::apply");
        let handle = self.handle;
        let result = match action {
            Action::Override { signal, duration } => handle.request_override(signal, *duration).await.map(drop),
            Action::Preempt { signal, duration } => handle.request_preempt(signal, *duration).await.map(drop),
            Action::Release { signal } => handle.request_release(signal).await.map(drop),
            Action::Disconnect { signal } => handle.set_signal_connected(signal, false).await.map(drop),
            Action::Reconnect { signal } => handle.set_signal_connected(signal, true).await.map(drop),
            Action::Corridor {
                id,
                vehicle_type,
                route,
                duration,
            } => handle
                .request_corridor(id, vehicle_type, route.clone(), *duration)
                .await
                .map(drop),
            Action::Abort { id } => handle.request_abort(id).await.map(drop),
            Action::Dispatch {
                class,
                vehicle_type,
                location,
                radius_km,
            } => handle
                .dispatch_alert(*class, vehicle_type, location.clone(), *radius_km)
                .await
                .map(|alert| self.alerts.push(alert.alert.id)),
            Action::Detection { detection } => handle.on_detection_event(detection.clone()).await.map(|outcome| {
                if let Some(alert) = outcome.alert {
                    self.alerts.push(alert.alert.id);
                }
            }),
            Action::Acknowledge { alert, unit } => match self.alerts.get(*alert) {
                Some(alert_id) => handle.on_acknowledgment(alert_id, unit).await.map(drop),
                None => {
                    self.fail(at_tick, action, format!("no alert #{alert} dispatched yet"));
                    return Ok(());
                }
            },
            Action::UnitStatus { unit, status } => handle.update_unit_status(unit, *status).await.map(drop),
            Action::UnitLocation { unit, location } => {
                handle.update_unit_location(unit, location.clone()).await.map(drop)
            }
        };

        match result {
            Ok(()) => self.applied += 1,
            Err(EngineError::ChannelClosed) => {
                return Err(EngineError::ChannelClosed).context(format!("Coordinator stopped at tick {at_tick}"));
            }
            Err(e) => self.fail(at_tick, action, e.to_string()),
        }
        Ok(())
    }

    fn fail(&mut self, at_tick: u64, action: &Action, error: String) {
        warn!(at_tick, action = action.name(), %error, "Scenario action refused");
        self.failures.push(ActionFailure {
            at_tick,
            action: action.name().to_string(),
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coordinator::Coordinator;
    use crate::domain::{AlertStatus, CorridorStatus, Planar, SignalMode};
    use crate::engine::Engine;
    use std::sync::Arc;

    const SCENARIO: &str = r#"
name: test
signals:
  - id: S1
    location: Main & 1st
  - id: S2
    location: Main & 2nd
    phase: GREEN
  - id: S3
    location: Main & 3rd
    connected: false
units:
  - id: U1
    call-sign: Patrol 1
    location: { label: Main, lat: 1.0, lon: 0.0 }
  - id: U2
    call-sign: Patrol 2
    location: { label: Main, lat: 2.0, lon: 0.0 }
    status: BUSY
actions:
  - at-tick: 0
    action: corridor
    id: COR1
    vehicle-type: Ambulance
    route: [S1, S2, S3]
    duration: 10
  - at-tick: 2
    action: dispatch
    class: EMERGENCY
    vehicle-type: Ambulance
    location: { label: Main, lat: 0.0, lon: 0.0 }
  - at-tick: 3
    action: acknowledge
    alert: 0
    unit: U1
  - at-tick: 4
    action: acknowledge
    alert: 5
    unit: U1
  - at-tick: 4
    action: release
    signal: S9
"#;

    fn coordinator() -> Coordinator {
        Coordinator::new(Engine::new(
            Config::default(),
            Arc::new(crate::clock::SystemClock),
            Arc::new(Planar),
        ))
    }

    #[test]
    fn test_parse_scenario() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.signals.len(), 3);
        assert_eq!(scenario.signals[1].phase, Some(Phase::Green));
        assert!(!scenario.signals[2].connected);
        assert_eq!(scenario.units[1].status, UnitStatus::Busy);
        assert_eq!(scenario.actions.len(), 5);
        assert_eq!(scenario.last_action_tick(), 4);
        assert!(matches!(
            &scenario.actions[0].action,
            Action::Corridor { route, duration: 10, .. } if route.len() == 3
        ));
    }

    #[test]
    fn test_parse_detection_action() {
        let yaml = r#"
at-tick: 1
action: detection
detection:
  vehicle-type: Fire Truck
  location: { label: Broadway, lat: 0.0, lon: 0.0 }
  confidence: 0.9
  siren-confirmed: true
  route: [S1]
"#;
        let scheduled: ScheduledAction = serde_yaml::from_str(yaml).unwrap();
        let Action::Detection { detection } = scheduled.action else {
            panic!("expected detection action");
        };
        assert!(detection.siren_confirmed);
        assert_eq!(detection.route, vec!["S1".to_string()]);
    }

    #[tokio::test]
    async fn test_seed_stamps_units_with_engine_clock() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        let start = "2024-03-01T08:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap();
        let coord = Coordinator::new(Engine::new(
            Config::default(),
            Arc::new(crate::clock::ManualClock::new(start)),
            Arc::new(Planar),
        ));
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        seed(&handle, &scenario, &Config::default().signals.timing()).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.units.len(), 2);
        assert!(snapshot.units.iter().all(|u| u.last_seen == start));
        assert_eq!(snapshot.taken_at, start);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_scenario_collects_failures() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        let coord = coordinator();
        let timing = Config::default().signals.timing();
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        seed(&handle, &scenario, &timing).await.unwrap();
        let report = run_scenario(&handle, &scenario, 12, None).await.unwrap();

        assert_eq!(report.ticks, 12);
        assert_eq!(report.actions_applied, 3);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.action.as_str()).collect();
        assert_eq!(failed, vec!["acknowledge", "release"]);

        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.snapshot.alerts[0].status, AlertStatus::Acknowledged);

        let corridor = &report.snapshot.finished_corridors[0];
        assert_eq!(corridor.status, CorridorStatus::Completed);
        assert_eq!(corridor.members, vec!["S1".to_string(), "S2".to_string()]);
        assert!(report.snapshot.signals.iter().all(|s| s.mode == SignalMode::Normal));
        assert_eq!(report.stats.ticks, 12);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
