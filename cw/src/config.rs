//! Clearway configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinator::CoordinatorConfig;
use crate::domain::SignalTiming;

/// Main Clearway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Normal-cycle phase durations and the override default
    pub signals: SignalConfig,

    /// Corridor lifecycle tuning
    pub corridor: CorridorConfig,

    /// Alert dispatch and detection policy
    pub alerts: AlertConfig,

    /// Actor channel sizes and tick cadence
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        let s = &self.signals;
        if s.red_secs == 0 || s.yellow_secs == 0 || s.green_secs == 0 {
            return Err(eyre!("signals: phase durations must be at least 1 second"));
        }
        if s.override_secs == 0 {
            return Err(eyre!("signals: override-secs must be at least 1 second"));
        }
        if !(0.0..=1.0).contains(&self.corridor.clearing_threshold) {
            return Err(eyre!(
                "corridor: clearing-threshold must be within [0, 1], got {}",
                self.corridor.clearing_threshold
            ));
        }
        if self.corridor.default_duration_secs == 0 {
            return Err(eyre!("corridor: default-duration-secs must be at least 1 second"));
        }
        let radius = self.alerts.dispatch_radius_km;
        if !radius.is_finite() || radius < 0.0 {
            return Err(eyre!("alerts: dispatch-radius-km must be a non-negative number, got {}", radius));
        }
        if !(0.0..=1.0).contains(&self.alerts.confidence_threshold) {
            return Err(eyre!(
                "alerts: confidence-threshold must be within [0, 1], got {}",
                self.alerts.confidence_threshold
            ));
        }
        self.coordinator.validate()
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.clearway.yml`, then
    /// `<config_dir>/clearway/clearway.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: a broken config file is reported properly by
    /// [`Config::load`] once logging exists.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::candidates().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(".clearway.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("clearway").join("clearway.yml"));
        }
        candidates
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Signal timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    #[serde(rename = "red-secs")]
    pub red_secs: u64,

    #[serde(rename = "yellow-secs")]
    pub yellow_secs: u64,

    #[serde(rename = "green-secs")]
    pub green_secs: u64,

    /// Default emergency override window
    #[serde(rename = "override-secs")]
    pub override_secs: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            red_secs: 30,
            yellow_secs: 5,
            green_secs: 30,
            override_secs: 120,
        }
    }
}

impl SignalConfig {
    pub fn timing(&self) -> SignalTiming {
        SignalTiming {
            red_secs: self.red_secs,
            yellow_secs: self.yellow_secs,
            green_secs: self.green_secs,
        }
    }
}

/// Corridor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    /// Fraction of the original duration at which a corridor starts CLEARING
    #[serde(rename = "clearing-threshold")]
    pub clearing_threshold: f64,

    /// Duration for corridors formed from detections
    #[serde(rename = "default-duration-secs")]
    pub default_duration_secs: u64,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            clearing_threshold: 0.25,
            default_duration_secs: 180,
        }
    }
}

/// Alert configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    #[serde(rename = "dispatch-radius-km")]
    pub dispatch_radius_km: f64,

    /// Detections below this confidence are recorded but not dispatched
    #[serde(rename = "confidence-threshold")]
    pub confidence_threshold: f64,

    /// Form a corridor automatically for siren-confirmed detections with a route
    #[serde(rename = "auto-corridor")]
    pub auto_corridor: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            dispatch_radius_km: 5.0,
            confidence_threshold: 0.8,
            auto_corridor: true,
        }
    }
}
