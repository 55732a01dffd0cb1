//! EventLog - bounded audit trail of engine activity

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of entries kept before the oldest are evicted
pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    Detection,
    Alert,
    SignalChange,
    RouteClear,
    System,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Detection => write!(f, "detection"),
            LogKind::Alert => write!(f, "alert"),
            LogKind::SignalChange => write!(f, "signal-change"),
            LogKind::RouteClear => write!(f, "route-clear"),
            LogKind::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One audit-trail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub severity: Severity,
    #[serde(rename = "vehicle-type", default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    pub location: String,
    pub description: String,
}

/// Query over the log; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub kind: Option<LogKind>,
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Case-insensitive search over description, location and vehicle type
    #[serde(default)]
    pub text: Option<String>,
}

impl LogFilter {
    pub fn kind(kind: LogKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if self.kind.is_some_and(|k| k != entry.kind) {
            return false;
        }
        if self.severity.is_some_and(|s| s != entry.severity) {
            return false;
        }
        match self.text.as_deref().map(str::to_lowercase) {
            Some(needle) if !needle.is_empty() => {
                entry.description.to_lowercase().contains(&needle)
                    || entry.location.to_lowercase().contains(&needle)
                    || entry
                        .vehicle_type
                        .as_deref()
                        .is_some_and(|v| v.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

/// Ring buffer of log entries, oldest evicted first
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventLog::new: called");
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Append an entry and return its id
    pub fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        kind: LogKind,
        severity: Severity,
        vehicle_type: Option<&str>,
        location: impl Into<String>,
        description: impl Into<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            id,
            timestamp,
            kind,
            severity,
            vehicle_type: vehicle_type.map(str::to_string),
            location: location.into(),
            description: description.into(),
        });
        id
    }

    /// Matching entries, newest first
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.entries.iter().rev().filter(|e| filter.matches(e)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
