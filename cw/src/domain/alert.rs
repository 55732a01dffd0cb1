//! Responder alerts and acknowledgment tracking

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Location;
use crate::error::{EngineError, EngineResult};

/// Alert severity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertClass {
    Emergency,
    Warning,
    Info,
}

impl std::fmt::Display for AlertClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertClass::Emergency => write!(f, "EMERGENCY"),
            AlertClass::Warning => write!(f, "WARNING"),
            AlertClass::Info => write!(f, "INFO"),
        }
    }
}

/// Delivery status, derived from acknowledgments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Sent,
    Delivered,
    Acknowledged,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Sent => write!(f, "SENT"),
            AlertStatus::Delivered => write!(f, "DELIVERED"),
            AlertStatus::Acknowledged => write!(f, "ACKNOWLEDGED"),
        }
    }
}

/// A dispatch record: who was notified and who acknowledged
///
/// `recipient_ids` is fixed when the alert is created. `acked_by` only grows
/// and is always a subset of `recipient_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub class: AlertClass,
    #[serde(rename = "vehicle-type")]
    pub vehicle_type: String,
    pub location: Location,
    #[serde(rename = "created-at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "recipient-ids")]
    recipient_ids: BTreeSet<String>,
    #[serde(rename = "acked-by")]
    acked_by: BTreeSet<String>,
}

impl Alert {
    pub fn new(
        id: impl Into<String>,
        class: AlertClass,
        vehicle_type: impl Into<String>,
        location: Location,
        recipient_ids: BTreeSet<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            vehicle_type: vehicle_type.into(),
            location,
            created_at,
            recipient_ids,
            acked_by: BTreeSet::new(),
        }
    }

    pub fn recipient_ids(&self) -> &BTreeSet<String> {
        &self.recipient_ids
    }

    pub fn acked_by(&self) -> &BTreeSet<String> {
        &self.acked_by
    }

    /// Derived status: none acked is SENT, some is DELIVERED, all is ACKNOWLEDGED
    pub fn status(&self) -> AlertStatus {
        if self.acked_by.is_empty() {
            AlertStatus::Sent
        } else if self.acked_by.len() < self.recipient_ids.len() {
            AlertStatus::Delivered
        } else {
            AlertStatus::Acknowledged
        }
    }

    /// Record an acknowledgment; returns true if the unit had not acked before
    pub fn acknowledge(&mut self, unit_id: &str) -> EngineResult<bool> {
        if !self.recipient_ids.contains(unit_id) {
            return Err(EngineError::NotARecipient {
                alert_id: self.id.clone(),
                unit_id: unit_id.to_string(),
            });
        }
        Ok(self.acked_by.insert(unit_id.to_string()))
    }

    /// Snapshot including the derived status
    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot {
            status: self.status(),
            alert: self.clone(),
        }
    }
}

/// Alert record with its current status, as handed to adapters and readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    #[serde(flatten)]
    pub alert: Alert,
    pub status: AlertStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert_for(recipients: &[&str]) -> Alert {
        Alert::new(
            "ALT-1",
            AlertClass::Emergency,
            "Ambulance",
            Location::new("Main St & 5th Ave", 0.0, 0.0),
            recipients.iter().map(|s| s.to_string()).collect(),
            Utc::now(),
        )
    }

    #[test]
    fn test_status_derivation() {
        let mut alert = alert_for(&["U1", "U2"]);
        assert_eq!(alert.status(), AlertStatus::Sent);

        assert!(alert.acknowledge("U1").unwrap());
        assert_eq!(alert.status(), AlertStatus::Delivered);

        assert!(alert.acknowledge("U2").unwrap());
        assert_eq!(alert.status(), AlertStatus::Acknowledged);
    }

    #[test]
    fn test_repeat_ack_is_noop() {
        let mut alert = alert_for(&["U1", "U2"]);
        assert!(alert.acknowledge("U1").unwrap());
        assert!(!alert.acknowledge("U1").unwrap());
        assert_eq!(alert.acked_by().len(), 1);
    }

    #[test]
    fn test_non_recipient_rejected() {
        let mut alert = alert_for(&["U1"]);
        let err = alert.acknowledge("U9").unwrap_err();
        assert!(matches!(err, EngineError::NotARecipient { .. }));
        assert!(alert.acked_by().is_empty());
    }

    #[test]
    fn test_zero_recipients_stays_sent() {
        let mut alert = alert_for(&[]);
        assert_eq!(alert.status(), AlertStatus::Sent);
        assert!(alert.acknowledge("U1").is_err());
        assert_eq!(alert.status(), AlertStatus::Sent);
    }

    #[test]
    fn test_snapshot_carries_status() {
        let mut alert = alert_for(&["U1", "U2"]);
        alert.acknowledge("U2").unwrap();
        let json = serde_json::to_value(alert.snapshot()).unwrap();
        assert_eq!(json["status"], "DELIVERED");
        assert_eq!(json["acked-by"][0], "U2");
        assert_eq!(json["recipient-ids"].as_array().unwrap().len(), 2);
    }
}
