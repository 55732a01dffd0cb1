//! Engine error types

use thiserror::Error;

/// The kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Signal,
    Corridor,
    Unit,
    Alert,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Signal => "signal",
            EntityKind::Corridor => "corridor",
            EntityKind::Unit => "unit",
            EntityKind::Alert => "alert",
        };
        write!(f, "{}", name)
    }
}

/// Errors reported synchronously by mutating engine operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Unknown {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Signal {0} is disconnected")]
    Disconnected(String),

    #[error("{kind} {id} is {state}, cannot {operation}")]
    InvalidState {
        kind: EntityKind,
        id: String,
        state: String,
        operation: &'static str,
    },

    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("Corridor route is empty")]
    EmptyRoute,

    #[error("Corridor route lists signal {0} more than once")]
    DuplicateRouteMember(String),

    #[error("No usable signal on route: {0:?}")]
    AllDisconnected(Vec<String>),

    #[error("Unit {unit_id} was not a recipient of alert {alert_id}")]
    NotARecipient { alert_id: String, unit_id: String },

    #[error("Duration must be positive")]
    InvalidDuration,

    #[error("Radius must be a finite, non-negative number of km (got {0})")]
    InvalidRadius(f64),

    #[error("Coordinator channel closed")]
    ChannelClosed,
}

impl EngineError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub(crate) fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::DuplicateId { kind, id: id.into() }
    }

    /// Check if this is an unknown-entity error
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
