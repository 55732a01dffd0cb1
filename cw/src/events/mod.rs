//! Event bus and audit log
//!
//! ```text
//!                 Engine (inside the Coordinator)
//!                          │ emit
//!                          ▼
//! ┌─────────────────────────────────────────────────┐
//! │                  EVENT BUS                      │
//! │        (tokio::sync::broadcast channel)         │
//! └─────────────────────────────────────────────────┘
//!          │                  │                  │
//!          ▼                  ▼                  ▼
//!   Signal forwarder    Alert delivery      Event logger
//!   (SignalController)  (unit comms)        (JSONL file)
//! ```
//!
//! The [`EventLog`] is separate: a bounded, queryable audit trail kept by the
//! engine itself so readers can ask what happened without subscribing.

mod bus;
mod log;
mod recorder;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use log::{DEFAULT_LOG_CAPACITY, EventLog, LogEntry, LogFilter, LogKind, Severity};
pub use recorder::{EventRecord, EventRecorder, read_events, spawn_event_recorder};
pub use types::EngineEvent;
