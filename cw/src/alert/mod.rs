//! Alert dispatch with idempotent acknowledgment
//!
//! An alert's recipients are a fact about dispatch time. Its status is
//! derived from how many of them have acknowledged:
//! - **SENT:** nobody yet
//! - **DELIVERED:** some recipients
//! - **ACKNOWLEDGED:** every recipient (never reached with zero recipients)

mod dispatcher;

pub use dispatcher::{AckOutcome, AlertDispatcher};
