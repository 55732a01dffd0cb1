//! The coordination engine
//!
//! Owns the signal registry, corridor manager, responder directory and
//! alert dispatcher, and applies the detection policy on top of them. The
//! engine is synchronous; the [`crate::coordinator`] wraps it in an actor.

mod core;
mod detection;
mod report;

pub use self::core::Engine;
pub use detection::classify;
pub use report::{EngineSnapshot, EngineStats, TickReport};
