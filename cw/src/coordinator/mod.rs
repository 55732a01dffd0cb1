//! Coordinator: the single writer
//!
//! The Coordinator owns the [`crate::engine::Engine`] inside one tokio task.
//! Ticks, inbound events, commands and reads all arrive as requests on one
//! `mpsc` channel, each with a `oneshot` reply, so they never interleave.
//! Clients hold a cloneable [`CoordinatorHandle`].

mod config;
mod core;
mod handle;
mod messages;

pub use self::core::Coordinator;
pub use config::CoordinatorConfig;
pub use handle::{CoordinatorHandle, WeakCoordinatorHandle};
pub use messages::{CoordRequest, Reply};
