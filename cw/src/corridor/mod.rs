//! Green corridor management
//!
//! ```text
//! create() ──▶ ACTIVE ──(clearance ≤ threshold)──▶ CLEARING ──(clearance = 0)──▶ COMPLETED
//!                │                                    │
//!                └──────────── abort() ───────────────┴──▶ ABORTED
//! ```
//!
//! Reaching COMPLETED or ABORTED releases every member signal back to its
//! normal cycle.

mod manager;

pub use manager::CorridorManager;
