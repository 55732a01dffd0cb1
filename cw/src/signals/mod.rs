//! Signal registry
//!
//! Owns every traffic signal and drives its phase state machine:
//! - **NORMAL:** cycles RED -> GREEN -> YELLOW -> RED on configured durations
//! - **EMERGENCY:** forced GREEN, held until released
//! - **PREEMPTED:** GREEN priority reached without cutting a yellow short

mod registry;

pub use registry::SignalRegistry;
