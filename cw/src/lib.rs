//! Clearway - emergency-vehicle traffic clearance coordinator
//!
//! Clearway decides what traffic signals should show when an emergency
//! vehicle is on the road, keeps green corridors open along its route, and
//! tells nearby responder units about it.
//!
//! # Core Concepts
//!
//! - **Desired state only**: the engine emits signal commands; a
//!   [`adapter::SignalController`] pushes them to hardware
//! - **One writer**: the [`coordinator::Coordinator`] owns the [`engine::Engine`]
//!   and serializes ticks, events and commands
//! - **Deterministic ticks**: every timer in the system advances on `tick()`
//! - **Degrade, don't fail**: disconnected signals drop out of a corridor
//!   instead of blocking it
//!
//! # Modules
//!
//! - [`signals`] - signal registry and phase cycling
//! - [`corridor`] - green corridor lifecycle
//! - [`responder`] - responder units and proximity queries
//! - [`alert`] - alert dispatch and acknowledgment tracking
//! - [`engine`] - the composed engine and detection policy
//! - [`coordinator`] - the actor that owns the engine
//! - [`events`] - event bus, audit log, event recorder
//! - [`scenario`] - scripted scenarios for offline runs
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod adapter;
pub mod alert;
pub mod cli;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod corridor;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod responder;
pub mod scenario;
pub mod signals;

// Re-export commonly used types
pub use adapter::{ControllerError, RecordingController, SignalController, TracingController, spawn_signal_forwarder};
pub use clock::{Clock, ManualClock, SystemClock, spawn_ticker};
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle, WeakCoordinatorHandle};
pub use domain::{
    Alert, AlertClass, AlertSnapshot, AlertStatus, Corridor, CorridorActivation, CorridorStatus, DetectionEvent,
    DetectionOutcome, DistanceMetric, GeoPoint, Haversine, Location, Phase, Planar, Signal, SignalCommand, SignalMode,
    SignalTiming, Unit, UnitStatus,
};
pub use engine::{Engine, EngineSnapshot, EngineStats, TickReport};
pub use error::{EngineError, EngineResult, EntityKind};
pub use events::{EngineEvent, EventBus, LogEntry, LogFilter, LogKind, Severity};
pub use scenario::{Scenario, ScenarioReport, run_scenario};
