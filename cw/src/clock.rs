//! Time sources and the tick driver
//!
//! The engine never reads the wall clock directly: timestamps come from an
//! injected [`Clock`] so tests and simulations can control time.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::error::EngineError;

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drive the coordinator with a tick every `period` until it shuts down
///
/// Missed ticks burst to catch up, so simulated time keeps pace with wall time.
pub fn spawn_ticker(handle: CoordinatorHandle, period: Duration) -> JoinHandle<u64> {
    debug!(?period, "spawn_ticker: called");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick of a tokio interval completes immediately
        interval.tick().await;
        let mut ticks = 0;
        loop {
            interval.tick().await;
            match handle.tick().await {
                Ok(_) => ticks += 1,
                Err(EngineError::ChannelClosed) => break,
                Err(e) => {
                    warn!(error = %e, "Ticker: tick failed");
                    break;
                }
            }
        }
        info!(ticks, "Ticker stopped");
        ticks
    })
}
