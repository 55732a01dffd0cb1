//! Signal controller seam
//!
//! The engine only decides desired signal state. Something outside has to
//! push it to field hardware; that something implements [`SignalController`]
//! and is fed from the event bus by [`spawn_signal_forwarder`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::{CoordinatorHandle, WeakCoordinatorHandle};
use crate::domain::SignalCommand;
use crate::events::EventBus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The controller could not reach the signal
    #[error("Signal {0} unreachable: {1}")]
    Unreachable(String, String),

    #[error("Signal {0} rejected command: {1}")]
    Rejected(String, String),
}

/// Applies desired state to physical signals
#[async_trait]
pub trait SignalController: Send + Sync {
    async fn apply(&self, command: &SignalCommand) -> Result<(), ControllerError>;
}

/// Logs every command; the controller used when no hardware is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingController;

#[async_trait]
impl SignalController for TracingController {
    async fn apply(&self, command: &SignalCommand) -> Result<(), ControllerError> {
        info!(
            signal_id = %command.signal_id,
            phase = %command.phase,
            mode = %command.mode,
            "Signal command applied"
        );
        Ok(())
    }
}

/// Keeps every command it is given; signals listed as unreachable fail
#[derive(Debug, Default)]
pub struct RecordingController {
    applied: Mutex<Vec<SignalCommand>>,
    unreachable: Vec<String>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unreachable(unreachable: Vec<String>) -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            unreachable,
        }
    }

    pub fn applied(&self) -> Vec<SignalCommand> {
        self.applied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SignalController for RecordingController {
    async fn apply(&self, command: &SignalCommand) -> Result<(), ControllerError> {
        if self.unreachable.contains(&command.signal_id) {
            return Err(ControllerError::Unreachable(
                command.signal_id.clone(),
                "no response".to_string(),
            ));
        }
        self.applied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.clone());
        Ok(())
    }
}

/// Forward every signal command on the bus to `controller`
///
/// With a coordinator handle, a signal the controller reports unreachable is
/// marked disconnected so corridors stop counting on it. The forwarder keeps
/// only a weak handle, so it never holds the Coordinator open. Runs until the
/// bus closes; returns the number of commands applied.
pub fn spawn_signal_forwarder(
    event_bus: Arc<EventBus>,
    controller: Arc<dyn SignalController>,
    coordinator: Option<CoordinatorHandle>,
) -> JoinHandle<u64> {
    debug!("spawn_signal_forwarder: called");
    let mut rx = event_bus.subscribe();
    drop(event_bus);
    let coordinator = coordinator.map(|handle| handle.downgrade());

    tokio::spawn(async move {
        let mut applied = 0;
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "SignalForwarder: lagged behind, missed events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("SignalForwarder: channel closed, shutting down");
                    break;
                }
            };
            let Some(command) = event.as_signal_command() else {
                continue;
            };

            match controller.apply(&command).await {
                Ok(()) => applied += 1,
                Err(ControllerError::Unreachable(signal_id, reason)) => {
                    warn!(%signal_id, %reason, "SignalForwarder: signal unreachable");
                    if let Some(handle) = coordinator.as_ref().and_then(WeakCoordinatorHandle::upgrade)
                        && let Err(e) = handle.set_signal_connected(&signal_id, false).await
                    {
                        debug!(%signal_id, error = %e, "SignalForwarder: could not report disconnect");
                    }
                }
                Err(e) => warn!(error = %e, "SignalForwarder: command rejected"),
            }
        }
        applied
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Phase, SignalMode};
    use crate::events::EngineEvent;

    fn command(signal_id: &str) -> EngineEvent {
        EngineEvent::SignalCommand {
            signal_id: signal_id.to_string(),
            phase: Phase::Green,
            mode: SignalMode::Emergency,
        }
    }

    #[tokio::test]
    async fn test_forwarder_applies_signal_commands_only() {
        let bus = Arc::new(EventBus::new(16));
        let controller = Arc::new(RecordingController::new());
        let task = spawn_signal_forwarder(bus.clone(), controller.clone(), None);

        bus.emit(command("S1"));
        bus.emit(EngineEvent::Tick { tick: 1 });
        bus.emit(command("S2"));
        drop(bus);

        assert_eq!(task.await.unwrap(), 2);
        let applied: Vec<String> = controller.applied().into_iter().map(|c| c.signal_id).collect();
        assert_eq!(applied, vec!["S1", "S2"]);
    }

    #[tokio::test]
    async fn test_unreachable_signal_not_counted() {
        let bus = Arc::new(EventBus::new(16));
        let controller = Arc::new(RecordingController::with_unreachable(vec!["S2".to_string()]));
        let task = spawn_signal_forwarder(bus.clone(), controller.clone(), None);

        bus.emit(command("S1"));
        bus.emit(command("S2"));
        drop(bus);

        assert_eq!(task.await.unwrap(), 1);
        assert_eq!(controller.applied().len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_controller_accepts_everything() {
        let cmd = SignalCommand {
            signal_id: "S1".to_string(),
            phase: Phase::Red,
            mode: SignalMode::Normal,
        };
        assert!(TracingController.apply(&cmd).await.is_ok());
    }
}
