//! SignalRegistry - owns every signal and its phase state machine

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::domain::{Phase, Signal, SignalCommand, SignalMode, SignalTiming};
use crate::error::{EngineError, EngineResult, EntityKind};

/// Owns the set of signals; pure state, no I/O
///
/// Every change to a signal's phase or mode queues a [`SignalCommand`] in an
/// outbox. The owner drains it with [`SignalRegistry::drain_commands`] and
/// forwards the commands to the controller adapter.
#[derive(Debug)]
pub struct SignalRegistry {
    signals: BTreeMap<String, Signal>,
    timing: SignalTiming,
    tick_secs: u64,
    outbox: Vec<SignalCommand>,
}

impl SignalRegistry {
    pub fn new(timing: SignalTiming, tick_secs: u64) -> Self {
        debug!(?timing, tick_secs, "SignalRegistry::new: called");
        Self {
            signals: BTreeMap::new(),
            timing,
            tick_secs,
            outbox: Vec::new(),
        }
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    /// Add a signal; identifiers are unique for the life of the registry
    pub fn register(&mut self, signal: Signal) -> EngineResult<()> {
        debug!(signal_id = %signal.id, location = %signal.location, "SignalRegistry::register: called");
        if self.signals.contains_key(&signal.id) {
            return Err(EngineError::duplicate(EntityKind::Signal, &signal.id));
        }
        self.outbox.push(signal.command());
        self.signals.insert(signal.id.clone(), signal);
        Ok(())
    }

    pub fn get(&self, signal_id: &str) -> Option<&Signal> {
        self.signals.get(signal_id)
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Fails with `NotFound` or `Disconnected` if the signal cannot take commands
    pub fn check_usable(&self, signal_id: &str) -> EngineResult<&Signal> {
        let signal = self
            .signals
            .get(signal_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Signal, signal_id))?;
        if !signal.connected {
            return Err(EngineError::Disconnected(signal_id.to_string()));
        }
        Ok(signal)
    }

    /// Advance one signal by one tick
    ///
    /// Returns true if the phase changed. Disconnected signals are left as-is.
    pub fn advance(&mut self, signal_id: &str) -> EngineResult<bool> {
        let signal = self
            .signals
            .get_mut(signal_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Signal, signal_id))?;
        let changed = step(signal, &self.timing, self.tick_secs);
        if changed {
            self.outbox.push(signal.command());
        }
        Ok(changed)
    }

    /// Advance every connected signal by one tick; returns the number of phase changes
    pub fn advance_all(&mut self) -> usize {
        let mut changes = 0;
        for signal in self.signals.values_mut() {
            if step(signal, &self.timing, self.tick_secs) {
                self.outbox.push(signal.command());
                changes += 1;
            }
        }
        changes
    }

    /// Force GREEN in EMERGENCY mode for `duration` seconds
    ///
    /// Repeating the override never shrinks the active window.
    pub fn override_signal(&mut self, signal_id: &str, duration: u64) -> EngineResult<()> {
        debug!(%signal_id, duration, "SignalRegistry::override_signal: called");
        if duration == 0 {
            return Err(EngineError::InvalidDuration);
        }
        self.check_usable(signal_id)?;
        let Some(signal) = self.signals.get_mut(signal_id) else {
            return Err(EngineError::not_found(EntityKind::Signal, signal_id));
        };

        if signal.mode == SignalMode::Emergency && signal.phase == Phase::Green {
            debug!(%signal_id, "SignalRegistry::override_signal: already in emergency, refreshing window");
            signal.phase_time_remaining = signal.phase_time_remaining.max(duration);
            signal.override_secs = Some(signal.override_secs.unwrap_or(0).max(duration));
        } else {
            signal.mode = SignalMode::Emergency;
            signal.phase = Phase::Green;
            signal.phase_time_remaining = duration;
            signal.override_secs = Some(duration);
            info!(%signal_id, duration, "Signal overridden to emergency green");
        }
        self.outbox.push(signal.command());
        Ok(())
    }

    /// Request green priority without cutting a yellow clearance interval short
    ///
    /// GREEN is held, RED moves straight to GREEN, YELLOW runs out first. An
    /// EMERGENCY override is never downgraded; its window is refreshed instead.
    pub fn preempt(&mut self, signal_id: &str, duration: u64) -> EngineResult<()> {
        debug!(%signal_id, duration, "SignalRegistry::preempt: called");
        if duration == 0 {
            return Err(EngineError::InvalidDuration);
        }
        self.check_usable(signal_id)?;
        if self.signals.get(signal_id).map(|s| s.mode) == Some(SignalMode::Emergency) {
            debug!(%signal_id, "SignalRegistry::preempt: signal in emergency, refreshing instead");
            return self.override_signal(signal_id, duration);
        }
        let Some(signal) = self.signals.get_mut(signal_id) else {
            return Err(EngineError::not_found(EntityKind::Signal, signal_id));
        };

        signal.mode = SignalMode::Preempted;
        signal.override_secs = Some(signal.override_secs.unwrap_or(0).max(duration));
        match signal.phase {
            Phase::Green => {
                signal.phase_time_remaining = signal.phase_time_remaining.max(duration);
            }
            Phase::Red => {
                signal.phase = Phase::Green;
                signal.phase_time_remaining = duration;
            }
            Phase::Yellow => {
                debug!(%signal_id, remaining = signal.phase_time_remaining, "SignalRegistry::preempt: waiting out yellow");
            }
        }
        info!(%signal_id, phase = %signal.phase, "Signal preempted");
        self.outbox.push(signal.command());
        Ok(())
    }

    /// Return a signal to its normal cycle
    ///
    /// Returns false if the signal was already NORMAL. Applies to disconnected
    /// signals too: the desired state is recorded and re-asserted on reconnect.
    pub fn release(&mut self, signal_id: &str) -> EngineResult<bool> {
        debug!(%signal_id, "SignalRegistry::release: called");
        let signal = self
            .signals
            .get_mut(signal_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Signal, signal_id))?;

        if signal.mode == SignalMode::Normal {
            debug!(%signal_id, "SignalRegistry::release: already normal");
            return Ok(false);
        }

        signal.mode = SignalMode::Normal;
        signal.override_secs = None;
        signal.phase_time_remaining = self.timing.duration_for(signal.phase);
        info!(%signal_id, phase = %signal.phase, "Signal released to normal cycle");
        self.outbox.push(signal.command());
        Ok(true)
    }

    /// Record a connectivity change reported by the controller adapter
    ///
    /// Returns true if connectivity changed. Reconnecting re-asserts the
    /// signal's current desired state.
    pub fn set_connected(&mut self, signal_id: &str, connected: bool) -> EngineResult<bool> {
        debug!(%signal_id, connected, "SignalRegistry::set_connected: called");
        let signal = self
            .signals
            .get_mut(signal_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Signal, signal_id))?;

        if signal.connected == connected {
            return Ok(false);
        }
        signal.connected = connected;
        if connected {
            info!(%signal_id, "Signal reconnected");
            self.outbox.push(signal.command());
        } else {
            warn!(%signal_id, mode = %signal.mode, "Signal disconnected");
        }
        Ok(true)
    }

    /// Put a signal back exactly as it was (used to roll back a failed corridor)
    pub(crate) fn restore(&mut self, snapshot: Signal) {
        debug!(signal_id = %snapshot.id, "SignalRegistry::restore: called");
        self.outbox.push(snapshot.command());
        self.signals.insert(snapshot.id.clone(), snapshot);
    }

    /// Take every queued desired-state command
    pub fn drain_commands(&mut self) -> Vec<SignalCommand> {
        std::mem::take(&mut self.outbox)
    }
}

/// One tick of a signal's state machine; returns true if the phase changed
fn step(signal: &mut Signal, timing: &SignalTiming, tick_secs: u64) -> bool {
    if !signal.connected {
        return false;
    }

    signal.phase_time_remaining = signal.phase_time_remaining.saturating_sub(tick_secs);
    if signal.phase_time_remaining > 0 {
        return false;
    }

    match signal.mode {
        SignalMode::Normal => {
            signal.phase = signal.phase.next();
            signal.phase_time_remaining = timing.duration_for(signal.phase);
            true
        }
        SignalMode::Emergency | SignalMode::Preempted => {
            // Overrides hold GREEN until released; a preempted signal finishing yellow turns GREEN here
            let hold = signal.override_secs.unwrap_or(timing.green_secs).max(1);
            signal.phase_time_remaining = hold;
            if signal.phase == Phase::Green {
                false
            } else {
                signal.phase = Phase::Green;
                true
            }
        }
    }
}
