//! Event Recorder - persists bus traffic to a JSONL file
//!
//! One line per event, for replaying what the controller and responders
//! were told during a run.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::EngineEvent;

/// A timestamped event line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}

impl EventRecord {
    pub fn new(event: EngineEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

pub struct EventRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl EventRecorder {
    /// Open `path` for appending, creating parent directories
    pub fn create(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventRecorder::create: called");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write_event(&mut self, event: &EngineEvent) -> eyre::Result<()> {
        let record = EventRecord::new(event.clone());
        let json = serde_json::to_string(&record)?;
        writeln!(self.writer, "{}", json)?;
        self.written += 1;
        Ok(())
    }

    /// Consume events until the bus closes; returns the number written
    async fn drain(&mut self, mut rx: broadcast::Receiver<EngineEvent>) -> u64 {
        debug!(path = ?self.path, "EventRecorder::drain: starting");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(event_type = event.event_type(), error = %e, "EventRecorder: failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventRecorder: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventRecorder: channel closed, shutting down");
                    break;
                }
            }
        }
        if let Err(e) = self.writer.flush() {
            error!(error = %e, "EventRecorder: failed to flush");
        }
        self.written
    }
}

/// Read back a JSONL event file; unparseable lines are skipped
pub fn read_events(path: impl AsRef<Path>) -> eyre::Result<Vec<EventRecord>> {
    let path = path.as_ref();
    debug!(?path, "read_events: called");
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<EventRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line, error = %e, "read_events: failed to parse line"),
        }
    }
    Ok(records)
}

/// Spawn a recorder that writes every bus event to `path`
pub fn spawn_event_recorder(
    event_bus: Arc<EventBus>,
    path: impl AsRef<Path>,
) -> eyre::Result<tokio::task::JoinHandle<u64>> {
    let mut recorder = EventRecorder::create(path)?;
    // Subscribe before returning so nothing emitted afterwards is missed
    let rx = event_bus.subscribe();
    Ok(tokio::spawn(async move { recorder.drain(rx).await }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Phase, SignalMode};
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_back() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("run").join("events.jsonl");
        let mut recorder = EventRecorder::create(&path).unwrap();

        recorder.write_event(&EngineEvent::Tick { tick: 1 }).unwrap();
        recorder
            .write_event(&EngineEvent::SignalCommand {
                signal_id: "S1".to_string(),
                phase: Phase::Green,
                mode: SignalMode::Emergency,
            })
            .unwrap();
        drop(recorder);

        let records = read_events(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event.event_type(), "Tick");
        assert_eq!(records[1].event.event_type(), "SignalCommand");
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp = tempdir().unwrap();
        assert!(read_events(temp.path().join("nope.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn test_bad_lines_skipped() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("events.jsonl");
        let good = serde_json::to_string(&EventRecord::new(EngineEvent::Tick { tick: 7 })).unwrap();
        fs::write(&path, format!("not json\n{good}\n\n")).unwrap();

        let records = read_events(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, EngineEvent::Tick { tick: 7 });
    }

    #[tokio::test]
    async fn test_spawned_recorder_stops_when_bus_dropped() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("events.jsonl");
        let bus = Arc::new(EventBus::new(16));

        let handle = spawn_event_recorder(bus.clone(), &path).unwrap();
        bus.emit(EngineEvent::Tick { tick: 1 });
        bus.emit(EngineEvent::Tick { tick: 2 });
        drop(bus);

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(read_events(&path).unwrap().len(), 2);
    }
}
