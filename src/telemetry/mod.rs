//! # Telemetry Module
//!
//! Records sampled tick outcomes to rotating JSONL files.
//!
//! This module handles:
//! - Sampling ticks (every `log_interval_ms`, plus every change of command kind)
//! - Handing records to a writer off the tick path
//! - Formatting as JSONL (JSON Lines)
//! - Rotating files (max N records per file) and retaining only the last M
//!
//! The control loop only ever calls `try_send` on a bounded channel. If the
//! writer falls behind, records are dropped and counted rather than delaying
//! a tick.

pub mod logger;

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::teleop::command::CommandKind;
use logger::{JsonlLogger, TickRecord};

/// Records buffered between the tick loop and the writer
const CHANNEL_CAPACITY: usize = 256;

/// Tick-side handle deciding which records are kept
#[derive(Debug)]
pub struct Recorder {
    tx: mpsc::Sender<TickRecord>,
    interval: Duration,
    last_sent: Option<Instant>,
    last_kind: Option<CommandKind>,
    dropped: u64,
}

impl Recorder {
    #[must_use]
    pub fn new(tx: mpsc::Sender<TickRecord>, interval: Duration) -> Self {
        Self {
            tx,
            interval,
            last_sent: None,
            last_kind: None,
            dropped: 0,
        }
    }

    /// Records lost because the writer was busy or gone
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Offers the record for this tick; returns whether it was queued.
    pub fn record(&mut self, now: Instant, record: TickRecord) -> bool {
        let kind_changed = self.last_kind != Some(record.command);
        let due = self
            .last_sent
            .map_or(true, |at| now.saturating_duration_since(at) >= self.interval);

        self.last_kind = Some(record.command);
        if !(kind_changed || due) {
            return false;
        }

        match self.tx.try_send(record) {
            Ok(()) => {
                self.last_sent = Some(now);
                true
            }
            Err(e) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 1000 == 0 {
                    warn!("Telemetry record dropped ({} total): {}", self.dropped, e);
                }
                false
            }
        }
    }
}

/// Opens the log directory and starts the writer.
///
/// The writer finishes once every [`Recorder`] is dropped and the backlog is
/// written.
///
/// # Errors
///
/// Returns `Io` if the log directory cannot be created.
pub fn spawn(config: &TelemetryConfig) -> Result<(Recorder, JoinHandle<()>)> {
    let logger = JsonlLogger::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    info!(
        "Telemetry logging to {} every {} ms",
        config.log_dir, config.log_interval_ms
    );

    let handle = tokio::task::spawn_blocking(move || write_records(rx, logger));
    Ok((
        Recorder::new(tx, Duration::from_millis(config.log_interval_ms)),
        handle,
    ))
}

fn write_records(mut rx: mpsc::Receiver<TickRecord>, mut logger: JsonlLogger) {
    let mut written: u64 = 0;

    while let Some(first) = rx.blocking_recv() {
        let mut next = Some(first);
        while let Some(record) = next {
            match logger.write(&record) {
                Ok(()) => written += 1,
                Err(e) => warn!("Telemetry write failed: {}", e),
            }
            next = rx.try_recv().ok();
        }

        // Backlog drained
        if let Err(e) = logger.flush() {
            warn!("Telemetry flush failed: {}", e);
        }
    }

    debug!("Telemetry writer finished after {} records", written);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teleop::command::{Command, StopReason};
    use crate::teleop::state::ControlMode;
    use crate::teleop::supervisor::TeleopStatus;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn record(command: Command) -> TickRecord {
        TickRecord::new(
            &command,
            TeleopStatus::Ready,
            ControlMode::Joint,
            (0.06, 0.5),
            None,
            true,
        )
    }

    fn recorder(capacity: usize) -> (Recorder, mpsc::Receiver<TickRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Recorder::new(tx, Duration::from_millis(100)), rx)
    }

    // ==================== Sampling Tests ====================

    #[test]
    fn test_first_record_always_sent() {
        let (mut rec, mut rx) = recorder(8);
        assert!(rec.record(Instant::now(), record(Command::Noop)));
        assert_ok!(rx.try_recv());
    }

    #[test]
    fn test_same_kind_sampled_by_interval() {
        let (mut rec, mut rx) = recorder(8);
        let t0 = Instant::now();

        assert!(rec.record(t0, record(Command::Noop)));
        assert!(!rec.record(t0 + Duration::from_millis(20), record(Command::Noop)));
        assert!(!rec.record(t0 + Duration::from_millis(99), record(Command::Noop)));
        assert!(rec.record(t0 + Duration::from_millis(100), record(Command::Noop)));

        assert_ok!(rx.try_recv());
        assert_ok!(rx.try_recv());
        assert_err!(rx.try_recv());
    }

    #[test]
    fn test_kind_change_sent_immediately() {
        let (mut rec, _rx) = recorder(8);
        let t0 = Instant::now();

        assert!(rec.record(t0, record(Command::Noop)));
        assert!(rec.record(t0 + Duration::from_millis(20), record(Command::Stop(StopReason::Idle))));
        assert!(rec.record(
            t0 + Duration::from_millis(40),
            record(Command::Velocity([0.01, 0.0, 0.0, 0.0, 0.0, 0.0]))
        ));
        assert!(!rec.record(
            t0 + Duration::from_millis(60),
            record(Command::Velocity([0.02, 0.0, 0.0, 0.0, 0.0, 0.0]))
        ));
    }

    #[test]
    fn test_full_channel_drops() {
        let (mut rec, _rx) = recorder(1);
        let t0 = Instant::now();

        assert!(rec.record(t0, record(Command::Noop)));
        assert!(!rec.record(t0 + Duration::from_secs(1), record(Command::Noop)));
        assert_eq!(rec.dropped(), 1);
    }

    #[test]
    fn test_closed_channel_drops() {
        let (mut rec, rx) = recorder(8);
        drop(rx);
        assert!(!rec.record(Instant::now(), record(Command::Noop)));
        assert_eq!(rec.dropped(), 1);
    }

    // ==================== Writer Tests ====================

    #[tokio::test]
    async fn test_spawned_writer_persists_records() {
        let dir = TempDir::new().unwrap();
        let config = TelemetryConfig {
            log_dir: dir.path().to_string_lossy().into_owned(),
            ..TelemetryConfig::default()
        };

        let (mut rec, handle) = spawn(&config).unwrap();
        let t0 = Instant::now();
        rec.record(t0, record(Command::Noop));
        rec.record(t0 + Duration::from_millis(1), record(Command::Stop(StopReason::StopButton)));
        drop(rec);
        handle.await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"stop_button\""));
    }
}
