//! # JSONL Logger
//!
//! Writes [`TickRecord`]s one JSON object per line. A new file is started
//! after `max_records_per_file` records and only the newest
//! `max_files_to_keep` files survive.
//!
//! File names carry their creation time plus a sequence number, so sorting by
//! name sorts by age:
//!
//! ```text
//! teleop_20240101_120000_000_0000.jsonl
//! teleop_20240101_120012_345_0001.jsonl
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, TeleopError};
use crate::teleop::command::{Command, CommandKind, StopReason};
use crate::teleop::state::ControlMode;
use crate::teleop::supervisor::TeleopStatus;

const FILE_PREFIX: &str = "teleop_";
const FILE_EXTENSION: &str = "jsonl";

/// One sampled tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub timestamp: DateTime<Utc>,
    pub command: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<[f64; 6]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub status: TeleopStatus,
    pub mode: ControlMode,
    pub linear_gain: f64,
    pub angular_gain: f64,
    pub deadman_button: Option<usize>,
    pub input_ok: bool,
}

impl TickRecord {
    /// Record for `command` stamped with the current time.
    #[must_use]
    pub fn new(
        command: &Command,
        status: TeleopStatus,
        mode: ControlMode,
        gains: (f64, f64),
        deadman_button: Option<usize>,
        input_ok: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.kind(),
            payload: command.payload(),
            stop_reason: command.stop_reason(),
            status,
            mode,
            linear_gain: gains.0,
            angular_gain: gains.1,
            deadman_button,
            input_ok,
        }
    }
}

/// Rotating JSONL writer
pub struct JsonlLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    sequence: u32,
}

impl JsonlLogger {
    /// Creates the log directory if needed. No file is opened until the
    /// first record arrives.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Appends one record, rotating first if the current file is full.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` if the record cannot be serialized, `Io` if the
    /// file cannot be written.
    pub fn write(&mut self, record: &TickRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)
            .map_err(|e| TeleopError::Telemetry(format!("Failed to serialize record: {}", e)))?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TeleopError::Telemetry("no open log file".into()))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        self.records_in_file += 1;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Io` if the buffered data cannot be written out.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S_%3f"),
            self.sequence,
            FILE_EXTENSION
        );
        self.sequence = self.sequence.wrapping_add(1);

        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Telemetry file opened: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune();
        Ok(())
    }

    /// Deletes the oldest log files beyond `max_files_to_keep`.
    fn prune(&self) {
        let mut files = match log_files(&self.dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Cannot list telemetry directory {}: {}", self.dir.display(), e);
                return;
            }
        };

        if files.len() <= self.max_files_to_keep {
            return;
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for old in files.into_iter().take(excess) {
            match fs::remove_file(&old) {
                Ok(()) => info!("Removed old telemetry file {}", old.display()),
                Err(e) => warn!("Failed to remove {}: {}", old.display(), e),
            }
        }
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Telemetry flush on close failed: {}", e);
        }
    }
}

/// Log files written by this logger in `dir`
fn log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(FILE_PREFIX))
            && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
        if is_log {
            files.push(path);
        }
    }
    Ok(files)
}
