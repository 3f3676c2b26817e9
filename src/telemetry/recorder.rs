//! # Session Recorder
//!
//! Writes published snapshots to rotating JSONL files, one record per line:
//!
//! ```text
//! {"timestamp":"2024-05-01T18:03:12.402Z","stroke_count":10,"elapsed_time_ms":90000,...}
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::fdf::parser::SnapshotSink;
use crate::fdf::protocol::TelemetrySnapshot;

/// Prefix of recorder file names
pub const RECORD_FILE_PREFIX: &str = "session_";

/// Extension of recorder file names
pub const RECORD_FILE_EXTENSION: &str = "jsonl";

#[derive(Debug, Serialize)]
struct SnapshotRecord<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: &'a TelemetrySnapshot,
}

#[derive(Debug, Default)]
struct RecorderState {
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    files_created: u64,
    last_record: Option<Instant>,
}

/// Snapshot consumer that appends JSONL records to disk
#[derive(Debug)]
pub struct SessionRecorder {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    interval: Duration,
    state: Mutex<RecorderState>,
}

impl SessionRecorder {
    /// Create a recorder, creating the log directory if needed
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the directory cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let log_dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&log_dir)?;
        info!("Recording session telemetry to {}", log_dir.display());

        Ok(Self {
            log_dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            interval: Duration::from_millis(config.log_interval_ms),
            state: Mutex::new(RecorderState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one snapshot unless the previous record is too recent
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - `true` if a record was written
    pub fn record(&self, snapshot: &TelemetrySnapshot) -> Result<bool> {
        let mut state = self.lock();

        if let Some(last) = state.last_record {
            if last.elapsed() < self.interval {
                return Ok(false);
            }
        }

        if state.writer.is_none() || state.records_in_file >= self.max_records_per_file {
            self.rotate(&mut state)?;
        }

        let record = SnapshotRecord {
            timestamp: Utc::now(),
            snapshot,
        };

        if let Some(writer) = state.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &record)?;
            writer.write_all(b"\n")?;
        }

        state.records_in_file += 1;
        state.last_record = Some(Instant::now());
        Ok(true)
    }

    fn rotate(&self, state: &mut RecorderState) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}_{:04}.{}",
            RECORD_FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            state.files_created,
            RECORD_FILE_EXTENSION
        );
        let path = self.log_dir.join(name);
        let file = File::create(&path)?;
        debug!("Opened telemetry record file {}", path.display());

        state.writer = Some(BufWriter::new(file));
        state.records_in_file = 0;
        state.files_created += 1;

        self.prune()
    }

    /// Delete the oldest record files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files = record_files(&self.log_dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        let excess = files.len() - self.max_files_to_keep;
        for path in files.drain(..excess) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove old record file {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Flush buffered records to disk
    ///
    /// Records are otherwise only flushed on rotation and when the recorder
    /// is dropped.
    pub fn flush(&self) -> Result<()> {
        if let Some(writer) = self.lock().writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush telemetry records: {}", e);
        }
    }
}

/// Record files in `dir`, oldest first
pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            name.starts_with(RECORD_FILE_PREFIX)
                && path.extension().and_then(|e| e.to_str()) == Some(RECORD_FILE_EXTENSION)
        })
        .collect();
    files.sort();
    Ok(files)
}

impl SnapshotSink for SessionRecorder {
    fn on_snapshot(&self, snapshot: &TelemetrySnapshot) {
        if let Err(e) = self.record(snapshot) {
            warn!("Failed to record telemetry: {}", e);
        }
    }
}
