use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use byte_unit::{Byte, UnitType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::error::UploadAgentError;

pub mod error;
pub mod progress_sink;
pub mod token;

/// A single file to upload. Created once from an entry source and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub destination_key: String,
}

impl UploadEntry {
    pub fn new(source_path: impl Into<PathBuf>, destination_key: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_path: source_path.into(),
            destination_key: destination_key.to_string(),
        }
    }

    pub fn source_path_string(&self) -> String {
        self.source_path.to_string_lossy().to_string()
    }
}

/// The content of an entry read into memory.
/// An entry with `read_error` is never forwarded to the object storage.
#[derive(Debug)]
pub struct ReadResult {
    pub entry: UploadEntry,
    pub payload: Vec<u8>,
    pub read_error: Option<UploadAgentError>,
    pub started_at: DateTime<Utc>,
}

impl ReadResult {
    pub fn success(entry: UploadEntry, payload: Vec<u8>, started_at: DateTime<Utc>) -> Self {
        Self {
            entry,
            payload,
            read_error: None,
            started_at,
        }
    }

    pub fn failure(entry: UploadEntry, error: UploadAgentError, started_at: DateTime<Utc>) -> Self {
        Self {
            entry,
            payload: vec![],
            read_error: Some(error),
            started_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub entry: UploadEntry,
    pub status: TransferStatus,
    pub bytes_transferred: u64,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl TransferOutcome {
    pub fn completed(
        entry: UploadEntry,
        bytes_transferred: u64,
        message: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry,
            status: TransferStatus::Completed,
            bytes_transferred,
            message,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(entry: UploadEntry, message: String, started_at: DateTime<Utc>) -> Self {
        Self {
            entry,
            status: TransferStatus::Failed,
            bytes_transferred: 0,
            message,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn cancelled(entry: UploadEntry) -> Self {
        let now = Utc::now();
        Self {
            entry,
            status: TransferStatus::Failed,
            bytes_transferred: 0,
            message: UploadAgentError::Cancelled.to_string(),
            started_at: now,
            completed_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

/// Counters of a running job. Only the outcome aggregator writes them.
#[derive(Debug)]
pub struct JobRunState {
    entries_total: u64,
    entries_completed: AtomicU64,
    entries_failed: AtomicU64,
    bytes_completed: AtomicU64,
    started_at: DateTime<Utc>,
    start_instant: Instant,
}

impl JobRunState {
    pub fn new(entries_total: u64) -> Self {
        Self {
            entries_total,
            entries_completed: AtomicU64::new(0),
            entries_failed: AtomicU64::new(0),
            bytes_completed: AtomicU64::new(0),
            started_at: Utc::now(),
            start_instant: Instant::now(),
        }
    }

    pub fn record_outcome(&self, outcome: &TransferOutcome) -> ProgressSnapshot {
        match outcome.status {
            TransferStatus::Completed => {
                self.bytes_completed
                    .fetch_add(outcome.bytes_transferred, Ordering::SeqCst);
                self.entries_completed.fetch_add(1, Ordering::SeqCst);
            }
            TransferStatus::Failed => {
                self.entries_failed.fetch_add(1, Ordering::SeqCst);
            }
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            entries_total: self.entries_total,
            entries_completed: self.entries_completed.load(Ordering::SeqCst),
            entries_failed: self.entries_failed.load(Ordering::SeqCst),
            bytes_completed: self.bytes_completed.load(Ordering::SeqCst),
            elapsed: self.start_instant.elapsed(),
        }
    }

    pub fn entries_total(&self) -> u64 {
        self.entries_total
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub entries_total: u64,
    pub entries_completed: u64,
    pub entries_failed: u64,
    pub bytes_completed: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn entries_processed(&self) -> u64 {
        self.entries_completed + self.entries_failed
    }

    pub fn bytes_per_sec(&self) -> u64 {
        let elapsed_secs = self.elapsed.as_secs_f64();
        if elapsed_secs == 0.0 {
            return 0;
        }

        (self.bytes_completed as f64 / elapsed_secs) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Cancelled,
    Running,
    Completed,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Error => "ERROR",
        };
        write!(f, "{status}")
    }
}

/// The aggregate of a finished pipeline run.
/// Partial failures do not change `status`; they are reported per entry.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: Option<Uuid>,
    pub status: JobStatus,
    pub entries_total: u64,
    pub completed: u64,
    pub failed: u64,
    pub bytes_completed: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcomes: Vec<TransferOutcome>,
}

impl JobResult {
    pub fn failed_outcomes(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == TransferStatus::Failed)
    }

    pub fn has_failure(&self) -> bool {
        0 < self.failed
    }
}

#[derive(Debug, PartialEq)]
pub enum UploadStatistics {
    UploadBytes(u64),
    UploadComplete { key: String },
    UploadError { key: String },
    UploadWarning { key: String },
    ETagVerified { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Target {
    pub bucket: String,
    pub prefix: String,
}

impl S3Target {
    pub fn object_key(&self, destination_key: &str) -> String {
        if self.prefix.is_empty() || self.prefix.ends_with('/') {
            return format!("{}{}", self.prefix, destination_key);
        }

        format!("{}/{}", self.prefix, destination_key)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum S3Credentials {
    Profile(String),
    FromEnvironment,
    Anonymous,
}

/// Formats a size with one decimal in binary units, e.g. `1.5KiB`. Zero is `0B`.
pub fn human_readable_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".to_string();
    }

    let adjusted = Byte::from_u64(size_bytes).get_appropriate_unit(UnitType::Binary);
    format!("{:.1}{}", adjusted.get_value(), adjusted.get_unit())
}

/// Formats a duration as `H:MM:SS[.ffffff]`.
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let micros = elapsed.subsec_micros();

    if micros == 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_outcome_updates_counters() {
        init_dummy_tracing_subscriber();

        let run_state = JobRunState::new(3);
        let started_at = Utc::now();

        run_state.record_outcome(&TransferOutcome::completed(
            UploadEntry::new("/data/a", "a"),
            10,
            "ok".to_string(),
            started_at,
        ));
        run_state.record_outcome(&TransferOutcome::failed(
            UploadEntry::new("/data/b", "b"),
            "error".to_string(),
            started_at,
        ));
        let snapshot = run_state.record_outcome(&TransferOutcome::completed(
            UploadEntry::new("/data/c", "c"),
            5,
            "ok".to_string(),
            started_at,
        ));

        assert_eq!(snapshot.entries_total, 3);
        assert_eq!(snapshot.entries_completed, 2);
        assert_eq!(snapshot.entries_failed, 1);
        assert_eq!(snapshot.bytes_completed, 15);
        assert_eq!(snapshot.entries_processed(), 3);
    }

    #[test]
    fn cancelled_outcome() {
        init_dummy_tracing_subscriber();

        let outcome = TransferOutcome::cancelled(UploadEntry::new("/data/a", "a"));
        assert_eq!(outcome.status, TransferStatus::Failed);
        assert_eq!(outcome.message, "cancelled");
        assert_eq!(outcome.bytes_transferred, 0);
    }

    #[test]
    fn object_key_with_prefix() {
        init_dummy_tracing_subscriber();

        let no_prefix = S3Target {
            bucket: "bucket".to_string(),
            prefix: "".to_string(),
        };
        assert_eq!(no_prefix.object_key("dir/file"), "dir/file");

        let with_slash = S3Target {
            bucket: "bucket".to_string(),
            prefix: "load1/".to_string(),
        };
        assert_eq!(with_slash.object_key("dir/file"), "load1/dir/file");

        let without_slash = S3Target {
            bucket: "bucket".to_string(),
            prefix: "load1".to_string(),
        };
        assert_eq!(without_slash.object_key("dir/file"), "load1/dir/file");
    }

    #[test]
    fn job_status_serde() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"CANCELLED\"").unwrap(),
            JobStatus::Cancelled
        );
        assert_eq!(JobStatus::Running.to_string(), "RUNNING");
    }

    #[test]
    fn human_readable_size_test() {
        init_dummy_tracing_subscriber();

        assert_eq!(human_readable_size(0), "0B");
        assert_eq!(human_readable_size(512), "512.0B");
        assert_eq!(human_readable_size(1536), "1.5KiB");
        assert_eq!(human_readable_size(3 * 1024 * 1024), "3.0MiB");
        assert_eq!(human_readable_size(5 * 1024 * 1024 * 1024), "5.0GiB");
    }

    #[test]
    fn format_elapsed_time_test() {
        init_dummy_tracing_subscriber();

        assert_eq!(format_elapsed_time(Duration::from_secs(5)), "0:00:05");
        assert_eq!(
            format_elapsed_time(Duration::from_micros(3_723_123_456)),
            "1:02:03.123456"
        );
    }

    #[test]
    fn bytes_per_sec_zero_elapsed() {
        init_dummy_tracing_subscriber();

        let snapshot = ProgressSnapshot {
            bytes_completed: 100,
            ..Default::default()
        };
        assert_eq!(snapshot.bytes_per_sec(), 0);

        let snapshot = ProgressSnapshot {
            bytes_completed: 100,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(snapshot.bytes_per_sec(), 50);
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
