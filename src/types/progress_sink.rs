use anyhow::Result;
use async_trait::async_trait;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{JobStatus, ProgressSnapshot, TransferOutcome, TransferStatus, UploadEntry};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ProgressEventType: u64 {
        const UNDEFINED = 0u64;
        const ENTRY_STARTED = 1u64 << 1;
        const ENTRY_COMPLETED = 1u64 << 2;
        const ENTRY_FAILED = 1u64 << 3;
        const JOB_STARTED = 1u64 << 4;
        const JOB_COMPLETED = 1u64 << 5;
        const JOB_CANCELLED = 1u64 << 6;
        const JOB_FAILED = 1u64 << 7;

        const ENTRY_EVENTS = Self::ENTRY_STARTED.bits() | Self::ENTRY_COMPLETED.bits() | Self::ENTRY_FAILED.bits();
        const JOB_EVENTS = Self::JOB_STARTED.bits() | Self::JOB_COMPLETED.bits() | Self::JOB_CANCELLED.bits() | Self::JOB_FAILED.bits();
        const ALL_EVENTS  = !0;
    }
}

#[derive(Debug, Clone)]
pub struct EntryEvent {
    pub event_type: ProgressEventType,
    pub job_id: Option<Uuid>,
    pub entry_id: Uuid,
    pub source_path: String,
    pub destination_key: String,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub bytes_transferred: u64,
    pub progress: Option<ProgressSnapshot>,
    pub dry_run: bool,
}

impl EntryEvent {
    pub fn started(job_id: Option<Uuid>, entry: &UploadEntry, started_at: DateTime<Utc>) -> Self {
        Self {
            event_type: ProgressEventType::ENTRY_STARTED,
            job_id,
            entry_id: entry.id,
            source_path: entry.source_path_string(),
            destination_key: entry.destination_key.clone(),
            message: None,
            started_at,
            completed_at: None,
            bytes_transferred: 0,
            progress: None,
            dry_run: false,
        }
    }

    pub fn finished(
        job_id: Option<Uuid>,
        outcome: &TransferOutcome,
        progress: ProgressSnapshot,
    ) -> Self {
        let event_type = match outcome.status {
            TransferStatus::Completed => ProgressEventType::ENTRY_COMPLETED,
            TransferStatus::Failed => ProgressEventType::ENTRY_FAILED,
        };

        Self {
            event_type,
            job_id,
            entry_id: outcome.entry.id,
            source_path: outcome.entry.source_path_string(),
            destination_key: outcome.entry.destination_key.clone(),
            message: Some(outcome.message.clone()),
            started_at: outcome.started_at,
            completed_at: Some(outcome.completed_at),
            bytes_transferred: outcome.bytes_transferred,
            progress: Some(progress),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobEvent {
    pub event_type: ProgressEventType,
    pub job_id: Option<Uuid>,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: ProgressSnapshot,
    pub message: Option<String>,
    pub dry_run: bool,
}

impl JobEvent {
    pub fn new(
        event_type: ProgressEventType,
        job_id: Option<Uuid>,
        status: JobStatus,
        started_at: DateTime<Utc>,
        progress: ProgressSnapshot,
    ) -> Self {
        Self {
            event_type,
            job_id,
            status,
            started_at,
            completed_at: None,
            progress,
            message: None,
            dry_run: false,
        }
    }
}

/// Receives per-entry and per-job progress.
///
/// An `Err` is logged by the caller and never fails a transfer.
#[async_trait]
pub trait ProgressSink {
    async fn on_entry_event(&self, event: EntryEvent) -> Result<()>;
    async fn on_job_event(&self, event: JobEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_event_type_follows_outcome_status() {
        init_dummy_tracing_subscriber();

        let started_at = Utc::now();
        let completed = TransferOutcome::completed(
            UploadEntry::new("/data/a", "a"),
            10,
            "Uploaded /data/a".to_string(),
            started_at,
        );
        let event = EntryEvent::finished(None, &completed, ProgressSnapshot::default());
        assert_eq!(event.event_type, ProgressEventType::ENTRY_COMPLETED);
        assert_eq!(event.bytes_transferred, 10);
        assert_eq!(event.message.unwrap(), "Uploaded /data/a");

        let failed = TransferOutcome::failed(
            UploadEntry::new("/data/b", "b"),
            "error".to_string(),
            started_at,
        );
        let event = EntryEvent::finished(None, &failed, ProgressSnapshot::default());
        assert_eq!(event.event_type, ProgressEventType::ENTRY_FAILED);
        assert!(event.completed_at.is_some());
    }

    #[test]
    fn event_groups() {
        init_dummy_tracing_subscriber();

        assert!(ProgressEventType::ENTRY_EVENTS.contains(ProgressEventType::ENTRY_FAILED));
        assert!(!ProgressEventType::ENTRY_EVENTS.contains(ProgressEventType::JOB_STARTED));
        assert!(ProgressEventType::JOB_EVENTS.contains(ProgressEventType::JOB_CANCELLED));
        assert!(ProgressEventType::ALL_EVENTS.contains(ProgressEventType::JOB_EVENTS));
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
