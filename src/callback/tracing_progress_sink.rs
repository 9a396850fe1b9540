use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::types::progress_sink::{EntryEvent, JobEvent, ProgressEventType, ProgressSink};
use crate::types::{ProgressSnapshot, format_elapsed_time, human_readable_size};

/// Writes every progress event to the log.
///
/// Finished entries are logged as `"<message> elapsed <H:MM:SS> <rate> [<done>/<total>]"`.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl TracingProgressSink {
    pub fn new() -> Self {
        Self
    }
}

pub fn format_transfer_rate(snapshot: &ProgressSnapshot) -> String {
    if snapshot.elapsed.is_zero() {
        return "0B/s".to_string();
    }

    format!("{}/s", human_readable_size(snapshot.bytes_per_sec()))
}

pub fn format_progress_message(message: &str, snapshot: &ProgressSnapshot) -> String {
    format!(
        "{message} elapsed {} {} [{}/{}]",
        format_elapsed_time(snapshot.elapsed),
        format_transfer_rate(snapshot),
        snapshot.entries_completed,
        snapshot.entries_total
    )
}

#[async_trait]
impl ProgressSink for TracingProgressSink {
    async fn on_entry_event(&self, event: EntryEvent) -> Result<()> {
        let message = event.message.clone().unwrap_or_default();
        let progress = event.progress.unwrap_or_default();

        match event.event_type {
            ProgressEventType::ENTRY_STARTED => {
                debug!(
                    entry_id = event.entry_id.to_string(),
                    path = event.source_path,
                    key = event.destination_key,
                    dry_run = event.dry_run,
                    "upload started."
                );
            }
            ProgressEventType::ENTRY_COMPLETED => {
                info!(
                    entry_id = event.entry_id.to_string(),
                    size = event.bytes_transferred,
                    "{}",
                    format_progress_message(&message, &progress)
                );
            }
            _ => {
                warn!(
                    entry_id = event.entry_id.to_string(),
                    key = event.destination_key,
                    "{}",
                    format_progress_message(&message, &progress)
                );
            }
        }

        Ok(())
    }

    async fn on_job_event(&self, event: JobEvent) -> Result<()> {
        let job_id = event.job_id.map(|id| id.to_string()).unwrap_or_default();

        if event.event_type == ProgressEventType::JOB_STARTED {
            info!(
                job_id = job_id,
                entries = event.progress.entries_total,
                dry_run = event.dry_run,
                "job started."
            );
            return Ok(());
        }

        info!(
            job_id = job_id,
            status = event.status.to_string(),
            uploaded = event.progress.entries_completed,
            failed = event.progress.entries_failed,
            total = event.progress.entries_total,
            transferred = human_readable_size(event.progress.bytes_completed),
            elapsed = format_elapsed_time(event.progress.elapsed),
            message = event.message.unwrap_or_default(),
            "job finished."
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use crate::types::{JobStatus, TransferOutcome, UploadEntry};

    use super::*;

    #[test]
    fn transfer_rate() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            format_transfer_rate(&ProgressSnapshot {
                bytes_completed: 4096,
                ..Default::default()
            }),
            "0B/s"
        );
        assert_eq!(
            format_transfer_rate(&ProgressSnapshot {
                bytes_completed: 3072,
                elapsed: Duration::from_secs(2),
                ..Default::default()
            }),
            "1.5KiB/s"
        );
    }

    #[test]
    fn progress_message() {
        init_dummy_tracing_subscriber();

        let snapshot = ProgressSnapshot {
            entries_total: 3,
            entries_completed: 2,
            entries_failed: 0,
            bytes_completed: 2048,
            elapsed: Duration::from_secs(2),
        };

        assert_eq!(
            format_progress_message("Uploaded /data/a", &snapshot),
            "Uploaded /data/a elapsed 0:00:02 1.0KiB/s [2/3]"
        );
    }

    #[tokio::test]
    async fn log_events() {
        init_dummy_tracing_subscriber();

        let mut sink = TracingProgressSink::new();
        let outcome = TransferOutcome::completed(
            UploadEntry::new("/data/a", "a"),
            10,
            "Uploaded /data/a".to_string(),
            Utc::now(),
        );

        sink.on_entry_event(EntryEvent::started(None, &outcome.entry, Utc::now()))
            .await
            .unwrap();
        sink.on_entry_event(EntryEvent::finished(
            None,
            &outcome,
            ProgressSnapshot::default(),
        ))
        .await
        .unwrap();
        sink.on_job_event(JobEvent::new(
            ProgressEventType::JOB_COMPLETED,
            None,
            JobStatus::Completed,
            Utc::now(),
            ProgressSnapshot::default(),
        ))
        .await
        .unwrap();
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
