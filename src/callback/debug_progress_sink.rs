use anyhow::Result;
use async_trait::async_trait;

use crate::types::progress_sink::{EntryEvent, JobEvent, ProgressEventType, ProgressSink};

/// Prints every event to stdout. Useful when embedding the library.
pub struct DebugProgressSink;

#[async_trait]
impl ProgressSink for DebugProgressSink {
    async fn on_entry_event(&self, event: EntryEvent) -> Result<()> {
        match event.event_type {
            ProgressEventType::ENTRY_STARTED => {
                println!("Entry started: {event:?}");
            }
            ProgressEventType::ENTRY_COMPLETED => {
                println!("Entry completed: {event:?}");
            }
            _ => {
                println!("Entry failed: {event:?}");
            }
        }
        Ok(())
    }

    async fn on_job_event(&self, event: JobEvent) -> Result<()> {
        match event.event_type {
            ProgressEventType::JOB_STARTED => {
                println!("Job started: {event:?}");
            }
            _ => {
                println!("Job finished: {event:?}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::types::{JobStatus, ProgressSnapshot, UploadEntry};

    use super::*;

    #[tokio::test]
    async fn print_events() {
        init_dummy_tracing_subscriber();

        let mut sink = DebugProgressSink;
        sink.on_entry_event(EntryEvent::started(
            None,
            &UploadEntry::new("/data/a", "a"),
            Utc::now(),
        ))
        .await
        .unwrap();
        sink.on_job_event(JobEvent::new(
            ProgressEventType::JOB_STARTED,
            None,
            JobStatus::Running,
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
