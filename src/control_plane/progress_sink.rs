use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::control_plane::ControlPlaneClient;
use crate::control_plane::types::{JobEntryLogRequest, JobEntryStatus, JobUpdate};
use crate::types::format_elapsed_time;
use crate::types::progress_sink::{EntryEvent, JobEvent, ProgressEventType, ProgressSink};

/// Reports entry logs and job status of one job to the control plane.
pub struct ControlPlaneProgressSink {
    client: ControlPlaneClient,
    job_id: Uuid,
}

impl ControlPlaneProgressSink {
    pub fn new(client: ControlPlaneClient, job_id: Uuid) -> Self {
        Self { client, job_id }
    }
}

fn entry_log_request(job_id: Uuid, event: EntryEvent) -> JobEntryLogRequest {
    let status = if event.event_type == ProgressEventType::ENTRY_STARTED {
        JobEntryStatus::Started
    } else if event.event_type == ProgressEventType::ENTRY_COMPLETED {
        JobEntryStatus::Completed
    } else {
        JobEntryStatus::Error
    };

    JobEntryLogRequest {
        job_id,
        entry_id: event.entry_id,
        status,
        message: event.message,
        started_at: Some(event.started_at),
        completed_at: event.completed_at,
        uploaded_size_bytes: event.bytes_transferred,
    }
}

fn job_update(event: &JobEvent) -> JobUpdate {
    if event.event_type == ProgressEventType::JOB_STARTED {
        return JobUpdate {
            status: Some(event.status),
            started_at: Some(event.started_at),
            ..Default::default()
        };
    }

    JobUpdate {
        status: Some(event.status),
        uploaded_files: Some(event.progress.entries_completed),
        uploaded_size_bytes: event.progress.bytes_completed,
        completed_at: event.completed_at,
        elapsed_time: Some(format_elapsed_time(event.progress.elapsed)),
        ..Default::default()
    }
}

#[async_trait]
impl ProgressSink for ControlPlaneProgressSink {
    async fn on_entry_event(&self, event: EntryEvent) -> Result<()> {
        let request = entry_log_request(self.job_id, event);
        self.client.post_entry_log(&request).await?;
        Ok(())
    }

    async fn on_job_event(&self, event: JobEvent) -> Result<()> {
        self.client
            .update_job(self.job_id, job_update(&event))
            .await?;
        Ok(())
    }
}
