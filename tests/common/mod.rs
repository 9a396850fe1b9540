#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use tempfile::TempDir;
use tokio::sync::{Mutex, Semaphore};

use s3_upload_agent::Config;
use s3_upload_agent::config::{TransferConfig, default_queue_capacity};
use s3_upload_agent::pipeline::Pipeline;
use s3_upload_agent::storage::memory::MemoryStorage;
use s3_upload_agent::types::progress_sink::{EntryEvent, JobEvent, ProgressEventType, ProgressSink};
use s3_upload_agent::types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
use s3_upload_agent::types::{JobResult, UploadEntry};

pub static SEMAPHORE: Lazy<Arc<Semaphore>> = Lazy::new(|| Arc::new(Semaphore::new(1)));

#[derive(Debug, Default)]
pub struct RecordedEvents {
    pub entry_events: Vec<EntryEvent>,
    pub job_events: Vec<JobEvent>,
}

impl RecordedEvents {
    pub fn entry_event_count(&self, event_type: ProgressEventType) -> usize {
        self.entry_events
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }
}

/// Keeps every event it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<RecordedEvents>>,
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn on_entry_event(&self, event: EntryEvent) -> Result<()> {
        self.events.lock().await.entry_events.push(event);
        Ok(())
    }

    async fn on_job_event(&self, event: JobEvent) -> Result<()> {
        self.events.lock().await.job_events.push(event);
        Ok(())
    }
}

/// Records every event after a fixed delay.
#[derive(Clone)]
pub struct SlowRecordingSink {
    pub delay: std::time::Duration,
    pub events: Arc<Mutex<RecordedEvents>>,
}

impl SlowRecordingSink {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            events: Arc::new(Mutex::new(RecordedEvents::default())),
        }
    }
}

#[async_trait]
impl ProgressSink for SlowRecordingSink {
    async fn on_entry_event(&self, event: EntryEvent) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.events.lock().await.entry_events.push(event);
        Ok(())
    }

    async fn on_job_event(&self, event: JobEvent) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.events.lock().await.job_events.push(event);
        Ok(())
    }
}

pub struct TestHelper {
    pub dir: TempDir,
}

impl TestHelper {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }

    pub fn content(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 251) as u8).collect()
    }

    /// Writes `size` bytes of `content()` and returns the entry for it.
    pub fn write_file(&self, name: &str, size: usize) -> UploadEntry {
        let path = self.dir.path().join(name);
        std::fs::write(&path, Self::content(size)).unwrap();

        UploadEntry::new(path, &format!("load1/{name}"))
    }

    pub fn missing_file(&self, name: &str) -> UploadEntry {
        UploadEntry::new(self.dir.path().join(name), &format!("load1/{name}"))
    }

    pub fn create_config(io_concurrency: u16, network_concurrency: u16) -> Config {
        let mut config = Config {
            io_concurrency,
            network_concurrency,
            queue_capacity: default_queue_capacity(io_concurrency, network_concurrency),
            ..Default::default()
        };
        config.target_client_config.parallel_upload_semaphore =
            Arc::new(Semaphore::new(network_concurrency as usize));

        config
    }

    pub fn create_multipart_config(threshold: u64, chunksize: u64) -> Config {
        Config {
            transfer_config: TransferConfig {
                multipart_threshold: threshold,
                multipart_chunksize: chunksize,
            },
            ..Self::create_config(4, 4)
        }
    }

    pub fn record_events(config: &mut Config) -> Arc<Mutex<RecordedEvents>> {
        let sink = RecordingSink::default();
        let events = sink.events.clone();
        config
            .progress_manager
            .register_sink(ProgressEventType::ALL_EVENTS, sink);

        events
    }

    pub async fn run_pipeline(
        config: Config,
        entries: Vec<UploadEntry>,
        storage: &MemoryStorage,
    ) -> (Pipeline, JobResult) {
        Self::run_pipeline_with_token(
            config,
            entries,
            storage,
            create_pipeline_cancellation_token(),
        )
        .await
    }

    pub async fn run_pipeline_with_token(
        config: Config,
        entries: Vec<UploadEntry>,
        storage: &MemoryStorage,
        cancellation_token: PipelineCancellationToken,
    ) -> (Pipeline, JobResult) {
        let target = if config.dry_run {
            None
        } else {
            Some(storage.boxed())
        };

        let mut pipeline = Pipeline::new(config, entries, target, cancellation_token);
        pipeline.run().await;

        let job_result = pipeline.get_job_result().unwrap();
        (pipeline, job_result)
    }
}
