use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Error, anyhow};
use async_channel::{Receiver, Sender};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};
use uuid::Uuid;

use crate::Config;
use crate::pipeline::aggregator::OutcomeAggregator;
use crate::pipeline::read_pool::ReadPool;
use crate::pipeline::reader::EntryReader;
use crate::pipeline::stage::Stage;
use crate::pipeline::uploader::EntryUploader;
use crate::storage::Storage;
use crate::types::error::UploadAgentError;
use crate::types::progress_sink::{JobEvent, ProgressEventType};
use crate::types::token::{PipelineCancellationToken, create_run_cancellation_token};
use crate::types::{
    JobResult, JobRunState, JobStatus, ReadResult, TransferOutcome, UploadEntry, UploadStatistics,
};

mod aggregator;
mod read_pool;
mod reader;
mod stage;
mod uploader;

/// Runs one upload job: entries are read by the read pool, queued, and written to the
/// target by the network workers.
///
/// Failures of single entries are reported as failed outcomes in the `JobResult`. Only a
/// failure of the pipeline itself is stored as an error.
pub struct Pipeline {
    config: Config,
    job_id: Option<Uuid>,
    entries: Vec<UploadEntry>,
    target: Option<Storage>,
    cancellation_token: PipelineCancellationToken,
    run_cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<UploadStatistics>,
    stats_receiver: Receiver<UploadStatistics>,
    has_error: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<Error>>>,
    ready: bool,
    job_result: Option<JobResult>,
}

impl Pipeline {
    /// `target` may be `None` only for a dry-run.
    pub fn new(
        config: Config,
        entries: Vec<UploadEntry>,
        target: Option<Storage>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let run_cancellation_token = create_run_cancellation_token(&cancellation_token);

        Self {
            config,
            job_id: None,
            entries,
            target,
            cancellation_token,
            run_cancellation_token,
            stats_sender,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            has_warning: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::<Error>::new())),
            ready: true,
            job_result: None,
        }
    }

    pub fn set_job_id(&mut self, job_id: Uuid) {
        self.job_id = Some(job_id);
    }

    pub async fn run(&mut self) {
        if !self.ready {
            panic!("it can be executed only once.")
        }
        self.ready = false;

        let run_state = Arc::new(JobRunState::new(self.entries.len() as u64));

        if !self.config.dry_run && self.target.is_none() {
            log_error(
                self.has_error.clone(),
                self.errors.clone(),
                anyhow!(UploadAgentError::TargetStorageNotSpecified),
                "pipeline cannot be started.",
            );
            self.finish(&run_state, vec![]).await;
            return;
        }

        self.trigger_job_event(ProgressEventType::JOB_STARTED, JobStatus::Running, &run_state, None)
            .await;

        let (transfer_queue_sender, transfer_queue_receiver) =
            async_channel::bounded::<ReadResult>(self.config.queue_capacity);
        let (outcome_sender, outcome_receiver) =
            async_channel::bounded::<TransferOutcome>(self.config.queue_capacity);

        let upload_handles = self.upload_entries(transfer_queue_receiver, outcome_sender);
        let aggregate_handle = self.aggregate_outcomes(outcome_receiver, run_state.clone());
        let read_handle = self.read_entries(transfer_queue_sender);

        self.wait_for_stage(read_handle, "read stage has been aborted.")
            .await;
        for upload_handle in upload_handles {
            self.wait_for_stage(upload_handle, "upload stage has been aborted.")
                .await;
        }

        let outcomes = match aggregate_handle.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                log_error(
                    self.has_error.clone(),
                    self.errors.clone(),
                    anyhow!(e),
                    "outcome aggregation has been aborted.",
                );
                vec![]
            }
        };

        self.finish(&run_state, outcomes).await;
    }

    /// Completes the outcome list with entries that were never attempted and stores the
    /// job result.
    async fn finish(&mut self, run_state: &Arc<JobRunState>, mut outcomes: Vec<TransferOutcome>) {
        let missing_entries = find_missing_entries(&self.entries, &outcomes);
        if !missing_entries.is_empty() {
            info!(
                entries = missing_entries.len(),
                "some entries have not been attempted."
            );
        }

        let aggregator = OutcomeAggregator::new(
            run_state.clone(),
            self.config.progress_manager.clone(),
            self.job_id,
            self.config.dry_run,
        );
        for entry in missing_entries {
            let outcome = TransferOutcome::cancelled(entry);
            aggregator.record(&outcome).await;
            outcomes.push(outcome);
        }

        let status = if self.cancellation_token.is_cancelled() {
            JobStatus::Cancelled
        } else if self.has_error() {
            JobStatus::Error
        } else {
            JobStatus::Completed
        };

        let event_type = match status {
            JobStatus::Cancelled => ProgressEventType::JOB_CANCELLED,
            JobStatus::Error => ProgressEventType::JOB_FAILED,
            _ => ProgressEventType::JOB_COMPLETED,
        };

        let completed_at = Utc::now();
        let message = self.first_error_message();
        self.trigger_job_event(event_type, status, run_state, Some((completed_at, message)))
            .await;

        let snapshot = run_state.snapshot();
        self.job_result = Some(JobResult {
            job_id: self.job_id,
            status,
            entries_total: snapshot.entries_total,
            completed: snapshot.entries_completed,
            failed: snapshot.entries_failed,
            bytes_completed: snapshot.bytes_completed,
            started_at: run_state.started_at(),
            completed_at,
            elapsed: snapshot.elapsed,
            outcomes,
        });

        trace!(status = status.to_string(), "pipeline has been completed.");

        self.shutdown();
    }

    fn shutdown(&self) {
        self.run_cancellation_token.cancel();
        self.close_stats_sender();
    }

    fn read_entries(&self, transfer_queue_sender: Sender<ReadResult>) -> JoinHandle<()> {
        let stage = self.create_stage::<UploadEntry, ReadResult>(None, Some(transfer_queue_sender));
        let reader = EntryReader::new(
            stage,
            ReadPool::new(self.config.io_concurrency, self.config.dry_run),
        );
        let entries = self.entries.clone();

        let has_error = self.has_error.clone();
        let error_list = self.errors.clone();
        let run_cancellation_token = self.run_cancellation_token.clone();

        tokio::spawn(async move {
            let result = reader.read(entries).await;
            if let Err(e) = result {
                log_error(has_error, error_list, e, "read entries failed.");
                run_cancellation_token.cancel();
            }
        })
    }

    fn upload_entries(
        &self,
        transfer_queue_receiver: Receiver<ReadResult>,
        outcome_sender: Sender<TransferOutcome>,
    ) -> Vec<JoinHandle<()>> {
        let mut upload_handles = vec![];

        for worker_index in 0..self.config.network_concurrency {
            let stage = self.create_stage(
                Some(transfer_queue_receiver.clone()),
                Some(outcome_sender.clone()),
            );
            let mut uploader = EntryUploader::new(stage, worker_index, self.job_id);

            let has_error = self.has_error.clone();
            let error_list = self.errors.clone();
            let run_cancellation_token = self.run_cancellation_token.clone();

            upload_handles.push(tokio::spawn(async move {
                let result = uploader.upload().await;
                if let Err(e) = result {
                    log_error(has_error, error_list, e, "upload entries failed.");
                    run_cancellation_token.cancel();
                }
            }));
        }

        trace!(workers = upload_handles.len(), "upload workers have been started.");

        upload_handles
    }

    fn aggregate_outcomes(
        &self,
        outcome_receiver: Receiver<TransferOutcome>,
        run_state: Arc<JobRunState>,
    ) -> JoinHandle<Vec<TransferOutcome>> {
        let aggregator = OutcomeAggregator::new(
            run_state,
            self.config.progress_manager.clone(),
            self.job_id,
            self.config.dry_run,
        );

        tokio::spawn(async move { aggregator.aggregate(outcome_receiver).await })
    }

    async fn wait_for_stage(&self, handle: JoinHandle<()>, message: &str) {
        if let Err(e) = handle.await {
            log_error(self.has_error.clone(), self.errors.clone(), anyhow!(e), message);
            self.run_cancellation_token.cancel();
        }
    }

    fn create_stage<I, O>(
        &self,
        receiver: Option<Receiver<I>>,
        sender: Option<Sender<O>>,
    ) -> Stage<I, O> {
        Stage::new(
            self.config.clone(),
            self.target
                .as_ref()
                .map(|target| dyn_clone::clone_box(&**target)),
            receiver,
            sender,
            self.run_cancellation_token.clone(),
            self.stats_sender.clone(),
            self.has_warning.clone(),
        )
    }

    async fn trigger_job_event(
        &self,
        event_type: ProgressEventType,
        status: JobStatus,
        run_state: &JobRunState,
        finished: Option<(chrono::DateTime<Utc>, Option<String>)>,
    ) {
        let mut event = JobEvent::new(
            event_type,
            self.job_id,
            status,
            run_state.started_at(),
            run_state.snapshot(),
        );
        event.dry_run = self.config.dry_run;
        if let Some((completed_at, message)) = finished {
            event.completed_at = Some(completed_at);
            event.message = message;
        }

        self.config.progress_manager.trigger_job_event(event).await;
    }

    fn first_error_message(&self) -> Option<String> {
        self.errors
            .lock()
            .ok()
            .and_then(|errors| errors.front().map(|e| e.to_string()))
    }

    /// Available once `run()` has returned.
    pub fn get_job_result(&self) -> Option<JobResult> {
        self.job_result.clone()
    }

    pub fn get_stats_receiver(&self) -> Receiver<UploadStatistics> {
        self.stats_receiver.clone()
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    pub fn get_errors_and_consume(&self) -> Option<Vec<Error>> {
        if !self.has_error() {
            return None;
        }

        let mut error_list = self.errors.lock().ok()?;
        Some(error_list.drain(..).collect())
    }

    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }
}

/// Entries that have fewer outcomes than occurrences, in entry order.
fn find_missing_entries(entries: &[UploadEntry], outcomes: &[TransferOutcome]) -> Vec<UploadEntry> {
    let mut outcome_counts = HashMap::<Uuid, usize>::new();
    for outcome in outcomes {
        *outcome_counts.entry(outcome.entry.id).or_default() += 1;
    }

    entries
        .iter()
        .filter(|entry| match outcome_counts.get_mut(&entry.id) {
            Some(count) if 0 < *count => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

fn log_error(has_error: Arc<AtomicBool>, errors: Arc<Mutex<VecDeque<Error>>>, e: Error, message: &str) {
    has_error.store(true, Ordering::SeqCst);

    let error = e.to_string();
    let source = e.source();
    error!(error = error, source = source, message);

    if let Ok(mut error_list) = errors.lock() {
        error_list.push_back(e);
    }
}
