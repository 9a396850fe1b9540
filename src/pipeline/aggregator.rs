use std::sync::Arc;

use async_channel::Receiver;
use tracing::trace;
use uuid::Uuid;

use crate::callback::progress_manager::ProgressManager;
use crate::types::progress_sink::EntryEvent;
use crate::types::{JobRunState, TransferOutcome};

/// Records outcomes into the job counters and reports them as finished entry events.
pub struct OutcomeAggregator {
    run_state: Arc<JobRunState>,
    progress_manager: ProgressManager,
    job_id: Option<Uuid>,
    dry_run: bool,
}

impl OutcomeAggregator {
    pub fn new(
        run_state: Arc<JobRunState>,
        progress_manager: ProgressManager,
        job_id: Option<Uuid>,
        dry_run: bool,
    ) -> Self {
        Self {
            run_state,
            progress_manager,
            job_id,
            dry_run,
        }
    }

    /// The single consumer of the outcome channel. Drains until every network worker has
    /// dropped its sender, so it is never cancelled.
    pub async fn aggregate(&self, receiver: Receiver<TransferOutcome>) -> Vec<TransferOutcome> {
        trace!("aggregator has started.");

        let mut outcomes = vec![];
        while let Ok(outcome) = receiver.recv().await {
            self.record(&outcome).await;
            outcomes.push(outcome);
        }

        trace!(outcomes = outcomes.len(), "aggregator has been completed.");

        outcomes
    }

    pub async fn record(&self, outcome: &TransferOutcome) {
        let progress = self.run_state.record_outcome(outcome);

        let mut event = EntryEvent::finished(self.job_id, outcome, progress);
        event.dry_run = self.dry_run;
        self.progress_manager.trigger_entry_event(event).await;
    }
}
