use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{info, trace};

use crate::pipeline::read_pool::ReadPool;
use crate::pipeline::stage::{SendResult, Stage};
use crate::types::{ReadResult, UploadEntry};

/// Submits entries to the read pool and puts the results into the transfer queue.
///
/// The transfer queue is closed when the reader is dropped, i.e. after the last read
/// result has been sent.
pub struct EntryReader {
    base: Arc<Stage<UploadEntry, ReadResult>>,
    read_pool: ReadPool,
}

impl EntryReader {
    pub fn new(base: Stage<UploadEntry, ReadResult>, read_pool: ReadPool) -> Self {
        Self {
            base: Arc::new(base),
            read_pool,
        }
    }

    pub async fn read(self, entries: Vec<UploadEntry>) -> Result<()> {
        trace!(entries = entries.len(), "reader has started.");

        let mut read_tasks = JoinSet::new();
        let mut submitted: usize = 0;

        for entry in entries {
            let permit = tokio::select! {
                biased;

                _ = self.base.cancellation_token.cancelled() => {
                    info!(submitted = submitted, "reader has been cancelled.");
                    break;
                }
                permit = self.read_pool.acquire() => permit?,
            };

            let base = self.base.clone();
            let read_pool = self.read_pool.clone();
            read_tasks.spawn(async move {
                let _permit = permit;
                let read_result = read_pool.read(entry).await;

                tokio::select! {
                    send_result = base.send(read_result) => {
                        if send_result? == SendResult::Closed {
                            trace!("transfer queue has been closed.");
                        }
                    },
                    _ = base.cancellation_token.cancelled() => {}
                }

                Ok::<(), anyhow::Error>(())
            });
            submitted += 1;

            while let Some(result) = read_tasks.try_join_next() {
                result.context("read task failed.")??;
            }
        }

        while let Some(result) = read_tasks.join_next().await {
            result.context("read task failed.")??;
        }

        trace!(submitted = submitted, "reader has been completed.");

        Ok(())
    }
}
