use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::Config;
use crate::storage::Storage;
use crate::types::UploadStatistics;
use crate::types::token::PipelineCancellationToken;

pub struct Stage<I, O> {
    pub config: Config,
    pub target: Option<Storage>,
    pub receiver: Option<Receiver<I>>,
    pub sender: Option<Sender<O>>,
    pub cancellation_token: PipelineCancellationToken,
    pub stats_sender: Sender<UploadStatistics>,
    pub has_warning: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

impl<I, O> Stage<I, O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        target: Option<Storage>,
        receiver: Option<Receiver<I>>,
        sender: Option<Sender<O>>,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<UploadStatistics>,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            target,
            receiver,
            sender,
            cancellation_token,
            stats_sender,
            has_warning,
        }
    }

    pub async fn send(&self, item: O) -> Result<SendResult> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("stage has no sender."))?;

        let result = sender
            .send(item)
            .await
            .map_err(|e| anyhow!("async_channel::Sender::send() failed. {e}"));

        if let Err(e) = result {
            return if !sender.is_closed() {
                Err(e)
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    pub async fn send_stats(&self, stats: UploadStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }

    pub fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }
}
