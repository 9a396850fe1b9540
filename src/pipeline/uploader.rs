use anyhow::{Result, anyhow};
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::pipeline::stage::{SendResult, Stage};
use crate::storage::upload_manager::UploadManager;
use crate::types::UploadStatistics::{UploadComplete, UploadError};
use crate::types::error::{UploadAgentError, is_cancelled_error};
use crate::types::progress_sink::EntryEvent;
use crate::types::{ReadResult, TransferOutcome};

/// A network worker. Takes read results from the transfer queue and produces exactly one
/// outcome for each of them.
pub struct EntryUploader {
    worker_index: u16,
    job_id: Option<Uuid>,
    base: Stage<ReadResult, TransferOutcome>,
    upload_manager: Option<UploadManager>,
}

impl EntryUploader {
    pub fn new(base: Stage<ReadResult, TransferOutcome>, worker_index: u16, job_id: Option<Uuid>) -> Self {
        let upload_manager = if base.config.dry_run {
            None
        } else {
            base.target.as_ref().map(|target| {
                UploadManager::new(
                    dyn_clone::clone_box(&**target),
                    base.config.clone(),
                    base.cancellation_token.clone(),
                    base.stats_sender.clone(),
                )
            })
        };

        Self {
            worker_index,
            job_id,
            base,
            upload_manager,
        }
    }

    pub async fn upload(&mut self) -> Result<()> {
        trace!(worker_index = self.worker_index, "upload worker has started.");
        self.receive_and_upload().await
    }

    async fn receive_and_upload(&mut self) -> Result<()> {
        let receiver = self
            .base
            .receiver
            .clone()
            .ok_or_else(|| anyhow!("upload worker has no receiver."))?;
        let cancellation_token = self.base.cancellation_token.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "upload worker has been cancelled.");
                    return Ok(());
                }
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(read_result) => {
                            let outcome = self.upload_entry(read_result).await;
                            if self.base.send(outcome).await? == SendResult::Closed {
                                return Ok(());
                            }
                        },
                        Err(_) => {
                            // normal shutdown
                            trace!(worker_index = self.worker_index, "upload worker has been completed.");
                            break;
                        }
                    }
                },
            }
        }

        Ok(())
    }

    async fn upload_entry(&mut self, read_result: ReadResult) -> TransferOutcome {
        let ReadResult {
            entry,
            payload,
            read_error,
            started_at,
        } = read_result;
        let key = entry.destination_key.clone();
        let path = entry.source_path_string();

        let mut started_event = EntryEvent::started(self.job_id, &entry, started_at);
        started_event.dry_run = self.base.config.dry_run;
        self.base
            .config
            .progress_manager
            .trigger_entry_event(started_event)
            .await;

        if let Some(e) = read_error {
            self.base
                .send_stats(UploadError { key: key.clone() })
                .await;
            error!(
                worker_index = self.worker_index,
                entry_id = entry.id.to_string(),
                key = key,
                error = e.to_string(),
                "failed to read a source file."
            );

            return TransferOutcome::failed(entry, format!("Error uploading file {path}: {e}"), started_at);
        }

        let Some(upload_manager) = self.upload_manager.as_mut() else {
            self.base
                .send_stats(UploadComplete { key: key.clone() })
                .await;
            info!(
                worker_index = self.worker_index,
                key = key,
                path = path,
                "[dry-run] upload completed."
            );

            return TransferOutcome::completed(
                entry,
                0,
                format!("Uploaded {path} (dry-run)"),
                started_at,
            );
        };

        let semaphore = self
            .base
            .config
            .target_client_config
            .parallel_upload_semaphore
            .clone();
        let _permit = tokio::select! {
            permit = semaphore.acquire_owned() => {
                match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        return TransferOutcome::failed(
                            entry,
                            format!("Error uploading file {path}: {e}"),
                            started_at,
                        );
                    }
                }
            },
            _ = self.base.cancellation_token.cancelled() => {
                info!(worker_index = self.worker_index, key = key, "upload has been cancelled.");
                return TransferOutcome::cancelled(entry);
            }
        };

        let content_length = payload.len() as u64;
        let content_type = if self.base.config.no_guess_mime_type {
            None
        } else {
            Some(
                mime_guess::from_path(&entry.source_path)
                    .first_or_octet_stream()
                    .to_string(),
            )
        };

        match upload_manager.upload(&key, payload, content_type).await {
            Ok(e_tag) => {
                self.base
                    .send_stats(UploadComplete { key: key.clone() })
                    .await;
                debug!(
                    worker_index = self.worker_index,
                    key = key,
                    size = content_length,
                    e_tag = e_tag,
                    "upload completed."
                );

                TransferOutcome::completed(
                    entry,
                    content_length,
                    format!("Uploaded {path}"),
                    started_at,
                )
            }
            Err(e) if is_cancelled_error(&e) => {
                info!(worker_index = self.worker_index, key = key, "upload has been cancelled.");
                TransferOutcome::cancelled(entry)
            }
            Err(e) => {
                if matches!(
                    e.downcast_ref::<UploadAgentError>(),
                    Some(UploadAgentError::ETagMismatch { .. })
                ) {
                    self.base.set_warning();
                }

                self.base
                    .send_stats(UploadError { key: key.clone() })
                    .await;
                error!(
                    worker_index = self.worker_index,
                    key = key,
                    error = e.to_string(),
                    source = e.source(),
                    "upload failed."
                );

                TransferOutcome::failed(entry, format!("Error uploading file {path}: {e:#}"), started_at)
            }
        }
    }
}
