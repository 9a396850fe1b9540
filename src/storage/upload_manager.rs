use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use base64::{Engine as _, engine::general_purpose};
use tracing::{trace, warn};

use crate::config::Config;
use crate::storage::e_tag_verify::{generate_e_tag_hash, verify_e_tag};
use crate::storage::{Storage, UploadedPart};
use crate::types::UploadStatistics;
use crate::types::UploadStatistics::{ETagVerified, UploadBytes, UploadWarning};
use crate::types::error::UploadAgentError;
use crate::types::token::PipelineCancellationToken;

/// Writes one in-memory payload to the target, as a single put or as a multipart upload.
pub struct UploadManager {
    target: Storage,
    config: Config,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<UploadStatistics>,
    concatenated_md5_hash: Vec<u8>,
}

impl UploadManager {
    pub fn new(
        target: Storage,
        config: Config,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<UploadStatistics>,
    ) -> Self {
        UploadManager {
            target,
            config,
            cancellation_token,
            stats_sender,
            concatenated_md5_hash: vec![],
        }
    }

    /// Returns the e_tag reported by the target.
    pub async fn upload(
        &mut self,
        key: &str,
        payload: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<Option<String>> {
        self.concatenated_md5_hash.clear();

        let (target_e_tag, parts_count) = if self
            .config
            .transfer_config
            .is_multipart_upload_required(payload.len() as u64)
        {
            self.multipart_upload(key, &payload, content_type).await?
        } else {
            (self.singlepart_upload(key, payload, content_type).await?, 0)
        };

        trace!(key = key, target_e_tag = target_e_tag, "upload completed.");

        if !self.config.disable_etag_verify {
            self.verify_e_tag(key, parts_count, &target_e_tag).await?;
        }

        Ok(target_e_tag)
    }

    async fn singlepart_upload(
        &mut self,
        key: &str,
        payload: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<Option<String>> {
        let content_length = payload.len() as u64;
        let content_md5 = self.calculate_content_md5(&payload);

        let e_tag = self
            .target
            .put_object(key, payload, content_md5, content_type)
            .await
            .context("put_object() failed.")?;

        self.send_stats(UploadBytes(content_length)).await;

        Ok(e_tag)
    }

    async fn multipart_upload(
        &mut self,
        key: &str,
        payload: &[u8],
        content_type: Option<String>,
    ) -> Result<(Option<String>, usize)> {
        let upload_id = self
            .target
            .create_multipart_upload(key, content_type)
            .await
            .context("create_multipart_upload() failed.")?;

        let upload_result = self
            .upload_parts_and_complete(key, &upload_id, payload)
            .await;

        if upload_result.is_err() {
            // The original error is what the caller needs to see.
            if let Err(e) = self
                .target
                .abort_multipart_upload(key, &upload_id)
                .await
                .context("abort_multipart_upload() failed.")
            {
                warn!(
                    key = key,
                    upload_id = upload_id,
                    error = format!("{e:#}"),
                    "failed to abort the multipart upload."
                );
            } else {
                trace!(key = key, upload_id = upload_id, "multipart upload aborted.");
            }
        }

        upload_result
    }

    async fn upload_parts_and_complete(
        &mut self,
        key: &str,
        upload_id: &str,
        payload: &[u8],
    ) -> Result<(Option<String>, usize)> {
        let upload_parts = self.upload_parts(key, upload_id, payload).await?;
        let parts_count = upload_parts.len();

        if self.cancellation_token.is_cancelled() {
            return Err(anyhow!(UploadAgentError::Cancelled));
        }

        let e_tag = self
            .target
            .complete_multipart_upload(key, upload_id, upload_parts)
            .await
            .context("complete_multipart_upload() failed.")?;

        Ok((e_tag, parts_count))
    }

    async fn upload_parts(
        &mut self,
        key: &str,
        upload_id: &str,
        payload: &[u8],
    ) -> Result<Vec<UploadedPart>> {
        let mut upload_parts: Vec<UploadedPart> = Vec::new();

        let chunksize = self.config.transfer_config.multipart_chunksize as usize;
        for (index, chunk) in payload.chunks(chunksize).enumerate() {
            if self.cancellation_token.is_cancelled() {
                return Err(anyhow!(UploadAgentError::Cancelled));
            }

            let part_number = (index + 1) as i32;
            let content_md5 = self.calculate_content_md5(chunk);

            let e_tag = self
                .target
                .upload_part(key, upload_id, part_number, chunk.to_vec(), content_md5)
                .await
                .context("upload_part() failed.")?;

            trace!(
                key = key,
                upload_id = upload_id,
                part_number = part_number,
                size = chunk.len(),
                "part uploaded."
            );

            self.send_stats(UploadBytes(chunk.len() as u64)).await;

            upload_parts.push(UploadedPart { part_number, e_tag });
        }

        trace!(key = key, upload_id = upload_id, "{upload_parts:?}");

        Ok(upload_parts)
    }

    fn calculate_content_md5(&mut self, body: &[u8]) -> Option<String> {
        let md5_digest = md5::compute(body);
        self.concatenated_md5_hash
            .extend_from_slice(md5_digest.as_slice());

        if self.config.disable_content_md5_header {
            return None;
        }

        Some(general_purpose::STANDARD.encode(md5_digest.as_slice()))
    }

    async fn verify_e_tag(
        &self,
        key: &str,
        parts_count: usize,
        target_e_tag: &Option<String>,
    ) -> Result<()> {
        let local_e_tag = Some(generate_e_tag_hash(
            &self.concatenated_md5_hash,
            parts_count,
        ));

        match verify_e_tag(&local_e_tag, target_e_tag) {
            Some(true) => {
                self.send_stats(ETagVerified {
                    key: key.to_string(),
                })
                .await;

                trace!(
                    key = key,
                    local_e_tag = local_e_tag,
                    target_e_tag = target_e_tag,
                    "e_tag verified."
                );
            }
            Some(false) => {
                self.send_stats(UploadWarning {
                    key: key.to_string(),
                })
                .await;

                warn!(
                    key = key,
                    local_e_tag = local_e_tag,
                    target_e_tag = target_e_tag,
                    "e_tag mismatch. object in the target storage may be corrupted."
                );

                return Err(anyhow!(UploadAgentError::ETagMismatch {
                    key: key.to_string()
                }));
            }
            None => {
                trace!(key = key, "target did not return e_tag. skip e_tag verification.");
            }
        }

        Ok(())
    }

    async fn send_stats(&self, stats: UploadStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}
