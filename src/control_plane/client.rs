use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::control_plane::ControlPlaneError;
use crate::control_plane::types::{Job, JobEntryLogRequest, JobUpdate, Manifest};

/// Async HTTP client of the control-plane service.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControlPlaneClient {
    pub fn new(service_url: &str, timeout: Duration) -> Result<Self, ControlPlaneError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: service_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, ControlPlaneError> {
        let body = self.get(&format!("/jobs/{job_id}"), &[]).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// With `minimal`, the service omits the entry list.
    pub async fn get_manifest(
        &self,
        manifest_id: Uuid,
        minimal: bool,
    ) -> Result<Manifest, ControlPlaneError> {
        let body = self
            .get(
                &format!("/manifests/{manifest_id}"),
                &[("minimal", minimal.to_string())],
            )
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `updated_at` is always overwritten with the current time.
    pub async fn update_job(
        &self,
        job_id: Uuid,
        mut update: JobUpdate,
    ) -> Result<Job, ControlPlaneError> {
        update.updated_at = Some(Utc::now());

        let url = format!("{}/jobs/{job_id}", self.base_url);
        debug!(url = url, status = ?update.status, "update job.");

        let resp = self.http.put(&url).json(&update).send().await?;
        let body = Self::check_response(resp).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post_entry_log(&self, request: &JobEntryLogRequest) -> Result<(), ControlPlaneError> {
        let url = format!("{}/jobs/{}/entry-logs", self.base_url, request.job_id);
        debug!(
            url = url,
            entry_id = request.entry_id.to_string(),
            status = ?request.status,
            "post entry log."
        );

        let resp = self.http.post(&url).json(request).send().await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<u8>, ControlPlaneError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = url, "get.");

        let resp = self.http.get(&url).query(params).send().await?;
        Self::check_response(resp).await
    }

    async fn check_response(resp: reqwest::Response) -> Result<Vec<u8>, ControlPlaneError> {
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
