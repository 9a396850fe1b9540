use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::control_plane::ControlPlaneClient;
use crate::control_plane::types::Job;
use crate::source::{EntrySource, entries_from_manifest, truncate_entries};
use crate::types::UploadEntry;

/// Resolves the entries of a job from its manifest on the control plane.
pub struct ControlPlaneEntrySource {
    client: ControlPlaneClient,
    job: Job,
}

impl ControlPlaneEntrySource {
    pub fn new(client: ControlPlaneClient, job: Job) -> Self {
        Self { client, job }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }
}

#[async_trait]
impl EntrySource for ControlPlaneEntrySource {
    async fn entries(&self, count: Option<u64>) -> Result<Vec<UploadEntry>> {
        let manifest = self
            .client
            .get_manifest(self.job.manifest_id, false)
            .await
            .context(format!(
                "failed to get manifest {} of job {}",
                self.job.manifest_id, self.job.id
            ))?;

        let entries = truncate_entries(entries_from_manifest(&manifest), count);

        debug!(
            job_id = self.job.id.to_string(),
            manifest_id = self.job.manifest_id.to_string(),
            total_files = manifest.total_files,
            entries = entries.len(),
            "manifest has been fetched."
        );

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::control_plane::client::tests::{
        init_dummy_tracing_subscriber, job_json, mock_server,
    };

    use super::*;

    const MANIFEST: &str = r#"{
        "id":"1b4e28ba-2fa1-11d2-883f-0016d3cca427",
        "ops_root_dir":"/data/ops",
        "entries":[
            {"ops_key":"a","bucket_key":"load1/a"},
            {"ops_key":"b","bucket_key":"load1/b"},
            {"ops_key":"c","bucket_key":"load1/c"}
        ]
    }"#;

    #[tokio::test]
    async fn entries() {
        init_dummy_tracing_subscriber();

        let (url, request) = mock_server(200, MANIFEST).await;
        let client = ControlPlaneClient::new(&url, Duration::from_secs(5)).unwrap();
        let job: Job = serde_json::from_str(&job_json(None, false)).unwrap();

        let source = ControlPlaneEntrySource::new(client, job);
        let entries = source.entries(Some(2)).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source_path, PathBuf::from("/data/ops/a"));
        assert_eq!(entries[1].destination_key, "load1/b");

        let request = request.await.unwrap();
        assert!(request.contains("minimal=false"));
    }

    #[tokio::test]
    async fn manifest_not_found() {
        init_dummy_tracing_subscriber();

        let (url, _request) = mock_server(404, r#"{"detail":"Manifest not found"}"#).await;
        let client = ControlPlaneClient::new(&url, Duration::from_secs(5)).unwrap();
        let job: Job = serde_json::from_str(&job_json(None, false)).unwrap();

        let source = ControlPlaneEntrySource::new(client, job);
        let error = source.entries(None).await.unwrap_err();

        assert!(error.to_string().contains("failed to get manifest"));
    }
}
