use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::control_plane::types::Manifest;
use crate::source::{EntrySource, entries_from_manifest, truncate_entries};
use crate::types::UploadEntry;

/// Reads entries from a manifest JSON file, for runs without a control plane.
pub struct ManifestFileEntrySource {
    path: PathBuf,
}

impl ManifestFileEntrySource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn load_manifest(&self) -> Result<Manifest> {
        let content = tokio::fs::read(&self.path)
            .await
            .context(format!("failed to read manifest file: {}", self.path.display()))?;

        serde_json::from_slice(&content)
            .context(format!("failed to parse manifest file: {}", self.path.display()))
    }
}

#[async_trait]
impl EntrySource for ManifestFileEntrySource {
    async fn entries(&self, count: Option<u64>) -> Result<Vec<UploadEntry>> {
        let manifest = self.load_manifest().await?;
        let entries = truncate_entries(entries_from_manifest(&manifest), count);

        debug!(
            manifest_file = self.path.display().to_string(),
            entries = entries.len(),
            "manifest file has been loaded."
        );

        Ok(entries)
    }
}
