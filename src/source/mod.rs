use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::control_plane::types::Manifest;
use crate::types::UploadEntry;

pub use manifest_file::ManifestFileEntrySource;

pub mod manifest_file;

/// Provides the ordered list of entries a job uploads.
#[async_trait]
pub trait EntrySource {
    /// Returns at most `count` entries, in manifest order.
    async fn entries(&self, count: Option<u64>) -> Result<Vec<UploadEntry>>;
}

/// Resolves each manifest entry against `ops_root_dir`.
/// An entry without an id gets a fresh one.
pub fn entries_from_manifest(manifest: &Manifest) -> Vec<UploadEntry> {
    let root = Path::new(&manifest.ops_root_dir);

    manifest
        .entries
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|entry| UploadEntry {
            id: entry.id.unwrap_or_else(Uuid::new_v4),
            source_path: root.join(&entry.ops_key),
            destination_key: entry.bucket_key.clone(),
        })
        .collect()
}

pub fn truncate_entries(mut entries: Vec<UploadEntry>, count: Option<u64>) -> Vec<UploadEntry> {
    if let Some(count) = count {
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        if count < entries.len() {
            debug!(
                entries = entries.len(),
                count = count,
                "entries have been truncated."
            );
            entries.truncate(count);
        }
    }

    entries
}
