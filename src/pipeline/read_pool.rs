use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Component, Path};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::types::error::UploadAgentError;
use crate::types::{ReadResult, UploadEntry};

/// Blocking file reads, bounded by the I/O concurrency.
///
/// Reads run on `spawn_blocking` threads. Callers hold a permit from `acquire()` for as
/// long as the result is theirs, so at most `io_concurrency` files are being read or
/// waiting for the transfer queue at any time. Lives for one pipeline run.
#[derive(Debug, Clone)]
pub struct ReadPool {
    semaphore: Arc<Semaphore>,
    dry_run: bool,
}

impl ReadPool {
    pub fn new(io_concurrency: u16, dry_run: bool) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(io_concurrency as usize)),
            dry_run,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .context("read pool has been closed.")
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Never fails. Any problem is carried in `ReadResult::read_error`.
    pub async fn read(&self, entry: UploadEntry) -> ReadResult {
        let started_at = Utc::now();

        if self.dry_run {
            return ReadResult::success(entry, vec![], started_at);
        }

        if has_parent_dir_component(&entry.destination_key) {
            warn!(
                entry_id = entry.id.to_string(),
                key = entry.destination_key.as_str(),
                "an entry references a parent directory."
            );
            let error = UploadAgentError::DirectoryTraversalError(entry.destination_key.clone());
            return ReadResult::failure(entry, error, started_at);
        }

        let path = entry.source_path.clone();
        let result = tokio::task::spawn_blocking(move || read_file(&path)).await;

        match result {
            Ok(Ok(payload)) => {
                debug!(
                    entry_id = entry.id.to_string(),
                    path = entry.source_path_string(),
                    size = payload.len(),
                    "file has been read."
                );
                ReadResult::success(entry, payload, started_at)
            }
            Ok(Err(e)) => ReadResult::failure(entry, e, started_at),
            Err(e) => {
                let error = UploadAgentError::ReadFailed {
                    path: entry.source_path_string(),
                    message: e.to_string(),
                };
                ReadResult::failure(entry, error, started_at)
            }
        }
    }
}

fn has_parent_dir_component(key: &str) -> bool {
    Path::new(key)
        .components()
        .any(|component| component == Component::ParentDir)
}

fn read_file(path: &Path) -> Result<Vec<u8>, UploadAgentError> {
    let path_string = path.to_string_lossy().to_string();

    let mut file = File::open(path).map_err(|e| classify_io_error(&path_string, e))?;
    let metadata = file
        .metadata()
        .map_err(|e| classify_io_error(&path_string, e))?;
    if !metadata.is_file() {
        return Err(UploadAgentError::NotRegularFile(path_string));
    }

    let expected = metadata.len();
    let mut payload = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut payload)
        .map_err(|e| classify_io_error(&path_string, e))?;

    let actual = payload.len() as u64;
    if actual < expected {
        return Err(UploadAgentError::TruncatedRead {
            path: path_string,
            expected,
            actual,
        });
    }

    Ok(payload)
}

fn classify_io_error(path: &str, e: std::io::Error) -> UploadAgentError {
    match e.kind() {
        ErrorKind::NotFound => UploadAgentError::SourceFileNotFound(path.to_string()),
        ErrorKind::PermissionDenied => UploadAgentError::PermissionDenied(path.to_string()),
        _ => UploadAgentError::ReadFailed {
            path: path.to_string(),
            message: e.to_string(),
        },
    }
}
