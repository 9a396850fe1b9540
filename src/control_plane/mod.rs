//! Client side of the upload control-plane service.
//!
//! The service owns jobs and manifests. The agent fetches a job, resolves the
//! manifest entries to upload, and reports per-entry logs and job status back.

pub use client::ControlPlaneClient;
pub use entry_source::ControlPlaneEntrySource;
pub use progress_sink::ControlPlaneProgressSink;

pub mod client;
pub mod entry_source;
pub mod progress_sink;
pub mod types;

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control plane error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
