use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub ops_key: String,
    pub bucket_key: String,
}

/// A set of files registered for upload under a common root directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub id: Option<Uuid>,
    pub load_id: Option<String>,
    pub manifest_file: Option<String>,
    pub ops_root_dir: String,
    pub s3_bucket_name: Option<String>,
    pub data_folders: Vec<String>,
    pub total_size: Option<String>,
    pub total_size_bytes: u64,
    pub total_files: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub entries: Option<Vec<ManifestEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub manifest_id: Uuid,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elapsed_time: Option<String>,
    #[serde(default)]
    pub uploaded_files: u64,
    #[serde(default)]
    pub uploaded_size: Option<String>,
    #[serde(default)]
    pub uploaded_size_bytes: u64,
    #[serde(default)]
    pub mock: bool,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub aws_unsigned: Option<bool>,
}

impl Job {
    pub fn is_aws_unsigned(&self) -> bool {
        self.aws_unsigned.unwrap_or(false)
    }
}

/// Partial update of a job. Absent fields are left untouched by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_files: Option<u64>,
    #[serde(default)]
    pub uploaded_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobEntryStatus {
    Started,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntryLogRequest {
    pub job_id: Uuid,
    pub entry_id: Uuid,
    pub status: JobEntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uploaded_size_bytes: u64,
}
