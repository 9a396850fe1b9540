use std::path::PathBuf;
use std::sync::Arc;

use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::callback::progress_manager::ProgressManager;
use crate::types::{ClientConfigLocation, S3Credentials, S3Target};

pub mod args;

pub const DEFAULT_IO_CONCURRENCY: u16 = 16;
pub const DEFAULT_NETWORK_CONCURRENCY: u16 = 100;
pub const DEFAULT_MULTIPART_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MULTIPART_CHUNKSIZE_BYTES: u64 = 8 * 1024 * 1024;
pub const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
pub const DEFAULT_PROGRESS_TIMEOUT_MILLISECONDS: u64 = 10000;
pub const DEFAULT_CONTROL_PLANE_TIMEOUT_MILLISECONDS: u64 = 60000;

#[derive(Debug, Clone)]
pub struct Config {
    pub target: S3Target,
    pub entry_source: Option<EntrySourceConfig>,
    pub target_client_config: ClientConfig,
    pub tracing_config: Option<TracingConfig>,
    pub transfer_config: TransferConfig,
    pub io_concurrency: u16,
    pub network_concurrency: u16,
    pub queue_capacity: usize,
    pub count: Option<u64>,
    pub dry_run: bool,
    pub anonymous: bool,
    pub no_guess_mime_type: bool,
    pub disable_content_md5_header: bool,
    pub disable_etag_verify: bool,
    pub progress_timeout_milliseconds: u64,
    pub show_no_progress: bool,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
    pub progress_manager: ProgressManager,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: S3Target {
                bucket: "".to_string(),
                prefix: "".to_string(),
            },
            entry_source: None,
            target_client_config: ClientConfig {
                client_config_location: ClientConfigLocation {
                    aws_config_file: None,
                    aws_shared_credentials_file: None,
                },
                credential: S3Credentials::FromEnvironment,
                region: None,
                endpoint_url: None,
                force_path_style: false,
                retry_config: RetryConfig {
                    aws_max_attempts: DEFAULT_AWS_MAX_ATTEMPTS,
                    initial_backoff_milliseconds: DEFAULT_INITIAL_BACKOFF_MILLISECONDS,
                },
                cli_timeout_config: CLITimeoutConfig {
                    operation_timeout_milliseconds: None,
                    operation_attempt_timeout_milliseconds: None,
                    connect_timeout_milliseconds: None,
                    read_timeout_milliseconds: None,
                },
                disable_stalled_stream_protection: false,
                request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
                parallel_upload_semaphore: Arc::new(Semaphore::new(
                    DEFAULT_NETWORK_CONCURRENCY as usize,
                )),
            },
            tracing_config: None,
            transfer_config: TransferConfig::default(),
            io_concurrency: DEFAULT_IO_CONCURRENCY,
            network_concurrency: DEFAULT_NETWORK_CONCURRENCY,
            queue_capacity: default_queue_capacity(DEFAULT_IO_CONCURRENCY, DEFAULT_NETWORK_CONCURRENCY),
            count: None,
            dry_run: false,
            anonymous: false,
            no_guess_mime_type: false,
            disable_content_md5_header: false,
            disable_etag_verify: false,
            progress_timeout_milliseconds: DEFAULT_PROGRESS_TIMEOUT_MILLISECONDS,
            show_no_progress: false,
            auto_complete_shell: None,
            progress_manager: ProgressManager::new(),
        }
    }
}

impl Config {
    /// Folds the mode flags a job carries into the run configuration.
    /// A flag already set on the command line is never cleared.
    pub fn apply_job_flags(&mut self, mock: bool, aws_unsigned: bool) {
        if mock {
            self.dry_run = true;
        }

        if aws_unsigned {
            self.anonymous = true;
            self.target_client_config.credential = S3Credentials::Anonymous;
        }
    }

    pub fn entry_limit(&self, job_count: Option<u64>) -> Option<u64> {
        match (self.count, job_count) {
            (Some(count), Some(job_count)) => Some(count.min(job_count)),
            (Some(count), None) => Some(count),
            (None, job_count) => job_count,
        }
    }
}

pub fn default_queue_capacity(io_concurrency: u16, network_concurrency: u16) -> usize {
    io_concurrency.max(network_concurrency) as usize * 2
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntrySourceConfig {
    ControlPlane {
        service_url: String,
        job_id: Uuid,
        timeout_milliseconds: u64,
    },
    ManifestFile(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
    pub request_checksum_calculation: RequestChecksumCalculation,
    /// Ceiling of the connections the uploaders may hold at the same time.
    pub parallel_upload_semaphore: Arc<Semaphore>,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub multipart_threshold: u64,
    pub multipart_chunksize: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD_BYTES,
            multipart_chunksize: DEFAULT_MULTIPART_CHUNKSIZE_BYTES,
        }
    }
}

impl TransferConfig {
    pub fn is_multipart_upload_required(&self, content_length: u64) -> bool {
        self.multipart_threshold <= content_length
    }
}
