use crate::Config;
use crate::callback::progress_manager::ProgressManager;
use crate::config::args::value_parser::{file_exist, human_bytes, storage_path, url};
use crate::config::{
    CLITimeoutConfig, ClientConfig, EntrySourceConfig, RetryConfig, TracingConfig,
    TransferConfig, default_queue_capacity,
};
use crate::types::{ClientConfigLocation, S3Credentials};
use aws_smithy_types::checksum_config::RequestChecksumCalculation;
use clap::Parser;
use clap::builder::{ArgPredicate, NonEmptyStringValueParser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
#[cfg(feature = "version")]
use shadow_rs::shadow;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

mod tests;
mod value_parser;

const DEFAULT_IO_CONCURRENCY: u16 = crate::config::DEFAULT_IO_CONCURRENCY;
const DEFAULT_NETWORK_CONCURRENCY: u16 = crate::config::DEFAULT_NETWORK_CONCURRENCY;
const DEFAULT_AWS_MAX_ATTEMPTS: u32 = crate::config::DEFAULT_AWS_MAX_ATTEMPTS;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 =
    crate::config::DEFAULT_INITIAL_BACKOFF_MILLISECONDS;
const DEFAULT_PROGRESS_TIMEOUT_MILLISECONDS: u64 =
    crate::config::DEFAULT_PROGRESS_TIMEOUT_MILLISECONDS;
const DEFAULT_CONTROL_PLANE_TIMEOUT_MILLISECONDS: u64 =
    crate::config::DEFAULT_CONTROL_PLANE_TIMEOUT_MILLISECONDS;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_MULTIPART_THRESHOLD: &str = "50MiB";
const DEFAULT_MULTIPART_CHUNKSIZE: &str = "8MiB";
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_NO_GUESS_MIME_TYPE: bool = false;
const DEFAULT_DISABLE_ETAG_VERIFY: bool = false;
const DEFAULT_DISABLE_CONTENT_MD5_HEADER: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_ANONYMOUS: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;

const NO_ENTRY_SOURCE_SPECIFIED: &str = "either --job-id or --manifest-file must be specified\n";
const NO_SERVICE_URL_SPECIFIED: &str = "with --job-id, --service-url must be specified\n";
const QUEUE_CAPACITY_TOO_SMALL: &str =
    "--queue-capacity must be greater than or equal to --io-concurrency and --network-concurrency\n";
const MAX_POOL_CONNECTIONS_TOO_SMALL: &str =
    "--max-pool-connections must be greater than or equal to --network-concurrency\n";
const MULTIPART_CHUNKSIZE_TOO_LARGE: &str =
    "--multipart-chunksize must be less than or equal to --multipart-threshold\n";

#[cfg(feature = "version")]
shadow!(build);

#[derive(Parser, Clone, Debug)]
#[cfg_attr(feature = "version", command(version=format!("{} ({} {}), {}", build::PKG_VERSION, build::SHORT_COMMIT, build::BUILD_TARGET, build::RUST_VERSION)))]
pub struct CLIArgs {
    #[arg(env, help = "s3://<BUCKET_NAME>[/prefix]", value_parser = storage_path::check_storage_path, default_value_if("auto_complete_shell", ArgPredicate::IsPresent, "s3://ignored"), required = false)]
    target: String,

    /// upload job identifier registered in the control-plane service
    #[arg(long, env, conflicts_with_all = ["manifest_file"], help_heading = "Entry Source")]
    job_id: Option<Uuid>,

    /// base URL of the control-plane service
    #[arg(long, env = "SPHEREX_UPLOAD_SERVICE_URL", value_parser = url::check_scheme, help_heading = "Entry Source")]
    service_url: Option<String>,

    /// local JSON manifest to upload instead of a control-plane job
    #[arg(long, env, value_name = "FILE", value_parser = file_exist::is_file_exist, help_heading = "Entry Source")]
    manifest_file: Option<String>,

    /// upload only the first N entries of the manifest
    #[arg(long, env, value_parser = clap::value_parser!(u64).range(1..), help_heading = "Entry Source")]
    count: Option<u64>,

    /// timeout (milliseconds) of each control-plane request
    #[arg(long, env, default_value_t = DEFAULT_CONTROL_PLANE_TIMEOUT_MILLISECONDS, help_heading = "Entry Source")]
    control_plane_timeout_milliseconds: u64,

    /// A simulation mode. no disk reads or uploads will be performed
    #[arg(long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    dry_run: bool,

    /// send unsigned requests to the target bucket
    #[arg(long, env = "AWS_UNSIGNED", conflicts_with_all = ["profile"], default_value_t = DEFAULT_ANONYMOUS, help_heading = "General")]
    anonymous: bool,

    /// do not show the progress indicator
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    show_no_progress: bool,

    /// location of the file that the AWS CLI uses to store configuration profiles
    #[arg(long, env, value_name = "FILE", help_heading = "AWS Configuration")]
    aws_config_file: Option<PathBuf>,

    /// location of the file that the AWS CLI uses to store access keys
    #[arg(long, env, value_name = "FILE", help_heading = "AWS Configuration")]
    aws_shared_credentials_file: Option<PathBuf>,

    /// AWS CLI profile
    #[arg(long, env, help_heading = "AWS Configuration")]
    profile: Option<String>,

    /// target region
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Target Options")]
    region: Option<String>,

    /// target endpoint url
    #[arg(long, env, value_parser = url::check_scheme, help_heading = "Target Options")]
    endpoint_url: Option<String>,

    /// force path-style addressing for target endpoint
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "Target Options")]
    force_path_style: bool,

    /// disable etag verification
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_ETAG_VERIFY, help_heading = "Verification")]
    disable_etag_verify: bool,

    /// number of concurrent file reads
    #[arg(long, env, default_value_t = DEFAULT_IO_CONCURRENCY, value_parser = clap::value_parser!(u16).range(1..), help_heading = "Performance")]
    io_concurrency: u16,

    /// number of concurrent uploads
    #[arg(long, env, default_value_t = DEFAULT_NETWORK_CONCURRENCY, value_parser = clap::value_parser!(u16).range(1..), help_heading = "Performance")]
    network_concurrency: u16,

    /// number of read files buffered in memory before upload.
    /// The default is twice the larger of --io-concurrency and --network-concurrency.
    #[arg(long, env, value_parser = clap::value_parser!(u64).range(1..), help_heading = "Performance")]
    queue_capacity: Option<u64>,

    /// maximum number of connections to the target. The default is --network-concurrency.
    #[arg(long, env, value_parser = clap::value_parser!(u16).range(1..), help_heading = "Performance")]
    max_pool_connections: Option<u16>,

    /// object size threshold that s3-upload-agent uses for multipart upload, Allow suffixes: MB, MiB, GB, GiB.
    /// the larger the size, the larger the memory usage.
    #[arg(long, env, default_value = DEFAULT_MULTIPART_THRESHOLD, value_parser = human_bytes::check_human_bytes, help_heading = "Multipart Settings")]
    multipart_threshold: String,

    /// chunk size that s3-upload-agent uses for multipart upload of individual files, Allow suffixes: MB, MiB, GB, GiB.
    #[arg(long, env, default_value = DEFAULT_MULTIPART_CHUNKSIZE, value_parser = human_bytes::check_human_bytes, help_heading = "Multipart Settings")]
    multipart_chunksize: String,

    /// trace verbosity(-v: show info, -vv: show debug, -vvv show trace)
    #[clap(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// show trace as json format
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Tracing/Logging")]
    json_tracing: bool,

    /// enable aws sdk tracing
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Tracing/Logging")]
    aws_sdk_tracing: bool,

    /// show span event tracing
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Tracing/Logging")]
    span_events_tracing: bool,

    /// disable ANSI terminal colors
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Tracing/Logging")]
    disable_color_tracing: bool,

    /// maximum retry attempts of the AWS SDK retry handler
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, value_name = "max_attempts", help_heading = "Retry Options")]
    aws_max_attempts: u32,

    /// a multiplier value used when calculating backoff times as part of an exponential backoff with jitter strategy.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, value_name = "initial_backoff", help_heading = "Retry Options")]
    initial_backoff_milliseconds: u64,

    /// operation timeout (milliseconds). For details, see the AWS SDK for Rust TimeoutConfig documentation.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "operation_timeout",
        help_heading = "Timeout Options"
    )]
    operation_timeout_milliseconds: Option<u64>,

    /// operation attempt timeout (milliseconds). For details, see the AWS SDK for Rust TimeoutConfig documentation.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "operation_attempt_timeout",
        help_heading = "Timeout Options"
    )]
    operation_attempt_timeout_milliseconds: Option<u64>,

    /// connect timeout (milliseconds).
    /// The default has AWS SDK default timeout (Currently 3100 milliseconds).
    #[arg(
        long,
        env,
        value_name = "connect_timeout",
        help_heading = "Timeout Options"
    )]
    connect_timeout_milliseconds: Option<u64>,

    /// read timeout (milliseconds).
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "read_timeout",
        help_heading = "Timeout Options"
    )]
    read_timeout_milliseconds: Option<u64>,

    /// timeout (milliseconds) of each progress event delivery
    #[arg(long, env, default_value_t = DEFAULT_PROGRESS_TIMEOUT_MILLISECONDS, help_heading = "Timeout Options")]
    progress_timeout_milliseconds: u64,

    /// do not try to guess the mime type of local file
    #[arg(long, env, default_value_t = DEFAULT_NO_GUESS_MIME_TYPE, help_heading = "Advanced")]
    no_guess_mime_type: bool,

    /// generate a auto completions script. Valid values: bash, fish, zsh, powershell, elvish.
    #[arg(long, env, value_name = "SHELL", value_parser = clap_complete::shells::Shell::from_str, help_heading = "Advanced")]
    auto_complete_shell: Option<clap_complete::shells::Shell>,

    /// disable stalled stream protection
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "Advanced")]
    disable_stalled_stream_protection: bool,

    /// disable Content-MD5 header for object uploads.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_CONTENT_MD5_HEADER, help_heading = "Advanced")]
    disable_content_md5_header: bool,
}

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    crate::Config::try_from(config_args)
}

impl CLIArgs {
    fn validate_config(&self) -> Result<(), String> {
        self.check_entry_source()?;
        self.check_queue_capacity()?;
        self.check_max_pool_connections()?;
        self.check_multipart_chunksize()?;

        Ok(())
    }

    fn check_entry_source(&self) -> Result<(), String> {
        if self.auto_complete_shell.is_some() {
            return Ok(());
        }

        if self.job_id.is_none() && self.manifest_file.is_none() {
            return Err(NO_ENTRY_SOURCE_SPECIFIED.to_string());
        }

        if self.job_id.is_some() && self.service_url.is_none() {
            return Err(NO_SERVICE_URL_SPECIFIED.to_string());
        }

        Ok(())
    }

    fn check_queue_capacity(&self) -> Result<(), String> {
        let Some(queue_capacity) = self.queue_capacity else {
            return Ok(());
        };

        let required = self.io_concurrency.max(self.network_concurrency) as u64;
        if queue_capacity < required {
            return Err(QUEUE_CAPACITY_TOO_SMALL.to_string());
        }

        Ok(())
    }

    fn check_max_pool_connections(&self) -> Result<(), String> {
        if let Some(max_pool_connections) = self.max_pool_connections {
            if max_pool_connections < self.network_concurrency {
                return Err(MAX_POOL_CONNECTIONS_TOO_SMALL.to_string());
            }
        }

        Ok(())
    }

    fn check_multipart_chunksize(&self) -> Result<(), String> {
        let threshold = human_bytes::parse_human_bytes(&self.multipart_threshold)?;
        let chunksize = human_bytes::parse_human_bytes(&self.multipart_chunksize)?;

        if threshold < chunksize {
            return Err(MULTIPART_CHUNKSIZE_TOO_LARGE.to_string());
        }

        Ok(())
    }

    fn build_entry_source_config(&self) -> Result<Option<EntrySourceConfig>, String> {
        if let Some(job_id) = self.job_id {
            let service_url = self
                .service_url
                .clone()
                .ok_or_else(|| NO_SERVICE_URL_SPECIFIED.to_string())?;

            return Ok(Some(EntrySourceConfig::ControlPlane {
                service_url,
                job_id,
                timeout_milliseconds: self.control_plane_timeout_milliseconds,
            }));
        }

        Ok(self
            .manifest_file
            .as_ref()
            .map(|manifest_file| EntrySourceConfig::ManifestFile(PathBuf::from(manifest_file))))
    }

    fn build_client_config(&self) -> ClientConfig {
        let credential = if self.anonymous {
            S3Credentials::Anonymous
        } else if let Some(profile) = self.profile.clone() {
            S3Credentials::Profile(profile)
        } else {
            S3Credentials::FromEnvironment
        };

        let max_pool_connections = self
            .max_pool_connections
            .unwrap_or(self.network_concurrency);

        ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
            request_checksum_calculation: RequestChecksumCalculation::WhenRequired,
            parallel_upload_semaphore: Arc::new(Semaphore::new(max_pool_connections as usize)),
        }
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let mut tracing_config = self.verbosity.log_level().map(|log_level| TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        });

        if !self.dry_run {
            return tracing_config;
        }

        if let Some(config) = tracing_config.as_mut() {
            if config.tracing_level < log::Level::Info {
                config.tracing_level = log::Level::Info;
            }
        } else {
            tracing_config = Some(TracingConfig {
                tracing_level: log::Level::Info,
                json_tracing: DEFAULT_JSON_TRACING,
                aws_sdk_tracing: DEFAULT_AWS_SDK_TRACING,
                span_events_tracing: DEFAULT_SPAN_EVENTS_TRACING,
                disable_color_tracing: DEFAULT_DISABLE_COLOR_TRACING,
            });
        }

        tracing_config
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(value: CLIArgs) -> Result<Self, Self::Error> {
        value.validate_config()?;

        let queue_capacity = value.queue_capacity.map_or_else(
            || default_queue_capacity(value.io_concurrency, value.network_concurrency),
            |queue_capacity| queue_capacity as usize,
        );

        let mut progress_manager = ProgressManager::new();
        progress_manager.set_delivery_timeout(std::time::Duration::from_millis(
            value.progress_timeout_milliseconds,
        ));

        Ok(Config {
            target: storage_path::parse_storage_path(&value.target)?,
            entry_source: value.build_entry_source_config()?,
            target_client_config: value.build_client_config(),
            tracing_config: value.build_tracing_config(),

            transfer_config: TransferConfig {
                multipart_threshold: human_bytes::parse_human_bytes(&value.multipart_threshold)?,
                multipart_chunksize: human_bytes::parse_human_bytes(&value.multipart_chunksize)?,
            },

            io_concurrency: value.io_concurrency,
            network_concurrency: value.network_concurrency,
            queue_capacity,
            count: value.count,

            dry_run: value.dry_run,
            anonymous: value.anonymous,
            no_guess_mime_type: value.no_guess_mime_type,
            disable_content_md5_header: value.disable_content_md5_header,
            disable_etag_verify: value.disable_etag_verify,
            progress_timeout_milliseconds: value.progress_timeout_milliseconds,
            show_no_progress: value.show_no_progress,
            auto_complete_shell: value.auto_complete_shell,
            progress_manager,
        })
    }
}
