use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::time::Instant;
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use s3_upload_agent::Config;
use s3_upload_agent::callback::tracing_progress_sink::{
    TracingProgressSink, format_progress_message,
};
use s3_upload_agent::config::EntrySourceConfig;
use s3_upload_agent::control_plane::{
    ControlPlaneClient, ControlPlaneEntrySource, ControlPlaneProgressSink,
};
use s3_upload_agent::pipeline::Pipeline;
use s3_upload_agent::source::{EntrySource, ManifestFileEntrySource};
use s3_upload_agent::storage::s3::S3StorageFactory;
use s3_upload_agent::types::progress_sink::ProgressEventType;
use s3_upload_agent::types::token::create_pipeline_cancellation_token;
use s3_upload_agent::types::{JobResult, ProgressSnapshot, UploadEntry};

mod ctrl_c_handler;
mod indicator;
mod ui_config;

#[allow(dead_code)]
const EXIT_CODE_SUCCESS: i32 = 0;
#[allow(dead_code)]
const EXIT_CODE_ERROR: i32 = 1;
#[allow(dead_code)]
const EXIT_CODE_INVALID_ARGS: i32 = 2;
const EXIT_CODE_WARNING: i32 = 3;

pub async fn run(config: Config) -> Result<()> {
    let has_warning = run_upload_job(config).await?;

    if has_warning {
        std::process::exit(EXIT_CODE_WARNING);
    }

    Ok(())
}

/// Returns whether any entry failed or any warning was raised.
async fn run_upload_job(mut config: Config) -> Result<bool> {
    let cancellation_token = create_pipeline_cancellation_token();

    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = Instant::now();

    let (entries, job_id) = resolve_entries(&mut config).await?;
    config
        .progress_manager
        .register_sink(ProgressEventType::ALL_EVENTS, TracingProgressSink::new());

    let target = if config.dry_run {
        None
    } else {
        Some(S3StorageFactory::create(&config).await)
    };

    trace!(entries = entries.len(), "upload pipeline start.");

    let mut pipeline = Pipeline::new(config.clone(), entries, target, cancellation_token);
    if let Some(job_id) = job_id {
        pipeline.set_job_id(job_id);
    }

    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
        config.dry_run,
    );

    pipeline.run().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    if pipeline.has_error() {
        if let Some(errors) = pipeline.get_errors_and_consume() {
            for e in errors {
                error!(error = format!("{e:#}"), "upload job error.");
            }
        }
        error!(duration_sec = duration_sec, "s3-upload-agent failed.");

        return Err(anyhow!("s3-upload-agent failed."));
    }

    let job_result = pipeline
        .get_job_result()
        .ok_or_else(|| anyhow!("upload job has no result."))?;
    show_job_summary(&job_result);

    trace!(duration_sec = duration_sec, "s3-upload-agent has been completed.");

    Ok(pipeline.has_warning() || job_result.has_failure())
}

async fn resolve_entries(config: &mut Config) -> Result<(Vec<UploadEntry>, Option<Uuid>)> {
    match config.entry_source.clone() {
        Some(EntrySourceConfig::ControlPlane {
            service_url,
            job_id,
            timeout_milliseconds,
        }) => {
            let client =
                ControlPlaneClient::new(&service_url, Duration::from_millis(timeout_milliseconds))
                    .context("failed to create the control-plane client.")?;
            let job = client
                .get_job(job_id)
                .await
                .with_context(|| format!("failed to get job {job_id}."))?;

            config.apply_job_flags(job.mock, job.is_aws_unsigned());
            config.progress_manager.register_sink(
                ProgressEventType::ALL_EVENTS,
                ControlPlaneProgressSink::new(client.clone(), job_id),
            );

            let entry_limit = config.entry_limit(job.count);
            let entries = ControlPlaneEntrySource::new(client, job)
                .entries(entry_limit)
                .await?;

            Ok((entries, Some(job_id)))
        }
        Some(EntrySourceConfig::ManifestFile(manifest_file)) => {
            let entries = ManifestFileEntrySource::new(manifest_file)
                .entries(config.count)
                .await?;

            Ok((entries, None))
        }
        None => Err(anyhow!("no entry source has been specified.")),
    }
}

fn show_job_summary(job_result: &JobResult) {
    let snapshot = ProgressSnapshot {
        entries_total: job_result.entries_total,
        entries_completed: job_result.completed,
        entries_failed: job_result.failed,
        bytes_completed: job_result.bytes_completed,
        elapsed: job_result.elapsed,
    };
    let message = format_progress_message(&format!("Job {}", job_result.status), &snapshot);

    if job_result.has_failure() {
        for outcome in job_result.failed_outcomes() {
            warn!(
                entry_id = outcome.entry.id.to_string(),
                key = outcome.entry.destination_key,
                "{}",
                outcome.message
            );
        }
        warn!(failed = job_result.failed, "{message}");
    } else {
        info!("{message}");
    }
}
