/*!
# Overview
s3-upload-agent uploads the files listed in an upload manifest to an S3 bucket.

The manifest comes either from a control-plane service (a job id is resolved to its
manifest over HTTP) or from a local JSON file. Every entry is read from the local disk
and put to `s3://<bucket>/<prefix>/<destination key>`, using multipart upload for large
files. Progress of every entry and of the job as a whole is reported to the registered
progress sinks; with a control-plane job, the job record and its per-entry log are kept
up to date.

## Features
- Bounded memory
  File reads and network uploads run in two separately sized pools connected by a bounded
  queue. A slow network stalls the readers instead of buffering the whole manifest.

- Reliable
  Each uploaded object's ETag is compared with the MD5 (or multipart ETag) computed
  from the bytes that were read. Failed multipart uploads are aborted so that no
  incomplete sessions are left in the bucket.

- Per-entry outcomes
  A failure in one entry never stops the others. Every entry gets exactly one outcome,
  also when the job is cancelled.

## As a library
The `s3-upload-agent` CLI is a thin wrapper around this library.

Example usage
=============

```Toml
[dependencies]
s3-upload-agent = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3_upload_agent::callback::debug_progress_sink::DebugProgressSink;
use s3_upload_agent::config::Config;
use s3_upload_agent::config::args::parse_from_args;
use s3_upload_agent::pipeline::Pipeline;
use s3_upload_agent::source::{EntrySource, ManifestFileEntrySource};
use s3_upload_agent::storage::s3::S3StorageFactory;
use s3_upload_agent::types::progress_sink::ProgressEventType;
use s3_upload_agent::types::token::create_pipeline_cancellation_token;

#[tokio::main]
async fn main() {
    // You can use all the arguments for the s3-upload-agent CLI.
    let args = vec![
        "program_name",
        "--manifest-file",
        "./manifest.json",
        "s3://test-bucket/uploads/",
    ];

    let mut config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

    // Progress sinks receive the events selected by the flags.
    config
        .progress_manager
        .register_sink(ProgressEventType::ALL_EVENTS, DebugProgressSink);

    let entries = ManifestFileEntrySource::new("./manifest.json".into())
        .entries(config.count)
        .await
        .unwrap();

    let target = S3StorageFactory::create(&config).await;

    // You can use this token to cancel the pipeline.
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = Pipeline::new(config, entries, Some(target), cancellation_token);

    pipeline.run().await;

    let job_result = pipeline.get_job_result().unwrap();
    println!(
        "{}: {} uploaded, {} failed",
        job_result.status, job_result.completed, job_result.failed
    );

    for outcome in job_result.failed_outcomes() {
        println!("{}", outcome.message);
    }

    if pipeline.has_error() {
        println!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
}
```
*/

pub use config::Config;
pub use config::args::CLIArgs;

pub mod callback;
pub mod config;
pub mod control_plane;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod types;
