use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3_upload_agent::types::UploadStatistics;
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

const MOVING_AVERAGE_PERIOD_SECS: usize = 10;
const REFRESH_INTERVAL: f32 = 1.0;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct UploadTotals {
    uploaded_bytes: u64,
    uploaded_count: u64,
    error_count: u64,
    warning_count: u64,
    e_tag_verified_count: u64,
}

impl UploadTotals {
    /// Returns (bytes, completed entries) added by this statistic.
    fn add(&mut self, upload_stats: UploadStatistics) -> (u64, u64) {
        match upload_stats {
            UploadStatistics::UploadBytes(size) => {
                self.uploaded_bytes += size;
                return (size, 0);
            }
            UploadStatistics::UploadComplete { .. } => {
                self.uploaded_count += 1;
                return (0, 1);
            }
            UploadStatistics::UploadError { .. } => {
                self.error_count += 1;
            }
            UploadStatistics::UploadWarning { .. } => {
                self.warning_count += 1;
            }
            UploadStatistics::ETagVerified { .. } => {
                self.e_tag_verified_count += 1;
            }
        }

        (0, 0)
    }
}

/// Draws the progress line until the statistics channel is closed.
pub fn show_indicator(
    stats_receiver: Receiver<UploadStatistics>,
    show_progress: bool,
    show_result: bool,
    dry_run: bool,
) -> JoinHandle<()> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_uploaded_bytes = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut ma_uploaded_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();

        let mut totals = UploadTotals::default();

        loop {
            let mut uploaded_bytes: u64 = 0;
            let mut uploaded_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(upload_stats) = stats_receiver.try_recv() {
                    let (bytes, count) = totals.add(upload_stats);
                    uploaded_bytes += bytes;
                    uploaded_count += count;
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let mut objects_per_sec =
                        (totals.uploaded_count as f64 / elapsed_secs_f64) as u64;
                    let mut bytes_per_sec =
                        (totals.uploaded_bytes as f64 / elapsed_secs_f64) as u64;

                    if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        objects_per_sec = totals.uploaded_count;
                        bytes_per_sec = totals.uploaded_bytes;
                    }
                    if dry_run {
                        objects_per_sec = 0;
                        bytes_per_sec = 0;
                    }

                    info!(
                        message = "upload summary",
                        transferred_byte = totals.uploaded_bytes,
                        transferred_byte_per_sec = bytes_per_sec,
                        transferred_object = totals.uploaded_count,
                        transferred_object_per_sec = objects_per_sec,
                        etag_verified = totals.e_tag_verified_count,
                        error = totals.error_count,
                        warning = totals.warning_count,
                        duration_sec = elapsed_secs_f64,
                    );

                    if show_result {
                        if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
                            progress_text.set_style(result_style);
                        }

                        progress_text.finish_with_message(format!(
                            "{:>3} | {:>3}/sec,  uploaded {:>3} files | {:>3} files/sec,  etag verified {} files,  error {} files,  warning {} files,  duration {}",
                            HumanBytes(totals.uploaded_bytes),
                            HumanBytes(bytes_per_sec),
                            totals.uploaded_count,
                            HumanCount(objects_per_sec),
                            totals.e_tag_verified_count,
                            totals.error_count,
                            totals.warning_count,
                            HumanDuration(elapsed),
                        ));

                        println!();
                        let _ = io::stdout().flush();
                    }

                    return;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }
            ma_uploaded_bytes.add_sample(uploaded_bytes);

            if !dry_run {
                ma_uploaded_count.add_sample(uploaded_count);
            }

            if show_progress {
                progress_text.set_message(format!(
                    "{:>3} | {:>3}/sec,  uploaded {:>3} files | {:>3} files/sec,  etag verified {} files,  error {} files,  warning {} files",
                    HumanBytes(totals.uploaded_bytes),
                    HumanBytes(ma_uploaded_bytes.get_average()).to_string(),
                    totals.uploaded_count,
                    HumanCount(ma_uploaded_count.get_average()).to_string(),
                    totals.e_tag_verified_count,
                    totals.error_count,
                    totals.warning_count,
                ));
            }
        }
    })
}
