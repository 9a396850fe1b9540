use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::types::progress_sink::{EntryEvent, JobEvent, ProgressEventType, ProgressSink};

pub const DEFAULT_DELIVERY_TIMEOUT_MILLISECONDS: u64 = 10000;

type SharedProgressSink = Arc<dyn ProgressSink + Send + Sync>;

#[derive(Clone)]
struct RegisteredSink {
    event_flags: ProgressEventType,
    sink: SharedProgressSink,
}

/// Fans progress events out to the registered sinks.
/// Every delivery is bounded by `delivery_timeout`. Delivery failures are logged only.
///
/// Sinks are shared without a lock, so concurrent callers deliver concurrently.
#[derive(Clone)]
pub struct ProgressManager {
    sinks: Vec<RegisteredSink>,
    delivery_timeout: Duration,
}

// RS-A1008 is not applicable here as this is intentional implementation
impl Default for ProgressManager {
    // skipcq: RS-A1008
    fn default() -> Self {
        // skipcq: RS-A1008
        Self::new()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            sinks: vec![],
            delivery_timeout: Duration::from_millis(DEFAULT_DELIVERY_TIMEOUT_MILLISECONDS),
        }
    }

    pub fn register_sink<T: ProgressSink + Send + Sync + 'static>(
        &mut self,
        event_flags: ProgressEventType,
        sink: T,
    ) {
        self.sinks.push(RegisteredSink {
            event_flags,
            sink: Arc::new(sink),
        });
    }

    pub fn set_delivery_timeout(&mut self, delivery_timeout: Duration) {
        self.delivery_timeout = delivery_timeout;
    }

    pub fn is_sink_registered(&self) -> bool {
        !self.sinks.is_empty()
    }

    pub async fn trigger_entry_event(&self, event: EntryEvent) {
        for registered in &self.sinks {
            if !registered.event_flags.contains(event.event_type) {
                continue;
            }

            let delivery = registered.sink.on_entry_event(event.clone());

            match tokio::time::timeout(self.delivery_timeout, delivery).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        entry_id = event.entry_id.to_string(),
                        error = e.to_string(),
                        "failed to deliver an entry event."
                    );
                }
                Err(_) => {
                    warn!(
                        entry_id = event.entry_id.to_string(),
                        timeout_milliseconds = self.delivery_timeout.as_millis() as u64,
                        "entry event delivery timed out."
                    );
                }
            }
        }
    }

    pub async fn trigger_job_event(&self, event: JobEvent) {
        for registered in &self.sinks {
            if !registered.event_flags.contains(event.event_type) {
                continue;
            }

            let delivery = registered.sink.on_job_event(event.clone());

            match tokio::time::timeout(self.delivery_timeout, delivery).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        status = event.status.to_string(),
                        error = e.to_string(),
                        "failed to deliver a job event."
                    );
                }
                Err(_) => {
                    warn!(
                        status = event.status.to_string(),
                        timeout_milliseconds = self.delivery_timeout.as_millis() as u64,
                        "job event delivery timed out."
                    );
                }
            }
        }
    }
}

impl fmt::Debug for ProgressManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressManager")
            .field(
                "event_flags",
                &self
                    .sinks
                    .iter()
                    .map(|registered| registered.event_flags)
                    .collect::<Vec<_>>(),
            )
            .field("delivery_timeout", &self.delivery_timeout)
            .finish()
    }
}
