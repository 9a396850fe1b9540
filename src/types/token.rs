use tokio_util::sync::CancellationToken;

pub type PipelineCancellationToken = CancellationToken;

pub fn create_pipeline_cancellation_token() -> PipelineCancellationToken {
    CancellationToken::new()
}

/// A token for a single pipeline run. Cancelling the parent cancels the run,
/// but the run never cancels the parent.
pub fn create_run_cancellation_token(
    parent: &PipelineCancellationToken,
) -> PipelineCancellationToken {
    parent.child_token()
}
