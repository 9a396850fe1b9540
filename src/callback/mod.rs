pub mod debug_progress_sink;
pub mod progress_manager;
pub mod tracing_progress_sink;
