//! Logging utilities for terrawin.
//!
//! Structured `tracing` helpers shared by the server, the pipeline and the
//! batch splitter. Fields are named consistently (`operation`, `tile`,
//! `duration_ms`) so logs of both subcommands can be filtered the same way.

use std::time::Instant;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use uuid::Uuid;

use crate::error::TerrawinError;

/// Creates the tracing layer for HTTP request/response logging
pub fn create_http_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    match details {
        Some(details) => info!(operation = operation, details = details, "Starting operation"),
        None => info!(operation = operation, "Starting operation"),
    }
}

/// Log the completion of a significant operation
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed"
        );
    } else {
        warn!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation failed"
        );
    }
}

/// Run `f`, logging its duration under a fresh run id
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let run_id = Uuid::new_v4();

    debug!(operation = operation, run_id = %run_id, "Starting operation");

    let result = f();

    info!(
        operation = operation,
        run_id = %run_id,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Log detailed information about a loaded tile
pub fn log_tile_load_stats(
    file_path: &str,
    layer_names: &[String],
    shape: (usize, usize),
    memory_usage: usize,
) {
    info!(
        operation = "tile_load",
        file_path = file_path,
        layer_count = layer_names.len(),
        layers = %layer_names.join(", "),
        rows = shape.0,
        cols = shape.1,
        memory_kb = memory_usage / 1024,
        "Tile loaded"
    );
}

/// Log the outcome of a batch split over a directory
pub fn log_batch_summary(processed: usize, written: usize, skipped: usize, failed: usize) {
    if failed == 0 {
        info!(
            operation = "split_batch",
            processed = processed,
            written = written,
            skipped = skipped,
            "Batch split finished"
        );
    } else {
        warn!(
            operation = "split_batch",
            processed = processed,
            written = written,
            skipped = skipped,
            failed = failed,
            "Batch split finished with failures"
        );
    }
}

/// Short, stable name of an error variant for log fields
pub fn error_kind(error: &TerrawinError) -> &'static str {
    match error {
        TerrawinError::NetCdf(_) => "netcdf",
        TerrawinError::Io(_) => "io",
        TerrawinError::Config { .. } => "config",
        TerrawinError::LayerNotFound { .. } => "layer_not_found",
        TerrawinError::InvalidGeometry { .. } => "invalid_geometry",
        TerrawinError::UnsupportedKind { .. } => "unsupported_kind",
        TerrawinError::DegenerateInput { .. } => "degenerate_input",
        TerrawinError::Interpolation { .. } => "interpolation",
        TerrawinError::Timeout { .. } => "timeout",
        TerrawinError::InvalidParameter { .. } => "invalid_parameter",
        TerrawinError::Shape(_) => "shape",
        TerrawinError::Json(_) => "json",
        TerrawinError::Conversion { .. } => "conversion",
        TerrawinError::Server { .. } => "server",
    }
}

/// Log an error with context
pub fn log_error(error: &TerrawinError, context: &str) {
    error!(
        error = %error,
        error_kind = error_kind(error),
        context = context,
        "Error occurred"
    );
}

/// Log an error that occurred during request processing
pub fn log_request_error(
    error: &TerrawinError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) {
    error!(
        error = %error,
        error_kind = error_kind(error),
        endpoint = endpoint,
        request_id = request_id,
        params = params.unwrap_or("none"),
        "Request processing error"
    );
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
