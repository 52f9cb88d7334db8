//! HTTP request handlers for the terrawin API.
//!
//! This module contains all the endpoint handlers for the web server.

pub mod catalog;
pub mod heartbeat;
pub mod layer;
pub mod terrain;

pub use catalog::catalog_handler;
pub use heartbeat::heartbeat_handler;
pub use layer::layer_handler;
pub use terrain::terrain_handler;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::TerrawinError;
use crate::logging::{create_http_trace_layer, log_request_error};
use crate::state::AppState;

/// Build the HTTP router over the shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/heartbeat", get(heartbeat_handler))
        .route("/catalog", get(catalog_handler))
        .route("/terrain", get(terrain_handler))
        .route("/layers/:key", get(layer_handler))
        .layer(create_http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Status code reported for an error
pub fn status_for(error: &TerrawinError) -> StatusCode {
    match error {
        TerrawinError::InvalidParameter { .. }
        | TerrawinError::UnsupportedKind { .. }
        | TerrawinError::DegenerateInput { .. } => StatusCode::BAD_REQUEST,
        TerrawinError::LayerNotFound { .. } => StatusCode::NOT_FOUND,
        TerrawinError::InvalidGeometry { .. } | TerrawinError::Interpolation { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TerrawinError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a failed request and turn it into a JSON error response
pub fn error_response(
    error: TerrawinError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) -> Response {
    log_request_error(&error, endpoint, request_id, params);
    (
        status_for(&error),
        Json(serde_json::json!({
            "error": error.to_string(),
            "request_id": request_id
        })),
    )
        .into_response()
}
