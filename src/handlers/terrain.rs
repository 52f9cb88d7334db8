//! Terrain endpoint handler.
//!
//! Runs the pipeline for one coordinate and publishes the interpolated
//! layers into the store. The heavy work happens on the blocking pool.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::error_response;
use crate::error::TerrawinError;
use crate::logging::generate_request_id;
use crate::state::AppState;
use crate::tile::Coordinate;

/// Query parameters for the terrain endpoint
#[derive(Debug, Deserialize)]
pub struct TerrainQuery {
    /// Latitude coordinate
    pub lat: f64,
    /// Longitude coordinate
    pub lon: f64,
    /// Requested size (defaults to the configured target size)
    pub size: Option<usize>,
    /// Upsampling factor (defaults to the configured scale factor)
    pub scale: Option<f64>,
}

/// Handle GET /terrain requests
pub async fn terrain_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TerrainQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    let params_desc = format!(
        "lat={}, lon={}, size={:?}, scale={:?}",
        params.lat, params.lon, params.size, params.scale
    );

    debug!(
        endpoint = "/terrain",
        request_id = %request_id,
        params = %params_desc,
        "Processing terrain request"
    );

    let request = state.terrain_request(
        Coordinate::new(params.lat, params.lon),
        params.size,
        params.scale,
    );

    let worker_state = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || {
        worker_state.pipeline.run(&request, &worker_state.store)
    })
    .await
    .map_err(|e| TerrawinError::Server {
        message: format!("Terrain worker failed: {}", e),
    })
    .and_then(|result| result);

    match outcome {
        Ok(Some(result)) => {
            info!(
                endpoint = "/terrain",
                request_id = %request_id,
                tile = %result.tile,
                run = result.run,
                duration_us = start_time.elapsed().as_micros() as u64,
                "Terrain request successful"
            );
            Json(result).into_response()
        }
        Ok(None) => {
            info!(
                endpoint = "/terrain",
                request_id = %request_id,
                params = %params_desc,
                "No tile covers the requested coordinate"
            );
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!(
                        "No tile covers coordinate ({}, {})",
                        params.lat, params.lon
                    ),
                    "request_id": request_id
                })),
            )
                .into_response()
        }
        Err(error) => error_response(error, "/terrain", &request_id, Some(&params_desc)),
    }
}
