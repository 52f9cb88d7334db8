//! Heartbeat endpoint handler.
//!
//! Returns server status information: uptime, memory usage, catalog size
//! and the layers currently held in the store.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::AppState;

/// Unique per process
static SERVER_ID: once_cell::sync::Lazy<String> =
    once_cell::sync::Lazy::new(|| Uuid::new_v4().to_string());

/// Heartbeat response structure
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    /// Server ID (unique per instance)
    pub server_id: String,
    /// Current timestamp (ISO 8601 format)
    pub timestamp: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Process memory usage in bytes
    pub memory_usage_bytes: Option<u64>,
    pub catalog: CatalogInfo,
    pub store: StoreInfo,
    /// Server status
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogInfo {
    pub tile_dir: Option<String>,
    pub tile_count: usize,
    pub surface_model: String,
}

#[derive(Debug, Serialize)]
pub struct StoreInfo {
    pub layer_count: usize,
    pub memory_bytes: usize,
}

/// Handle GET /heartbeat requests
pub async fn heartbeat_handler(State(state): State<Arc<AppState>>) -> Json<HeartbeatResponse> {
    Json(build_heartbeat(&state))
}

fn build_heartbeat(state: &AppState) -> HeartbeatResponse {
    let timestamp = chrono::DateTime::<chrono::Utc>::from(SystemTime::now())
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    HeartbeatResponse {
        server_id: SERVER_ID.clone(),
        timestamp,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        memory_usage_bytes: get_memory_usage(),
        catalog: CatalogInfo {
            tile_dir: state
                .config
                .data
                .tile_dir
                .as_ref()
                .map(|d| d.display().to_string()),
            tile_count: state.index.len(),
            surface_model: state.pipeline.engine().surface_name().to_string(),
        },
        store: StoreInfo {
            layer_count: state.store.len(),
            memory_bytes: state.store.memory_bytes(),
        },
        status: "healthy".to_string(),
    }
}

/// Resident set size of this process, where the platform exposes it
fn get_memory_usage() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        // RSS is the second field of /proc/self/statm, in pages
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(pages * 4096)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tile::{Coordinate, LayerPath};
    use crate::tile_index::TileIndex;

    #[test]
    fn test_heartbeat_response_structure() {
        let state = AppState::new(Config::default(), TileIndex::new()).unwrap();
        let response = build_heartbeat(&state);
        assert_eq!(response.status, "healthy");
        assert_eq!(response.catalog.tile_count, 0);
        assert_eq!(response.catalog.surface_model, "kriging");
        assert_eq!(response.store.layer_count, 0);

        state.store.publish(
            "t",
            Coordinate::new(0.0, 0.0),
            vec![(LayerPath::new("NDVI", "Mean"), ndarray::Array2::zeros((2, 2)))],
        );
        let response = build_heartbeat(&state);
        assert_eq!(response.store.layer_count, 1);
        assert_eq!(response.store.memory_bytes, 16);
        assert_eq!(response.server_id, build_heartbeat(&state).server_id);
    }
}
