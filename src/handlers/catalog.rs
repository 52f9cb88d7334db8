//! Catalog endpoint handler.
//!
//! Returns JSON describing every indexed tile and its bounding box.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::logging::generate_request_id;
use crate::state::AppState;
use crate::tile::BoundingBox;

#[derive(Debug, Serialize)]
pub struct CatalogTile {
    pub name: String,
    pub path: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub tile_count: usize,
    pub tiles: Vec<CatalogTile>,
}

/// Handle GET /catalog requests
pub async fn catalog_handler(State(state): State<Arc<AppState>>) -> Json<CatalogResponse> {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/catalog",
        request_id = %request_id,
        "Processing catalog request"
    );

    let response = build_catalog(&state);

    info!(
        endpoint = "/catalog",
        request_id = %request_id,
        duration_us = start_time.elapsed().as_micros() as u64,
        tile_count = response.tile_count,
        "Catalog request successful"
    );

    Json(response)
}

fn build_catalog(state: &AppState) -> CatalogResponse {
    let tiles: Vec<CatalogTile> = state
        .index
        .entries()
        .iter()
        .map(|e| CatalogTile {
            name: e.name.clone(),
            path: e.path.display().to_string(),
            bbox: e.bbox,
        })
        .collect();
    CatalogResponse {
        tile_count: tiles.len(),
        tiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tile_index::{TileEntry, TileIndex};

    #[test]
    fn test_catalog_lists_entries() {
        let bbox = BoundingBox::from_axes(&[1.0, 0.0], &[-67.0, -66.0]).unwrap();
        let index = TileIndex::from_entries(vec![
            TileEntry::new("AG100.v003.00.-067", "/tiles/a.nc", bbox),
            TileEntry::new("AG100.v003.01.-067", "/tiles/b.nc", bbox),
        ]);
        let state = AppState::new(Config::default(), index).unwrap();
        let catalog = build_catalog(&state);
        assert_eq!(catalog.tile_count, 2);
        assert_eq!(catalog.tiles[0].name, "AG100.v003.00.-067");
        assert_eq!(catalog.tiles[1].path, "/tiles/b.nc");

        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["tiles"][0]["bbox"]["lat_max"], 1.0);
    }
}
