//! Application state management for terrawin.
//!
//! This module defines the shared state that is passed to all handlers:
//! the tile index, the pipeline that runs terrain requests against it, and
//! the store that holds the latest computed layers.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{Result, TerrawinError};
use crate::pipeline::{TerrainPipeline, TerrainRequest};
use crate::store::LayerStore;
use crate::tile::Coordinate;
use crate::tile_index::TileIndex;

/// The main application state shared across all handlers
#[derive(Debug)]
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Tile catalog
    pub index: Arc<TileIndex>,
    /// Pipeline bound to the catalog
    pub pipeline: TerrainPipeline,
    /// Latest computed layers
    pub store: Arc<LayerStore>,
    /// When the state was built
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Config, index: TileIndex) -> Result<Self> {
        let index = Arc::new(index);
        let engine = config.data.engine()?;
        let pipeline = TerrainPipeline::new(Arc::clone(&index), engine);
        Ok(Self {
            config,
            index,
            pipeline,
            store: Arc::new(LayerStore::new()),
            started_at: Instant::now(),
        })
    }

    /// Build the state by indexing the configured tile directory
    pub fn from_config(config: Config) -> Result<Self> {
        let dir = config.data.tile_dir.clone().ok_or_else(|| TerrawinError::Config {
            message: "No tile directory configured (use --tile-dir)".to_string(),
        })?;
        let index = TileIndex::from_dir(Path::new(&dir))?;
        Self::new(config, index)
    }

    /// Create a new AppState wrapped in an Arc for shared ownership
    pub fn new_shared(config: Config, index: TileIndex) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(config, index)?))
    }

    /// Request for `coord`, filling unset parameters from the configuration
    pub fn terrain_request(
        &self,
        coord: Coordinate,
        target_size: Option<usize>,
        scale: Option<f64>,
    ) -> TerrainRequest {
        TerrainRequest {
            coordinate: coord,
            target_size: target_size.unwrap_or(self.config.data.target_size),
            scale: scale.unwrap_or(self.config.data.scale_factor),
        }
    }

    /// Validate that the application state is consistent and ready for use
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.index.is_empty() {
            return Err(TerrawinError::Config {
                message: "Tile index is empty; no tiles found in the tile directory".to_string(),
            });
        }
        Ok(())
    }
}
