//! Coordinate-driven terrain pipeline.
//!
//! One run locates the tile covering a coordinate, reads the selected layers
//! from its file, cuts the window around the coordinate from every layer and
//! upsamples each window by the scale factor with the method its kind calls
//! for. Layers are interpolated in parallel and published to the
//! [`LayerStore`] together once all of them succeeded.

use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::data_loader::load_tile;
use crate::error::{Result, TerrawinError};
use crate::interpolation::bilinear::sample_1d;
use crate::interpolation::common::scaled_positions;
use crate::interpolation::InterpolationEngine;
use crate::logging::log_timed_operation;
use crate::store::{encode_layer_key, LayerStore};
use crate::tile::{Coordinate, LayerKind, LayerPath};
use crate::tile_index::TileIndex;
use crate::window::Window;

/// Parameters of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerrainRequest {
    pub coordinate: Coordinate,
    /// Requested size; the window spans `target_size / 100` cells per axis
    pub target_size: usize,
    /// Upsampling factor applied to every window
    pub scale: f64,
}

/// Description of one computed layer
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub key: String,
    pub layer: String,
    pub kind: LayerKind,
    pub shape: (usize, usize),
    pub min: Option<f32>,
    pub max: Option<f32>,
}

/// Result of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct TerrainResult {
    pub tile: String,
    pub coordinate: Coordinate,
    pub window: Window,
    /// Store run number the layers were published under
    pub run: u64,
    /// Latitudes of the output rows
    pub latitude: Vec<f64>,
    /// Longitudes of the output columns
    pub longitude: Vec<f64>,
    pub layers: Vec<LayerSummary>,
}

/// Runs terrain requests against a tile index
#[derive(Debug, Clone)]
pub struct TerrainPipeline {
    index: Arc<TileIndex>,
    engine: InterpolationEngine,
    layers: Option<Vec<LayerPath>>,
}

impl TerrainPipeline {
    pub fn new(index: Arc<TileIndex>, engine: InterpolationEngine) -> Self {
        Self {
            index,
            engine,
            layers: None,
        }
    }

    /// Restrict runs to `layers`; by default every layer of the tile is used.
    pub fn with_layers(mut self, layers: Vec<LayerPath>) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn index(&self) -> &TileIndex {
        &self.index
    }

    pub fn engine(&self) -> &InterpolationEngine {
        &self.engine
    }

    /// Run the pipeline for `request` and publish the results into `store`.
    ///
    /// Returns `Ok(None)` when no tile covers the coordinate.
    pub fn run(&self, request: &TerrainRequest, store: &LayerStore) -> Result<Option<TerrainResult>> {
        log_timed_operation("terrain_pipeline", || self.run_inner(request, store))
    }

    fn run_inner(&self, request: &TerrainRequest, store: &LayerStore) -> Result<Option<TerrainResult>> {
        let coord = request.coordinate;
        if !(coord.lat.is_finite() && coord.lon.is_finite()) {
            return Err(TerrawinError::InvalidParameter {
                param: "coordinate".to_string(),
                message: format!("Non-finite coordinate ({}, {})", coord.lat, coord.lon),
            });
        }

        let entry = match self.index.locate(coord) {
            Some(entry) => entry,
            None => {
                info!(lat = coord.lat, lon = coord.lon, "No tile covers coordinate");
                return Ok(None);
            }
        };
        debug!(tile = %entry.name, path = %entry.path.display(), "Tile located");

        let tile = load_tile(&entry.path, self.layers.as_deref())?;
        let window = Window::around(&tile, coord, request.target_size)?;
        debug!(
            tile = %tile.name,
            window = ?window,
            shape = ?window.shape(),
            "Window computed"
        );

        let computed: Vec<(LayerPath, Array2<f32>)> = tile
            .layers
            .par_iter()
            .map(|(path, data)| {
                let slice = window.slice(data);
                let out = self
                    .engine
                    .interpolate(slice.view(), request.scale, path.kind())
                    .map_err(|e| with_layer_context(e, &tile.name, path, &window))?;
                Ok((path.clone(), out))
            })
            .collect::<Result<_>>()?;

        let (lat_axis, lon_axis) = window.axes(&tile);
        let latitude = sample_1d(&lat_axis, &scaled_positions(lat_axis.len(), request.scale));
        let longitude = sample_1d(&lon_axis, &scaled_positions(lon_axis.len(), request.scale));

        let layers: Vec<LayerSummary> = computed
            .iter()
            .map(|(path, data)| summarize(path, data))
            .collect();
        let run = store.publish(&tile.name, coord, computed);

        info!(
            tile = %tile.name,
            run = run,
            layers = layers.len(),
            scale = request.scale,
            "Terrain window published"
        );

        Ok(Some(TerrainResult {
            tile: tile.name,
            coordinate: coord,
            window,
            run,
            latitude,
            longitude,
            layers,
        }))
    }
}

fn with_layer_context(
    error: TerrawinError,
    tile: &str,
    layer: &LayerPath,
    window: &Window,
) -> TerrawinError {
    match error {
        TerrawinError::Interpolation { message } => TerrawinError::Interpolation {
            message: format!("{} layer {} window {:?}: {}", tile, layer, window, message),
        },
        TerrawinError::DegenerateInput { message } => TerrawinError::DegenerateInput {
            message: format!("{} layer {} window {:?}: {}", tile, layer, window, message),
        },
        other => other,
    }
}

fn summarize(path: &LayerPath, data: &Array2<f32>) -> LayerSummary {
    let finite = data.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((None, None), |(lo, hi): (Option<f32>, Option<f32>), v| {
        (
            Some(lo.map_or(v, |m| m.min(v))),
            Some(hi.map_or(v, |m| m.max(v))),
        )
    });
    LayerSummary {
        key: encode_layer_key(path),
        layer: path.to_string(),
        kind: path.kind(),
        shape: data.dim(),
        min,
        max,
    }
}
