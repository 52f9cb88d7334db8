//! # terrawin
//!
//! Locates, tiles and resamples gridded geospatial rasters into terrain
//! windows.
//!
//! Source tiles are NetCDF-4/HDF5 files holding elevation, vegetation and
//! land/water layers on a latitude/longitude grid. Given a coordinate,
//! terrawin finds the tile that covers it, cuts a window around the
//! coordinate from each layer and upsamples it: continuous layers through a
//! pluggable surface model (kriging by default), categorical layers by
//! nearest-value assignment only.
//!
//! ## Architecture
//!
//! - **Tiles**: [`tile`], [`data_loader`] and [`tile_index`] read tiles and
//!   find the one covering a coordinate
//! - **Processing**: [`window`] and [`interpolation`] cut and upsample layers;
//!   [`pipeline`] chains them and publishes into the [`store`]
//! - **Batch**: [`splitter`] cuts whole tiles into resampled sub-tiles
//! - **API Layer**: [`handlers`] expose the pipeline and the store over HTTP

pub mod config;
pub mod data_loader;
pub mod error;
pub mod handlers;
pub mod interpolation;
pub mod logging;
pub mod pipeline;
pub mod splitter;
pub mod state;
pub mod store;
pub mod tile;
pub mod tile_index;
pub mod window;

pub use config::Config;
pub use error::{Result, TerrawinError};
pub use interpolation::{InterpolationEngine, SurfaceModel};
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_error, log_operation_end,
    log_operation_start, log_request_error, log_timed_operation,
};
pub use pipeline::{TerrainPipeline, TerrainRequest, TerrainResult};
pub use splitter::{split_directory, split_tile, BatchReport, SplitPlan};
pub use state::AppState;
pub use store::LayerStore;
pub use tile::{Coordinate, LayerKind, LayerPath, RasterTile};
pub use tile_index::TileIndex;
pub use window::{extract, Window};
