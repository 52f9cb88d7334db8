//! Error types for terrawin.
//!
//! A coordinate that no tile covers is not an error: lookups return `None`
//! for that case. Everything below is surfaced to the caller with the tile,
//! layer or window that caused it.

use thiserror::Error;

/// The main error type for terrawin operations.
#[derive(Error, Debug)]
pub enum TerrawinError {
    /// NetCDF/HDF5 file operation errors
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A requested layer is absent from a tile
    #[error("Layer '{layer}' not found in tile '{tile}'")]
    LayerNotFound { tile: String, layer: String },

    /// Malformed coordinate axes or grid shapes
    #[error("Invalid geometry in tile '{tile}': {message}")]
    InvalidGeometry { tile: String, message: String },

    /// Interpolation requested for a layer kind the engine does not know
    #[error("Unsupported layer kind: {kind}")]
    UnsupportedKind { kind: String },

    /// Interpolation input with a zero dimension or otherwise unusable shape
    #[error("Degenerate input: {message}")]
    DegenerateInput { message: String },

    /// Interpolation errors
    #[error("Interpolation error: {message}")]
    Interpolation { message: String },

    /// A bounded operation ran past its deadline
    #[error("{operation} exceeded its time limit of {limit_ms} ms")]
    Timeout { operation: String, limit_ms: u64 },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// Array shape errors from ndarray
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow/serialization errors
    #[error("Conversion error: {message}")]
    Conversion { message: String },

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

/// Convenience type alias for Results with TerrawinError
pub type Result<T> = std::result::Result<T, TerrawinError>;
