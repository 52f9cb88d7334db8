//! Raster tile data model.
//!
//! A tile is a georeferenced grid: one latitude axis, one longitude axis and a
//! set of named 2-D layers whose shape is `(latitude.len(), longitude.len())`.
//! Layers are addressed by `group/dataset` paths, mirroring the hierarchical
//! layout of the archive files (`ASTER GDEM/ASTGDEM`, `NDVI/Mean`, ...).

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TerrawinError};

/// Group holding the coordinate axes
pub const GEOLOCATION_GROUP: &str = "Geolocation";
/// Latitude axis dataset inside [`GEOLOCATION_GROUP`]
pub const LATITUDE_NAME: &str = "Latitude";
/// Longitude axis dataset inside [`GEOLOCATION_GROUP`]
pub const LONGITUDE_NAME: &str = "Longitude";

/// Semantic kind of a layer, which decides how it may be resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Smooth scalar field (elevation, vegetation index)
    Continuous,
    /// Discrete classes (land/water); values must never be blended
    Categorical,
}

impl LayerKind {
    /// Decide the kind of a layer from its identity.
    ///
    /// Land/water maps and anything named as a mask or class field are
    /// categorical; every other layer is treated as continuous.
    pub fn for_layer(path: &LayerPath) -> Self {
        let group = path.group.to_lowercase();
        let name = path.name.to_lowercase();
        let categorical = group == "land water map"
            || name == "lwmap"
            || group.contains("mask")
            || name.contains("mask")
            || group.contains("class")
            || name.contains("class");
        if categorical {
            LayerKind::Categorical
        } else {
            LayerKind::Continuous
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Continuous => "continuous",
            LayerKind::Categorical => "categorical",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = TerrawinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "continuous" => Ok(LayerKind::Continuous),
            "categorical" => Ok(LayerKind::Categorical),
            other => Err(TerrawinError::UnsupportedKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// `group/dataset` address of a layer inside a tile file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerPath {
    pub group: String,
    pub name: String,
}

impl LayerPath {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse a `group/dataset` string. Both parts must be non-empty.
    pub fn parse(path: &str) -> Result<Self> {
        match path.split_once('/') {
            Some((group, name)) if !group.is_empty() && !name.is_empty() => {
                Ok(Self::new(group, name))
            }
            _ => Err(TerrawinError::InvalidParameter {
                param: "layer".to_string(),
                message: format!("Expected 'group/dataset', got '{}'", path),
            }),
        }
    }

    pub fn kind(&self) -> LayerKind {
        LayerKind::for_layer(self)
    }
}

impl fmt::Display for LayerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// The layers carried by archive tiles
pub fn default_layers() -> Vec<LayerPath> {
    vec![
        LayerPath::new("ASTER GDEM", "ASTGDEM"),
        LayerPath::new("Land Water Map", "LWmap"),
        LayerPath::new("NDVI", "Mean"),
    ]
}

/// A (latitude, longitude) pair in the reference system of the tile axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Closed bounding box of a tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Build the box spanned by two axes, whatever their ordering.
    /// Returns `None` when either axis is empty.
    pub fn from_axes(latitude: &[f64], longitude: &[f64]) -> Option<Self> {
        let (lat_min, lat_max) = axis_extent(latitude)?;
        let (lon_min, lon_max) = axis_extent(longitude)?;
        Some(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    /// Inclusive containment test on both axes
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.lat_min
            && coord.lat <= self.lat_max
            && coord.lon >= self.lon_min
            && coord.lon <= self.lon_max
    }
}

fn axis_extent(axis: &[f64]) -> Option<(f64, f64)> {
    let first = *axis.first()?;
    let last = *axis.last()?;
    Some((first.min(last), first.max(last)))
}

/// Check that an axis is non-empty, finite and strictly monotonic.
pub fn validate_axis(tile: &str, axis_name: &str, axis: &[f64]) -> Result<()> {
    if axis.is_empty() {
        return Err(TerrawinError::InvalidGeometry {
            tile: tile.to_string(),
            message: format!("{} axis is empty", axis_name),
        });
    }
    if let Some(bad) = axis.iter().position(|v| !v.is_finite()) {
        return Err(TerrawinError::InvalidGeometry {
            tile: tile.to_string(),
            message: format!("{} axis has a non-finite value at index {}", axis_name, bad),
        });
    }
    if axis.len() > 1 {
        let ascending = axis[1] > axis[0];
        let monotonic = axis.windows(2).all(|pair| {
            if ascending {
                pair[1] > pair[0]
            } else {
                pair[1] < pair[0]
            }
        });
        if !monotonic {
            return Err(TerrawinError::InvalidGeometry {
                tile: tile.to_string(),
                message: format!("{} axis is not strictly monotonic", axis_name),
            });
        }
    }
    Ok(())
}

/// A georeferenced raster tile held in memory
#[derive(Debug, Clone)]
pub struct RasterTile {
    /// Tile identity, usually the file stem
    pub name: String,
    /// Latitude axis, typically descending
    pub latitude: Vec<f64>,
    /// Longitude axis, typically ascending
    pub longitude: Vec<f64>,
    /// Layers keyed by `group/dataset`
    pub layers: BTreeMap<LayerPath, Array2<f32>>,
}

impl RasterTile {
    pub fn new(name: impl Into<String>, latitude: Vec<f64>, longitude: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            layers: BTreeMap::new(),
        }
    }

    /// Grid shape shared by every layer: `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.latitude.len(), self.longitude.len())
    }

    /// Add a layer, rejecting arrays whose shape differs from the axes
    pub fn insert_layer(&mut self, path: LayerPath, data: Array2<f32>) -> Result<()> {
        if data.dim() != self.shape() {
            return Err(TerrawinError::InvalidGeometry {
                tile: self.name.clone(),
                message: format!(
                    "Layer {} has shape {:?}, axes imply {:?}",
                    path,
                    data.dim(),
                    self.shape()
                ),
            });
        }
        self.layers.insert(path, data);
        Ok(())
    }

    /// Builder-style variant of [`insert_layer`](Self::insert_layer)
    pub fn with_layer(mut self, path: LayerPath, data: Array2<f32>) -> Result<Self> {
        self.insert_layer(path, data)?;
        Ok(self)
    }

    pub fn layer(&self, path: &LayerPath) -> Result<&Array2<f32>> {
        self.layers
            .get(path)
            .ok_or_else(|| TerrawinError::LayerNotFound {
                tile: self.name.clone(),
                layer: path.to_string(),
            })
    }

    pub fn has_layer(&self, path: &LayerPath) -> bool {
        self.layers.contains_key(path)
    }

    pub fn layer_paths(&self) -> impl Iterator<Item = &LayerPath> {
        self.layers.keys()
    }

    pub fn bounding_box(&self) -> Result<BoundingBox> {
        BoundingBox::from_axes(&self.latitude, &self.longitude).ok_or_else(|| {
            TerrawinError::InvalidGeometry {
                tile: self.name.clone(),
                message: "Tile has an empty coordinate axis".to_string(),
            }
        })
    }

    /// Validate axes and layer shapes
    pub fn validate(&self) -> Result<()> {
        validate_axis(&self.name, LATITUDE_NAME, &self.latitude)?;
        validate_axis(&self.name, LONGITUDE_NAME, &self.longitude)?;
        for (path, data) in &self.layers {
            if data.dim() != self.shape() {
                return Err(TerrawinError::InvalidGeometry {
                    tile: self.name.clone(),
                    message: format!(
                        "Layer {} has shape {:?}, axes imply {:?}",
                        path,
                        data.dim(),
                        self.shape()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Approximate memory held by the layer arrays
    pub fn memory_bytes(&self) -> usize {
        self.layers.values().map(|a| a.len() * 4).sum::<usize>()
            + (self.latitude.len() + self.longitude.len()) * 8
    }
}
