//! Tile file reading and writing.
//!
//! Tiles are NetCDF-4/HDF5 containers that group layers by category:
//!
//! ```text
//! /Geolocation/Latitude     1-D (or 2-D lat grid)
//! /Geolocation/Longitude    1-D (or 2-D lon grid)
//! /ASTER GDEM/ASTGDEM       2-D
//! /Land Water Map/LWmap     2-D
//! /NDVI/Mean                2-D
//! ```
//!
//! Files are opened for the duration of a single call and closed when the
//! handle drops, on success and error alike. Writes go to a temporary file
//! that is renamed into place once complete.

use ndarray::Array2;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TerrawinError};
use crate::logging::log_tile_load_stats;
use crate::tile::{
    validate_axis, BoundingBox, LayerPath, RasterTile, GEOLOCATION_GROUP, LATITUDE_NAME,
    LONGITUDE_NAME,
};

/// File extensions recognised as tiles
pub const TILE_EXTENSIONS: &[&str] = &["nc", "nc4", "h5", "hdf5", "he5"];

/// Extension used for tiles written by terrawin
pub const OUTPUT_EXTENSION: &str = "nc";

const LAT_DIM: &str = "lat";
const LON_DIM: &str = "lon";

/// Whether `path` looks like a tile file
pub fn is_tile_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| TILE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
}

/// Tile identity derived from a file name.
///
/// The extension is dropped, and so is a trailing four-digit granule version
/// (`AG100.v003.-01.-067.0001.h5` becomes `AG100.v003.-01.-067`).
pub fn tile_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.rsplit_once('.') {
        Some((head, version))
            if version.len() == 4 && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            head.to_string()
        }
        _ => stem,
    }
}

/// Load a tile file into memory.
///
/// With `layers = None` every 2-D dataset outside the geolocation group is
/// read; otherwise only the listed layers, failing with `LayerNotFound` for
/// any that are absent.
pub fn load_tile(path: &Path, layers: Option<&[LayerPath]>) -> Result<RasterTile> {
    if !path.exists() {
        return Err(TerrawinError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }

    let name = tile_name(path);
    let file = netcdf::open(path)?;
    debug!("Opened tile file: {}", path.display());

    let (latitude, longitude) = read_axes(&file, &name)?;

    let wanted: Vec<LayerPath> = match layers {
        Some(list) => list.to_vec(),
        None => discover_layers(&file)?,
    };

    let mut tile = RasterTile::new(name.clone(), latitude, longitude);
    for layer in &wanted {
        let data = read_layer(&file, &name, layer)?;
        tile.insert_layer(layer.clone(), data)?;
    }
    tile.validate()?;

    let layer_names: Vec<String> = tile.layer_paths().map(|p| p.to_string()).collect();
    log_tile_load_stats(
        &path.display().to_string(),
        &layer_names,
        tile.shape(),
        tile.memory_bytes(),
    );

    Ok(tile)
}

/// Read only the coordinate axes of a tile and return its bounding box.
pub fn read_tile_bounds(path: &Path) -> Result<BoundingBox> {
    let name = tile_name(path);
    let file = netcdf::open(path)?;
    let (latitude, longitude) = read_axes(&file, &name)?;
    validate_axis(&name, LATITUDE_NAME, &latitude)?;
    validate_axis(&name, LONGITUDE_NAME, &longitude)?;
    BoundingBox::from_axes(&latitude, &longitude).ok_or_else(|| TerrawinError::InvalidGeometry {
        tile: name,
        message: "Tile has an empty coordinate axis".to_string(),
    })
}

/// List the layers present in a tile without reading their data.
pub fn list_layers(path: &Path) -> Result<Vec<LayerPath>> {
    let file = netcdf::open(path)?;
    discover_layers(&file)
}

fn discover_layers(file: &netcdf::File) -> Result<Vec<LayerPath>> {
    let mut layers = Vec::new();
    for group in file.groups()? {
        let group_name = group.name();
        if group_name == GEOLOCATION_GROUP {
            continue;
        }
        for var in group.variables() {
            if var.dimensions().len() == 2 {
                layers.push(LayerPath::new(group_name.clone(), var.name()));
            } else {
                warn!(
                    "Skipping dataset {}/{} with {} dimensions",
                    group_name,
                    var.name(),
                    var.dimensions().len()
                );
            }
        }
    }
    Ok(layers)
}

/// Read the latitude and longitude axes.
///
/// Axes stored as 2-D grids are reduced to the first column (latitude) and
/// the first row (longitude).
fn read_axes(file: &netcdf::File, tile: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let group = file
        .group(GEOLOCATION_GROUP)?
        .ok_or_else(|| TerrawinError::InvalidGeometry {
            tile: tile.to_string(),
            message: format!("Missing '{}' group", GEOLOCATION_GROUP),
        })?;

    let mut axes = Vec::with_capacity(2);
    for axis_name in [LATITUDE_NAME, LONGITUDE_NAME] {
        let var = group
            .variable(axis_name)
            .ok_or_else(|| TerrawinError::InvalidGeometry {
                tile: tile.to_string(),
                message: format!("Missing '{}/{}' dataset", GEOLOCATION_GROUP, axis_name),
            })?;
        let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f64> = var.get_values::<f64, _>(..)?;

        let expected: usize = dims.iter().product();
        if dims.contains(&0) || values.len() != expected {
            return Err(TerrawinError::InvalidGeometry {
                tile: tile.to_string(),
                message: format!(
                    "{} axis has shape {:?} but holds {} values",
                    axis_name,
                    dims,
                    values.len()
                ),
            });
        }

        let axis = match (axis_name, dims.as_slice()) {
            (_, [_]) => values,
            (LATITUDE_NAME, [rows, cols]) => (0..*rows).map(|r| values[r * cols]).collect(),
            (_, [_, cols]) => values[..*cols].to_vec(),
            _ => {
                return Err(TerrawinError::InvalidGeometry {
                    tile: tile.to_string(),
                    message: format!(
                        "{} axis has {} dimensions, expected 1 or 2",
                        axis_name,
                        dims.len()
                    ),
                })
            }
        };
        axes.push(axis);
    }

    let longitude = axes.pop().unwrap_or_default();
    let latitude = axes.pop().unwrap_or_default();
    Ok((latitude, longitude))
}

fn read_layer(file: &netcdf::File, tile: &str, layer: &LayerPath) -> Result<Array2<f32>> {
    let not_found = || TerrawinError::LayerNotFound {
        tile: tile.to_string(),
        layer: layer.to_string(),
    };
    let group = file.group(&layer.group)?.ok_or_else(not_found)?;
    let var = group.variable(&layer.name).ok_or_else(not_found)?;

    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let (rows, cols) = match dims.as_slice() {
        [rows, cols] => (*rows, *cols),
        _ => {
            return Err(TerrawinError::InvalidGeometry {
                tile: tile.to_string(),
                message: format!("Layer {} has {} dimensions, expected 2", layer, dims.len()),
            })
        }
    };

    let values: Vec<f32> = var.get_values::<f32, _>(..)?;
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

/// Temporary path a tile is written to before being published
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Write a tile atomically: the file only appears at `path` once complete.
pub fn write_tile(tile: &RasterTile, path: &Path) -> Result<()> {
    tile.validate()?;
    let staged = staging_path(path);
    if staged.exists() {
        std::fs::remove_file(&staged)?;
    }

    if let Err(e) = write_tile_contents(tile, &staged) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }

    std::fs::rename(&staged, path)?;
    debug!(tile = %tile.name, path = %path.display(), "Tile written");
    Ok(())
}

fn write_tile_contents(tile: &RasterTile, path: &Path) -> Result<()> {
    let (rows, cols) = tile.shape();
    let mut file = netcdf::create(path)?;
    file.add_attribute("tile_name", tile.name.as_str())?;

    {
        let mut geo = file.add_group(GEOLOCATION_GROUP)?;
        geo.add_dimension(LAT_DIM, rows)?;
        geo.add_dimension(LON_DIM, cols)?;

        let mut lat = geo.add_variable::<f64>(LATITUDE_NAME, &[LAT_DIM])?;
        lat.put_values(&tile.latitude, ..)?;
        let mut lon = geo.add_variable::<f64>(LONGITUDE_NAME, &[LON_DIM])?;
        lon.put_values(&tile.longitude, ..)?;
    }

    let groups: BTreeSet<&str> = tile.layer_paths().map(|p| p.group.as_str()).collect();
    for group_name in groups {
        let mut group = file.add_group(group_name)?;
        group.add_dimension(LAT_DIM, rows)?;
        group.add_dimension(LON_DIM, cols)?;

        for (path, data) in tile.layers.iter().filter(|(p, _)| p.group == group_name) {
            let values: Vec<f32> = data.iter().copied().collect();
            let mut var = group.add_variable::<f32>(&path.name, &[LAT_DIM, LON_DIM])?;
            var.put_values(&values, ..)?;
        }
    }

    Ok(())
}
