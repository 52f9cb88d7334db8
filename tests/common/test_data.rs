//! Test data generation utilities.
//!
//! Builds NetCDF-4 tiles laid out like the source archive: a `Geolocation`
//! group with the coordinate axes and one group per layer. Files are written
//! with the `netcdf` crate directly, independent of terrawin's own writer.

use ndarray::Array2;
use std::path::{Path, PathBuf};

use netcdf::Error;
type Result<T> = std::result::Result<T, Error>;

pub const DEM: (&str, &str) = ("ASTER GDEM", "ASTGDEM");
pub const LWMAP: (&str, &str) = ("Land Water Map", "LWmap");
pub const NDVI: (&str, &str) = ("NDVI", "Mean");

/// One layer to write: group, dataset and data
pub type LayerData = (&'static str, &'static str, Array2<f32>);

/// Axes of a one-degree tile with `n` samples per side.
///
/// Latitude descends from `lat_top` to `lat_top - 1`; longitude ascends from
/// `lon_left` to `lon_left + 1`. Both ends are included.
pub fn degree_axes(lat_top: f64, lon_left: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    let last = (n - 1) as f64;
    let latitude = (0..n).map(|i| lat_top - i as f64 / last).collect();
    let longitude = (0..n).map(|j| lon_left + j as f64 / last).collect();
    (latitude, longitude)
}

/// Elevation, land/water and NDVI layers with known patterns.
///
/// Elevation is `row + col`; the land/water map is water (0) on the left
/// half and land (1) on the right half; NDVI is a smooth wave in `[0, 1]`.
pub fn archive_layers(rows: usize, cols: usize) -> Vec<LayerData> {
    vec![
        (
            DEM.0,
            DEM.1,
            Array2::from_shape_fn((rows, cols), |(r, c)| (r + c) as f32),
        ),
        (
            LWMAP.0,
            LWMAP.1,
            Array2::from_shape_fn((rows, cols), |(_, c)| if c < cols / 2 { 0.0 } else { 1.0 }),
        ),
        (
            NDVI.0,
            NDVI.1,
            Array2::from_shape_fn((rows, cols), |(r, c)| {
                0.5 + 0.5 * ((r as f32 * 0.1).sin() * (c as f32 * 0.1).cos())
            }),
        ),
    ]
}

/// Write a tile file.
///
/// With `two_d_axes` the coordinates are stored as full latitude/longitude
/// grids, the way the source archive stores them.
pub fn create_tile_nc(
    path: &Path,
    latitude: &[f64],
    longitude: &[f64],
    two_d_axes: bool,
    layers: &[LayerData],
) -> Result<()> {
    let rows = latitude.len();
    let cols = longitude.len();
    let mut file = netcdf::create(path)?;
    file.add_attribute("title", "terrawin test tile")?;

    {
        let mut geo = file.add_group("Geolocation")?;
        geo.add_dimension("lat", rows)?;
        geo.add_dimension("lon", cols)?;

        if two_d_axes {
            let lat_grid: Vec<f64> = (0..rows * cols).map(|i| latitude[i / cols]).collect();
            let lon_grid: Vec<f64> = (0..rows * cols).map(|i| longitude[i % cols]).collect();
            let mut lat = geo.add_variable::<f64>("Latitude", &["lat", "lon"])?;
            lat.put_values(&lat_grid, ..)?;
            let mut lon = geo.add_variable::<f64>("Longitude", &["lat", "lon"])?;
            lon.put_values(&lon_grid, ..)?;
        } else {
            let mut lat = geo.add_variable::<f64>("Latitude", &["lat"])?;
            lat.put_values(latitude, ..)?;
            let mut lon = geo.add_variable::<f64>("Longitude", &["lon"])?;
            lon.put_values(longitude, ..)?;
        }
    }

    for (group_name, dataset, data) in layers {
        let mut group = file.add_group(group_name)?;
        group.add_dimension("lat", rows)?;
        group.add_dimension("lon", cols)?;
        let values: Vec<f32> = data.iter().copied().collect();
        let mut var = group.add_variable::<f32>(dataset, &["lat", "lon"])?;
        var.put_values(&values, ..)?;
    }

    Ok(())
}

/// Write an archive-style tile `{name}.0001.nc` into `dir` and return its path.
pub fn create_archive_tile(
    dir: &Path,
    name: &str,
    lat_top: f64,
    lon_left: f64,
    n: usize,
    two_d_axes: bool,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.0001.nc", name));
    let (latitude, longitude) = degree_axes(lat_top, lon_left, n);
    create_tile_nc(
        &path,
        &latitude,
        &longitude,
        two_d_axes,
        &archive_layers(n, n),
    )?;
    Ok(path)
}

/// Write a corrupt tile whose 2-D coordinate grids have a zero-length
/// longitude dimension.
pub fn create_empty_axis_tile(path: &Path, rows: usize) -> Result<()> {
    let mut file = netcdf::create(path)?;
    {
        let mut geo = file.add_group("Geolocation")?;
        geo.add_dimension("lat", rows)?;
        // Never written, so its length stays zero
        geo.add_unlimited_dimension("lon")?;
        geo.add_variable::<f64>("Latitude", &["lat", "lon"])?;
        geo.add_variable::<f64>("Longitude", &["lat", "lon"])?;
    }
    let mut group = file.add_group(DEM.0)?;
    group.add_dimension("lat", rows)?;
    group.add_dimension("lon", rows)?;
    let values = vec![0.0f32; rows * rows];
    let mut var = group.add_variable::<f32>(DEM.1, &["lat", "lon"])?;
    var.put_values(&values, ..)?;
    Ok(())
}
