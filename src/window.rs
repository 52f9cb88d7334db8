//! Window extraction around a coordinate.
//!
//! The centre cell is the grid index whose axis value is closest to the
//! coordinate on each axis. From a requested size the window spans
//! `target_size / 100` cells per axis, starting `target_size / 200` cells
//! before the centre. Both ends are clamped into the axis, so windows near a
//! tile edge come back smaller rather than padded.

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrawinError};
use crate::tile::{validate_axis, Coordinate, LayerPath, RasterTile, LATITUDE_NAME, LONGITUDE_NAME};

/// Divisor turning a requested size into the half-window radius
pub const RADIUS_DIVISOR: usize = 200;
/// Divisor turning a requested size into the window length
pub const LENGTH_DIVISOR: usize = 100;

/// Half-open index ranges into a tile's arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub lat_start: usize,
    pub lat_end: usize,
    pub lon_start: usize,
    pub lon_end: usize,
}

impl Window {
    /// Compute the window for `coord` in `tile` at `target_size`.
    pub fn around(tile: &RasterTile, coord: Coordinate, target_size: usize) -> Result<Self> {
        validate_axis(&tile.name, LATITUDE_NAME, &tile.latitude)?;
        validate_axis(&tile.name, LONGITUDE_NAME, &tile.longitude)?;
        if target_size < LENGTH_DIVISOR {
            return Err(TerrawinError::InvalidParameter {
                param: "target_size".to_string(),
                message: format!(
                    "Size {} yields an empty window; must be at least {}",
                    target_size, LENGTH_DIVISOR
                ),
            });
        }

        let radius = target_size / RADIUS_DIVISOR;
        let length = target_size / LENGTH_DIVISOR;

        let lat_center = nearest_axis_index(&tile.latitude, coord.lat);
        let lon_center = nearest_axis_index(&tile.longitude, coord.lon);

        let (lat_start, lat_end) = clamp_span(lat_center, radius, length, tile.latitude.len());
        let (lon_start, lon_end) = clamp_span(lon_center, radius, length, tile.longitude.len());

        Ok(Self {
            lat_start,
            lat_end,
            lon_start,
            lon_end,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.lat_end - self.lat_start, self.lon_end - self.lon_start)
    }

    pub fn is_empty(&self) -> bool {
        self.lat_end <= self.lat_start || self.lon_end <= self.lon_start
    }

    /// Copy the window out of a layer array
    pub fn slice(&self, data: &Array2<f32>) -> Array2<f32> {
        data.slice(s![self.lat_start..self.lat_end, self.lon_start..self.lon_end])
            .to_owned()
    }

    /// Axis values covered by the window
    pub fn axes(&self, tile: &RasterTile) -> (Vec<f64>, Vec<f64>) {
        (
            tile.latitude[self.lat_start..self.lat_end].to_vec(),
            tile.longitude[self.lon_start..self.lon_end].to_vec(),
        )
    }
}

/// Index of the axis value closest to `value`; ties keep the first index.
pub fn nearest_axis_index(axis: &[f64], value: f64) -> usize {
    let mut closest_idx = 0;
    let mut min_diff = f64::MAX;

    for (i, &coord) in axis.iter().enumerate() {
        let diff = (coord - value).abs();
        if diff < min_diff {
            min_diff = diff;
            closest_idx = i;
        }
    }

    closest_idx
}

fn clamp_span(center: usize, radius: usize, length: usize, axis_len: usize) -> (usize, usize) {
    let nominal_start = center as isize - radius as isize;
    let nominal_end = nominal_start + length as isize;
    let start = nominal_start.clamp(0, axis_len as isize) as usize;
    let end = nominal_end.clamp(0, axis_len as isize) as usize;
    (start, end.max(start))
}

/// Extract the window of one layer around `coord`.
pub fn extract(
    tile: &RasterTile,
    layer: &LayerPath,
    coord: Coordinate,
    target_size: usize,
) -> Result<Array2<f32>> {
    let data = tile.layer(layer)?;
    let window = Window::around(tile, coord, target_size)?;
    Ok(window.slice(data))
}
