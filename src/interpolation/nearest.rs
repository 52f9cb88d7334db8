//! Nearest neighbor interpolation.
//!
//! Each output cell takes the value of the closest source grid point. On a
//! regular grid the Euclidean nearest point is found by rounding each axis
//! independently, so no value is ever blended. This is the only method used
//! for categorical layers.

use ndarray::{Array2, ArrayView2};

use super::common::{self, Deadline};
use super::SurfaceModel;
use crate::error::Result;

/// Nearest neighbor interpolator
pub struct NearestInterpolator;

/// Sample `source` at the given fractional row and column positions.
pub fn sample(source: ArrayView2<f32>, rows: &[f64], cols: &[f64]) -> Array2<f32> {
    let (height, width) = source.dim();
    let row_index: Vec<usize> = rows
        .iter()
        .map(|&r| common::nearest_index(r, height))
        .collect();
    let col_index: Vec<usize> = cols
        .iter()
        .map(|&c| common::nearest_index(c, width))
        .collect();

    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| {
        source[[row_index[i], col_index[j]]]
    })
}

impl SurfaceModel for NearestInterpolator {
    fn evaluate(
        &self,
        source: ArrayView2<f32>,
        rows: &[f64],
        cols: &[f64],
        _deadline: &Deadline,
    ) -> Result<Array2<f32>> {
        Ok(sample(source, rows, cols))
    }

    fn name(&self) -> &str {
        "nearest"
    }
}
