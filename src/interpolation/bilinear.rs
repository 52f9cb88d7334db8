//! Bilinear interpolation.
//!
//! This method performs linear interpolation in two dimensions using
//! the four nearest grid points. Positions beyond the grid are clamped to
//! the edge samples.

use ndarray::{Array2, ArrayView2};

use super::common::{self, Deadline};
use super::SurfaceModel;
use crate::error::Result;

/// Bilinear interpolator (order 1)
pub struct BilinearInterpolator;

/// Lower index, upper index and upper weight for one output position
fn axis_taps(positions: &[f64], size: usize) -> Vec<(usize, usize, f64)> {
    positions
        .iter()
        .map(|&p| {
            let p = common::clamp_index(p, size);
            let lower = p.floor() as usize;
            let upper = (lower + 1).min(size - 1);
            (lower, upper, p - lower as f64)
        })
        .collect()
}

/// Linearly resample a 1-D series at fractional positions.
///
/// Positions past either end continue the first or last step, so a regular
/// coordinate axis sampled at `i / s` stays strictly monotonic.
pub fn sample_1d(values: &[f64], positions: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let last = values.len() - 1;
    positions
        .iter()
        .map(|&p| {
            if last == 0 {
                values[0]
            } else if p < 0.0 {
                values[0] + p * (values[1] - values[0])
            } else if p > last as f64 {
                values[last] + (p - last as f64) * (values[last] - values[last - 1])
            } else {
                let lower = (p.floor() as usize).min(last);
                let upper = (lower + 1).min(last);
                let (w0, w1) = common::linear_weight(p - lower as f64);
                values[lower] * w0 + values[upper] * w1
            }
        })
        .collect()
}

impl SurfaceModel for BilinearInterpolator {
    fn evaluate(
        &self,
        source: ArrayView2<f32>,
        rows: &[f64],
        cols: &[f64],
        deadline: &Deadline,
    ) -> Result<Array2<f32>> {
        let (height, width) = source.dim();
        let row_taps = axis_taps(rows, height);
        let col_taps = axis_taps(cols, width);

        let mut out = Array2::<f32>::zeros((rows.len(), cols.len()));
        for (i, &(r0, r1, fy)) in row_taps.iter().enumerate() {
            deadline.check("bilinear resampling")?;
            let (wy0, wy1) = common::linear_weight(fy);
            for (j, &(c0, c1, fx)) in col_taps.iter().enumerate() {
                let (wx0, wx1) = common::linear_weight(fx);
                let top = source[[r0, c0]] as f64 * wx0 + source[[r0, c1]] as f64 * wx1;
                let bottom = source[[r1, c0]] as f64 * wx0 + source[[r1, c1]] as f64 * wx1;
                out[[i, j]] = (top * wy0 + bottom * wy1) as f32;
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "bilinear"
    }
}
