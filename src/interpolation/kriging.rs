//! Ordinary kriging surface.
//!
//! Every source cell is a control point at its integer grid position. The
//! kriging system is solved once in dual form,
//!
//! ```text
//! | Γ  1 | | a |   | z |
//! | 1ᵀ 0 | | μ | = | 0 |
//! ```
//!
//! and the estimate at any position `x` is `Σ aᵢ γ(|x - xᵢ|) + μ`. Because
//! `γ(0) = 0`, evaluating at a control point returns its value exactly, so a
//! scale factor of 1 is the identity.
//!
//! Fitting cost is cubic in the number of control points and evaluation is
//! linear per output cell. Windows are capped at `max_control_points`. The
//! [`Deadline`] is checked between phases and before each output row, but
//! the LU solve runs to completion once started: its duration is bounded
//! only by the control-point cap, not by the deadline.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use tracing::debug;

use super::common::Deadline;
use super::variogram::Variogram;
use super::SurfaceModel;
use crate::error::{Result, TerrawinError};

/// Default cap on `rows * cols` for a single fit
pub const DEFAULT_MAX_CONTROL_POINTS: usize = 4096;

/// Kriging surface model parameterised by a variogram
pub struct KrigingInterpolator {
    variogram: Variogram,
    max_control_points: usize,
}

impl KrigingInterpolator {
    pub fn new(variogram: Variogram) -> Self {
        Self {
            variogram,
            max_control_points: DEFAULT_MAX_CONTROL_POINTS,
        }
    }

    pub fn with_max_control_points(mut self, max_control_points: usize) -> Self {
        self.max_control_points = max_control_points;
        self
    }

    pub fn variogram(&self) -> &Variogram {
        &self.variogram
    }

    /// Solve the dual kriging system, returning the point weights and drift.
    fn fit(&self, source: ArrayView2<f32>, range: f64, deadline: &Deadline) -> Result<(Vec<f64>, f64)> {
        let (_, width) = source.dim();
        let values: Vec<f64> = source.iter().map(|&v| v as f64).collect();
        let n = values.len();

        let mut system = DMatrix::<f64>::zeros(n + 1, n + 1);
        for i in 0..n {
            let (ri, ci) = ((i / width) as f64, (i % width) as f64);
            for j in (i + 1)..n {
                let (rj, cj) = ((j / width) as f64, (j % width) as f64);
                let h = ((ri - rj).powi(2) + (ci - cj).powi(2)).sqrt();
                let g = self.variogram.gamma(h, range);
                system[(i, j)] = g;
                system[(j, i)] = g;
            }
            system[(i, n)] = 1.0;
            system[(n, i)] = 1.0;
        }
        deadline.check("kriging fit")?;

        let mut rhs = DVector::<f64>::zeros(n + 1);
        for (i, &v) in values.iter().enumerate() {
            rhs[i] = v;
        }

        let solution = system
            .lu()
            .solve(&rhs)
            .ok_or_else(|| TerrawinError::Interpolation {
                message: format!(
                    "Kriging system is singular for {} control points ({} variogram, range {})",
                    n, self.variogram.model, range
                ),
            })?;
        deadline.check("kriging fit")?;

        let weights: Vec<f64> = solution.iter().take(n).copied().collect();
        Ok((weights, solution[n]))
    }
}

impl SurfaceModel for KrigingInterpolator {
    fn evaluate(
        &self,
        source: ArrayView2<f32>,
        rows: &[f64],
        cols: &[f64],
        deadline: &Deadline,
    ) -> Result<Array2<f32>> {
        let (height, width) = source.dim();
        let n = height * width;

        if n > self.max_control_points {
            return Err(TerrawinError::Interpolation {
                message: format!(
                    "Window of {}x{} has {} control points, limit is {}",
                    height, width, n, self.max_control_points
                ),
            });
        }
        if let Some(bad) = source.iter().position(|v| !v.is_finite()) {
            return Err(TerrawinError::Interpolation {
                message: format!(
                    "Non-finite control value at ({}, {})",
                    bad / width,
                    bad % width
                ),
            });
        }
        if n == 1 {
            return Ok(Array2::from_elem((rows.len(), cols.len()), source[[0, 0]]));
        }

        let range = self.variogram.effective_range(height, width);
        debug!(
            control_points = n,
            variogram = %self.variogram.model,
            range = range,
            "Fitting kriging surface"
        );
        let (weights, drift) = self.fit(source, range, deadline)?;

        let mut out = Array2::<f32>::zeros((rows.len(), cols.len()));
        for (i, &r) in rows.iter().enumerate() {
            deadline.check("kriging evaluation")?;
            for (j, &c) in cols.iter().enumerate() {
                let mut estimate = drift;
                for (k, &a) in weights.iter().enumerate() {
                    if a == 0.0 {
                        continue;
                    }
                    let dr = r - (k / width) as f64;
                    let dc = c - (k % width) as f64;
                    let h = (dr * dr + dc * dc).sqrt();
                    estimate += a * self.variogram.gamma(h, range);
                }
                out[[i, j]] = estimate as f32;
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "kriging"
    }
}
