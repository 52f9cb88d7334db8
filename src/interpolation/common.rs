//! Common utilities for interpolation algorithms.
//!
//! Output grids are described as lists of fractional source indices, one list
//! per axis. Every method samples the same positions, so continuous and
//! categorical layers of one tile stay pixel-aligned.

use std::time::{Duration, Instant};

use crate::error::{Result, TerrawinError};

/// Slack applied before rounding up a scaled length, so that `10 * 1.1`
/// (which is `11.000000000000002` in binary) still yields 11 samples.
const LENGTH_EPSILON: f64 = 1e-9;

/// Number of output samples along an axis of `n` source samples at `scale`.
///
/// Fractional products are rounded up: `ceil(n * scale)`.
pub fn scaled_len(n: usize, scale: f64) -> usize {
    ((n as f64 * scale) - LENGTH_EPSILON).ceil().max(0.0) as usize
}

/// Source positions for scale-factor sampling.
///
/// Output sample `i` sits at `i / scale`, so the grid starts on the first
/// source sample and its last position is `n - 1 / scale` for integer scales.
pub fn scaled_positions(n: usize, scale: f64) -> Vec<f64> {
    (0..scaled_len(n, scale))
        .map(|i| i as f64 / scale)
        .collect()
}

/// Source positions for fixed-size resampling with aligned endpoints.
///
/// The first and last output samples fall on the first and last source
/// samples; a single output sample reads index 0.
pub fn aligned_positions(n_in: usize, n_out: usize) -> Vec<f64> {
    if n_out <= 1 || n_in <= 1 {
        return vec![0.0; n_out];
    }
    let step = (n_in - 1) as f64 / (n_out - 1) as f64;
    (0..n_out).map(|i| i as f64 * step).collect()
}

/// Clamp an index to valid bounds
pub fn clamp_index(index: f64, size: usize) -> f64 {
    index.max(0.0).min((size - 1) as f64)
}

/// Nearest integer index for a fractional position, clamped to `[0, size)`.
///
/// A position exactly half-way between two samples resolves to the lower one.
pub fn nearest_index(position: f64, size: usize) -> usize {
    let rounded = (position - 0.5).ceil().max(0.0) as usize;
    rounded.min(size - 1)
}

/// Get the weight for linear interpolation
pub fn linear_weight(fraction: f64) -> (f64, f64) {
    (1.0 - fraction, fraction)
}

/// Cooperative time limit for expensive surface fits.
///
/// Long-running loops call [`Deadline::check`] between units of work.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// A deadline that never expires
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn is_expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() > limit,
            None => false,
        }
    }

    /// Fail with [`TerrawinError::Timeout`] once the limit has passed
    pub fn check(&self, operation: &str) -> Result<()> {
        match self.limit {
            Some(limit) if self.start.elapsed() > limit => Err(TerrawinError::Timeout {
                operation: operation.to_string(),
                limit_ms: limit.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}
