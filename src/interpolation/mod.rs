//! Interpolation engine for raster layers.
//!
//! Continuous layers are resampled through a pluggable [`SurfaceModel`]
//! (kriging, bicubic, bilinear, nearest). Categorical layers are always
//! resampled by nearest-value assignment so no class label is invented.
//!
//! Two sampling modes share the same per-axis positions for both kinds:
//!
//! - [`InterpolationEngine::interpolate`] upsamples by a scale factor `s`;
//!   output length is `ceil(n * s)` and sample `i` reads source index `i / s`.
//! - [`InterpolationEngine::resample`] produces a fixed output size with the
//!   first and last samples aligned to the source edges.

pub mod bicubic;
pub mod bilinear;
pub mod common;
pub mod kriging;
pub mod nearest;
pub mod variogram;

use ndarray::{Array2, ArrayView2};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TerrawinError};
use crate::tile::LayerKind;
use common::Deadline;
use variogram::Variogram;

/// Trait for surface models used on continuous layers
pub trait SurfaceModel: Send + Sync {
    /// Fit a surface through `source` and evaluate it on the grid formed by
    /// the fractional source `rows` and `cols` positions.
    fn evaluate(
        &self,
        source: ArrayView2<f32>,
        rows: &[f64],
        cols: &[f64],
        deadline: &Deadline,
    ) -> Result<Array2<f32>>;

    /// Get the name of this interpolation method
    fn name(&self) -> &str;
}

/// Names accepted by [`get_surface_model`]
pub const SURFACE_MODELS: &[&str] = &["nearest", "bilinear", "bicubic", "kriging"];

/// Get a surface model by name. `variogram` and `max_control_points` only
/// apply to kriging.
pub fn get_surface_model(
    name: &str,
    variogram: Variogram,
    max_control_points: usize,
) -> Result<Arc<dyn SurfaceModel>> {
    match name.to_lowercase().as_str() {
        "nearest" => Ok(Arc::new(nearest::NearestInterpolator)),
        "bilinear" => Ok(Arc::new(bilinear::BilinearInterpolator)),
        "bicubic" => Ok(Arc::new(bicubic::BicubicInterpolator)),
        "kriging" => Ok(Arc::new(
            kriging::KrigingInterpolator::new(variogram)
                .with_max_control_points(max_control_points),
        )),
        _ => Err(TerrawinError::InvalidParameter {
            param: "interpolation".to_string(),
            message: format!(
                "Unknown interpolation method: {}. Must be one of: {}",
                name,
                SURFACE_MODELS.join(", ")
            ),
        }),
    }
}

/// Resamples layers according to their kind
#[derive(Clone)]
pub struct InterpolationEngine {
    surface: Arc<dyn SurfaceModel>,
    fit_timeout: Option<Duration>,
    max_output_cells: Option<usize>,
}

impl std::fmt::Debug for InterpolationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpolationEngine")
            .field("surface", &self.surface.name())
            .field("fit_timeout", &self.fit_timeout)
            .field("max_output_cells", &self.max_output_cells)
            .finish()
    }
}

impl InterpolationEngine {
    pub fn new(surface: Arc<dyn SurfaceModel>) -> Self {
        Self {
            surface,
            fit_timeout: None,
            max_output_cells: None,
        }
    }

    /// Bound the duration of each continuous-layer surface evaluation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fit_timeout = Some(timeout);
        self
    }

    /// Reject requests whose output grid would exceed `cells` values
    pub fn with_max_output_cells(mut self, cells: usize) -> Self {
        self.max_output_cells = Some(cells);
        self
    }

    pub fn surface_name(&self) -> &str {
        self.surface.name()
    }

    /// Upsample `matrix` by `scale` using the method for `kind`.
    ///
    /// Output shape is `(ceil(H * scale), ceil(W * scale))`.
    pub fn interpolate(
        &self,
        matrix: ArrayView2<f32>,
        scale: f64,
        kind: LayerKind,
    ) -> Result<Array2<f32>> {
        check_not_degenerate(&matrix)?;
        if !(scale.is_finite() && scale >= 1.0) {
            return Err(TerrawinError::InvalidParameter {
                param: "scale".to_string(),
                message: format!("Scale factor must be a finite value >= 1, got {}", scale),
            });
        }
        let (height, width) = matrix.dim();
        self.check_output_size(
            common::scaled_len(height, scale),
            common::scaled_len(width, scale),
            "scale",
        )?;
        let rows = common::scaled_positions(height, scale);
        let cols = common::scaled_positions(width, scale);
        self.sample(matrix, &rows, &cols, kind)
    }

    /// Like [`interpolate`](Self::interpolate) but with the kind given by name.
    pub fn interpolate_named(
        &self,
        matrix: ArrayView2<f32>,
        scale: f64,
        kind: &str,
    ) -> Result<Array2<f32>> {
        let kind: LayerKind = kind.parse()?;
        self.interpolate(matrix, scale, kind)
    }

    /// Resample `matrix` to exactly `shape` using the method for `kind`.
    pub fn resample(
        &self,
        matrix: ArrayView2<f32>,
        shape: (usize, usize),
        kind: LayerKind,
    ) -> Result<Array2<f32>> {
        check_not_degenerate(&matrix)?;
        if shape.0 == 0 || shape.1 == 0 {
            return Err(TerrawinError::DegenerateInput {
                message: format!("Requested output shape {:?} has a zero dimension", shape),
            });
        }
        self.check_output_size(shape.0, shape.1, "shape")?;
        let (height, width) = matrix.dim();
        let rows = common::aligned_positions(height, shape.0);
        let cols = common::aligned_positions(width, shape.1);
        self.sample(matrix, &rows, &cols, kind)
    }

    /// Fail before allocating when the output grid is over the cell limit
    fn check_output_size(&self, rows: usize, cols: usize, param: &str) -> Result<()> {
        let Some(limit) = self.max_output_cells else {
            return Ok(());
        };
        match rows.checked_mul(cols) {
            Some(cells) if cells <= limit => Ok(()),
            _ => Err(TerrawinError::InvalidParameter {
                param: param.to_string(),
                message: format!(
                    "Output grid of {}x{} exceeds the limit of {} cells",
                    rows, cols, limit
                ),
            }),
        }
    }

    fn sample(
        &self,
        matrix: ArrayView2<f32>,
        rows: &[f64],
        cols: &[f64],
        kind: LayerKind,
    ) -> Result<Array2<f32>> {
        match kind {
            LayerKind::Categorical => Ok(nearest::sample(matrix, rows, cols)),
            LayerKind::Continuous => {
                let deadline = Deadline::new(self.fit_timeout);
                self.surface.evaluate(matrix, rows, cols, &deadline)
            }
        }
    }
}

fn check_not_degenerate(matrix: &ArrayView2<f32>) -> Result<()> {
    let (height, width) = matrix.dim();
    if height == 0 || width == 0 {
        return Err(TerrawinError::DegenerateInput {
            message: format!("Source matrix has shape ({}, {})", height, width),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::HashSet;

    fn engine(name: &str) -> InterpolationEngine {
        InterpolationEngine::new(
            get_surface_model(name, Variogram::default(), kriging::DEFAULT_MAX_CONTROL_POINTS)
                .unwrap(),
        )
    }

    #[test]
    fn test_get_surface_model() {
        for name in SURFACE_MODELS {
            let model =
                get_surface_model(name, Variogram::default(), 16).unwrap();
            assert_eq!(model.name(), *name);
        }
        assert!(get_surface_model("spline", Variogram::default(), 16).is_err());
    }

    #[test]
    fn test_identity_at_scale_one() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        for name in SURFACE_MODELS {
            let out = engine(name)
                .interpolate(data.view(), 1.0, LayerKind::Continuous)
                .unwrap();
            assert_eq!(out.dim(), (3, 3));
            for (a, b) in out.iter().zip(data.iter()) {
                assert!((a - b).abs() < 1e-3, "{}: {} vs {}", name, a, b);
            }
        }
        let out = engine("kriging")
            .interpolate(data.view(), 1.0, LayerKind::Categorical)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_continuous_output_shape() {
        let data = Array2::from_shape_fn((4, 3), |(r, c)| (r * 3 + c) as f32);
        for scale in [2.0, 3.0, 5.0] {
            let out = engine("kriging")
                .interpolate(data.view(), scale, LayerKind::Continuous)
                .unwrap();
            assert_eq!(out.dim(), (4 * scale as usize, 3 * scale as usize));
        }
    }

    #[test]
    fn test_fractional_scale_keeps_kinds_aligned() {
        let data = Array2::from_shape_fn((3, 5), |(r, c)| ((r + c) % 2) as f32);
        let e = engine("bicubic");
        let continuous = e.interpolate(data.view(), 1.5, LayerKind::Continuous).unwrap();
        let categorical = e.interpolate(data.view(), 1.5, LayerKind::Categorical).unwrap();
        assert_eq!(continuous.dim(), (5, 8));
        assert_eq!(continuous.dim(), categorical.dim());
    }

    #[test]
    fn test_categorical_never_invents_classes() {
        let mask: Array2<f32> = array![[0.0, 1.0, 1.0], [0.0, 0.0, 1.0], [2.0, 0.0, 1.0]];
        let classes: HashSet<u32> = mask.iter().map(|v| v.to_bits()).collect();
        for scale in [1.0, 1.7, 2.0, 3.0, 4.5] {
            let out = engine("kriging")
                .interpolate(mask.view(), scale, LayerKind::Categorical)
                .unwrap();
            assert!(out.iter().all(|v| classes.contains(&v.to_bits())));
        }
    }

    #[test]
    fn test_degenerate_and_unsupported_inputs() {
        let empty = Array2::<f32>::zeros((0, 3));
        assert!(matches!(
            engine("bilinear").interpolate(empty.view(), 2.0, LayerKind::Continuous),
            Err(TerrawinError::DegenerateInput { .. })
        ));

        let data = array![[1.0, 2.0]];
        assert!(matches!(
            engine("bilinear").interpolate_named(data.view(), 2.0, "ordinal"),
            Err(TerrawinError::UnsupportedKind { .. })
        ));
        assert!(engine("bilinear")
            .interpolate(data.view(), 0.5, LayerKind::Continuous)
            .is_err());
    }

    #[test]
    fn test_output_cell_limit() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let e = engine("bilinear").with_max_output_cells(10_000);

        for scale in [1e12, 1e300, 51.0] {
            for kind in [LayerKind::Continuous, LayerKind::Categorical] {
                match e.interpolate(data.view(), scale, kind) {
                    Err(TerrawinError::InvalidParameter { param, .. }) => assert_eq!(param, "scale"),
                    other => panic!("Expected InvalidParameter, got {:?}", other.map(|a| a.dim())),
                }
            }
        }
        assert_eq!(
            e.interpolate(data.view(), 50.0, LayerKind::Continuous).unwrap().dim(),
            (100, 100)
        );
        assert!(matches!(
            e.resample(data.view(), (usize::MAX, 2), LayerKind::Continuous),
            Err(TerrawinError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_resample_fixed_size() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r + c) as f32);
        let e = engine("bicubic");
        let out = e.resample(data.view(), (100, 100), LayerKind::Continuous).unwrap();
        assert_eq!(out.dim(), (100, 100));
        assert!((out[[0, 0]] - 0.0).abs() < 1e-5);
        assert!((out[[99, 99]] - 18.0).abs() < 1e-4);

        let same = e.resample(data.view(), (10, 10), LayerKind::Categorical).unwrap();
        assert_eq!(same, data);
    }
}
