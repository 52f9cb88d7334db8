//! Variogram models used by kriging.
//!
//! All models are normalised to a unit partial sill. Kriging weights do not
//! depend on the sill scale, only on the ratio between nugget and sill, so
//! `nugget` is expressed as a fraction of the sill. Distances and ranges are
//! measured in source grid cells.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TerrawinError};

/// Shape of the spatial covariance model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariogramModel {
    Linear,
    Spherical,
    Exponential,
    Gaussian,
    HoleEffect,
}

impl VariogramModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariogramModel::Linear => "linear",
            VariogramModel::Spherical => "spherical",
            VariogramModel::Exponential => "exponential",
            VariogramModel::Gaussian => "gaussian",
            VariogramModel::HoleEffect => "hole-effect",
        }
    }
}

impl fmt::Display for VariogramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariogramModel {
    type Err = TerrawinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "linear" => Ok(VariogramModel::Linear),
            "spherical" => Ok(VariogramModel::Spherical),
            "exponential" => Ok(VariogramModel::Exponential),
            "gaussian" => Ok(VariogramModel::Gaussian),
            "hole-effect" => Ok(VariogramModel::HoleEffect),
            _ => Err(TerrawinError::InvalidParameter {
                param: "variogram".to_string(),
                message: format!(
                    "Unknown variogram model: {}. Must be one of: linear, spherical, exponential, gaussian, hole-effect",
                    s
                ),
            }),
        }
    }
}

/// Variogram parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variogram {
    /// Model shape
    #[serde(default = "default_model")]
    pub model: VariogramModel,

    /// Range in grid cells; `None` derives it from the window size
    #[serde(default)]
    pub range: Option<f64>,

    /// Nugget as a fraction of the sill
    #[serde(default)]
    pub nugget: f64,
}

fn default_model() -> VariogramModel {
    VariogramModel::Spherical
}

impl Default for Variogram {
    fn default() -> Self {
        Self::new(default_model())
    }
}

impl Variogram {
    pub fn new(model: VariogramModel) -> Self {
        Self {
            model,
            range: None,
            nugget: 0.0,
        }
    }

    pub fn with_range(mut self, range: f64) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_nugget(mut self, nugget: f64) -> Self {
        self.nugget = nugget;
        self
    }

    /// Effective range for a `rows x cols` window: the configured range, or
    /// half the longer side. Never below one cell.
    pub fn effective_range(&self, rows: usize, cols: usize) -> f64 {
        self.range
            .unwrap_or(rows.max(cols) as f64 / 2.0)
            .max(1.0)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.range {
            if !(range.is_finite() && range > 0.0) {
                return Err(TerrawinError::InvalidParameter {
                    param: "variogram.range".to_string(),
                    message: format!("Range must be positive, got {}", range),
                });
            }
        }
        if !(self.nugget.is_finite() && self.nugget >= 0.0) {
            return Err(TerrawinError::InvalidParameter {
                param: "variogram.nugget".to_string(),
                message: format!("Nugget must be non-negative, got {}", self.nugget),
            });
        }
        Ok(())
    }

    /// Semivariance at lag `h` for the given range. `gamma(0) == 0`.
    pub fn gamma(&self, h: f64, range: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        let ratio = h / range;
        let structured = match self.model {
            VariogramModel::Linear => ratio,
            VariogramModel::Spherical => {
                if ratio >= 1.0 {
                    1.0
                } else {
                    1.5 * ratio - 0.5 * ratio.powi(3)
                }
            }
            VariogramModel::Exponential => 1.0 - (-3.0 * ratio).exp(),
            VariogramModel::Gaussian => 1.0 - (-3.0 * ratio * ratio).exp(),
            VariogramModel::HoleEffect => {
                let scaled = 3.0 * ratio;
                1.0 - (1.0 - scaled) * (-scaled).exp()
            }
        };
        self.nugget + structured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_models() {
        assert_eq!(
            "hole_effect".parse::<VariogramModel>().unwrap(),
            VariogramModel::HoleEffect
        );
        assert_eq!(
            "Spherical".parse::<VariogramModel>().unwrap(),
            VariogramModel::Spherical
        );
        assert!("cubic".parse::<VariogramModel>().is_err());
    }

    #[test]
    fn test_gamma_at_origin_is_zero() {
        for model in [
            VariogramModel::Linear,
            VariogramModel::Spherical,
            VariogramModel::Exponential,
            VariogramModel::Gaussian,
            VariogramModel::HoleEffect,
        ] {
            let v = Variogram::new(model).with_nugget(0.1);
            assert_eq!(v.gamma(0.0, 5.0), 0.0);
            assert!(v.gamma(1.0, 5.0) > 0.0);
        }
    }

    #[test]
    fn test_spherical_reaches_sill_at_range() {
        let v = Variogram::new(VariogramModel::Spherical);
        assert!((v.gamma(5.0, 5.0) - 1.0).abs() < 1e-12);
        assert_eq!(v.gamma(50.0, 5.0), 1.0);
        assert!(v.gamma(2.0, 5.0) < v.gamma(4.0, 5.0));
    }

    #[test]
    fn test_effective_range() {
        let v = Variogram::default();
        assert_eq!(v.effective_range(10, 4), 5.0);
        assert_eq!(v.effective_range(1, 1), 1.0);
        assert_eq!(v.with_range(3.0).effective_range(10, 10), 3.0);
    }

    #[test]
    fn test_validate() {
        assert!(Variogram::default().validate().is_ok());
        assert!(Variogram::default().with_range(0.0).validate().is_err());
        assert!(Variogram::default().with_nugget(-1.0).validate().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&VariogramModel::HoleEffect).unwrap();
        assert_eq!(json, r#""hole-effect""#);
        let v: Variogram = serde_json::from_str(r#"{"model":"linear"}"#).unwrap();
        assert_eq!(v.model, VariogramModel::Linear);
        assert_eq!(v.range, None);
    }
}
