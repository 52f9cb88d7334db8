//! Configuration management for terrawin.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`TERRAWIN_*`)
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TerrawinError};
use crate::interpolation::kriging::DEFAULT_MAX_CONTROL_POINTS;
use crate::interpolation::variogram::Variogram;
use crate::interpolation::{get_surface_model, InterpolationEngine, SURFACE_MODELS};
use crate::splitter::{BatchOptions, SplitPlan};
use crate::window::LENGTH_DIVISOR;

/// Surface model used by the splitter for continuous layers
pub const SPLIT_SURFACE_MODEL: &str = "bicubic";

/// Command-line arguments for terrawin
#[derive(Parser, Debug)]
#[command(name = "terrawin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve terrain windows over HTTP
    Serve(ServeArgs),
    /// Split every tile in a directory into resampled sub-tiles
    Split(SplitArgs),
}

/// Options shared by all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Path to JSON configuration file
    #[arg(short, long, env = "TERRAWIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TERRAWIN_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Directory holding the tile catalog
    #[arg(long, env = "TERRAWIN_TILE_DIR")]
    pub tile_dir: Option<PathBuf>,

    /// Host address to bind to
    #[arg(short = 'H', long, env = "TERRAWIN_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TERRAWIN_PORT")]
    pub port: Option<u16>,

    /// Number of worker threads
    #[arg(short, long, env = "TERRAWIN_WORKERS")]
    pub workers: Option<usize>,

    /// Surface model for continuous layers (nearest, bilinear, bicubic, kriging)
    #[arg(long, env = "TERRAWIN_SURFACE_MODEL")]
    pub surface_model: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Directory of source tiles
    pub input_dir: PathBuf,

    /// Existing directory that receives the sub-tiles
    pub output_dir: PathBuf,

    /// Grid rows per source tile
    #[arg(long, env = "TERRAWIN_GRID_ROWS")]
    pub grid_rows: Option<usize>,

    /// Grid columns per source tile
    #[arg(long, env = "TERRAWIN_GRID_COLS")]
    pub grid_cols: Option<usize>,

    /// Side length of every sub-tile
    #[arg(long, env = "TERRAWIN_OUTPUT_SIZE")]
    pub output_size: Option<usize>,

    /// Number of tiles processed concurrently
    #[arg(short, long, env = "TERRAWIN_WORKERS")]
    pub workers: Option<usize>,

    /// Rewrite sub-tiles that already exist
    #[arg(long, env = "TERRAWIN_OVERWRITE")]
    pub overwrite: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Serve(args) => &args.common,
            Command::Split(args) => &args.common,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Tile data and interpolation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the tile catalog
    #[serde(default)]
    pub tile_dir: Option<PathBuf>,

    /// Default requested size for terrain windows
    #[serde(default = "default_target_size")]
    pub target_size: usize,

    /// Default upsampling factor
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,

    /// Surface model for continuous layers
    #[serde(default = "default_surface_model")]
    pub surface_model: String,

    /// Variogram used by kriging
    #[serde(default)]
    pub variogram: Variogram,

    /// Limit on a single surface evaluation; 0 disables it.
    ///
    /// Checked between units of work. The kriging solve itself is not
    /// interruptible, so its worst case is bounded by `max_control_points`.
    #[serde(default = "default_fit_timeout_ms")]
    pub fit_timeout_ms: u64,

    /// Largest interpolated layer (rows x cols) a request may produce
    #[serde(default = "default_max_output_cells")]
    pub max_output_cells: usize,

    /// Largest window kriging will fit
    #[serde(default = "default_max_control_points")]
    pub max_control_points: usize,
}

/// Batch split configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_grid")]
    pub grid_rows: usize,

    #[serde(default = "default_grid")]
    pub grid_cols: usize,

    #[serde(default = "default_output_size")]
    pub output_size: usize,

    /// Concurrent tiles (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub overwrite: bool,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Data configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Split configuration
    #[serde(default)]
    pub split: SplitConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Parse the command line and load configuration from all sources
    pub fn load() -> Result<(Self, Command)> {
        let cli = Cli::parse();
        let config = Self::from_command(&cli.command)?;
        Ok((config, cli.command))
    }

    /// Build the configuration for a parsed subcommand
    pub fn from_command(command: &Command) -> Result<Self> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &command.common().config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments and environment
        config.apply_args(command);
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TerrawinError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.server.host = other.server.host;
        self.server.port = other.server.port;
        if other.server.workers.is_some() {
            self.server.workers = other.server.workers;
        }
        let tile_dir = other.data.tile_dir.clone().or_else(|| self.data.tile_dir.take());
        self.data = DataConfig {
            tile_dir,
            ..other.data
        };
        let workers = other.split.workers.or(self.split.workers);
        self.split = SplitConfig {
            workers,
            ..other.split
        };
        self.log_level = other.log_level;
    }

    fn apply_args(&mut self, command: &Command) {
        if let Some(level) = &command.common().log_level {
            self.log_level = level.clone();
        }
        match command {
            Command::Serve(args) => {
                if let Some(dir) = &args.tile_dir {
                    self.data.tile_dir = Some(dir.clone());
                }
                if let Some(host) = &args.host {
                    self.server.host = host.clone();
                }
                if let Some(port) = args.port {
                    self.server.port = port;
                }
                if args.workers.is_some() {
                    self.server.workers = args.workers;
                }
                if let Some(model) = &args.surface_model {
                    self.data.surface_model = model.clone();
                }
            }
            Command::Split(args) => {
                if let Some(rows) = args.grid_rows {
                    self.split.grid_rows = rows;
                }
                if let Some(cols) = args.grid_cols {
                    self.split.grid_cols = cols;
                }
                if let Some(size) = args.output_size {
                    self.split.output_size = size;
                }
                if args.workers.is_some() {
                    self.split.workers = args.workers;
                }
                if args.overwrite {
                    self.split.overwrite = true;
                }
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate server host (must be a valid IP or hostname)
        if self.server.host.is_empty() {
            return Err(TerrawinError::Config {
                message: "Server host cannot be empty".to_string(),
            });
        }

        // Validate port (0 is not a valid port for users)
        if self.server.port == 0 {
            return Err(TerrawinError::Config {
                message: "Server port cannot be 0".to_string(),
            });
        }

        // Validate log level
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(TerrawinError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        if !SURFACE_MODELS.contains(&self.data.surface_model.to_lowercase().as_str()) {
            return Err(TerrawinError::Config {
                message: format!(
                    "Invalid surface model: {}. Must be one of: {}",
                    self.data.surface_model,
                    SURFACE_MODELS.join(", ")
                ),
            });
        }

        self.data
            .variogram
            .validate()
            .map_err(|e| TerrawinError::Config {
                message: e.to_string(),
            })?;

        if self.data.target_size < LENGTH_DIVISOR {
            return Err(TerrawinError::Config {
                message: format!(
                    "target_size must be at least {}, got {}",
                    LENGTH_DIVISOR, self.data.target_size
                ),
            });
        }

        if !(self.data.scale_factor.is_finite() && self.data.scale_factor >= 1.0) {
            return Err(TerrawinError::Config {
                message: format!(
                    "scale_factor must be at least 1, got {}",
                    self.data.scale_factor
                ),
            });
        }

        if self.data.max_output_cells == 0 {
            return Err(TerrawinError::Config {
                message: "max_output_cells cannot be 0".to_string(),
            });
        }

        if self.data.max_control_points == 0 {
            return Err(TerrawinError::Config {
                message: "max_control_points cannot be 0".to_string(),
            });
        }

        if self.split.grid_rows == 0 || self.split.grid_cols == 0 || self.split.output_size == 0 {
            return Err(TerrawinError::Config {
                message: format!(
                    "Split grid {}x{} and output size {} must all be non-zero",
                    self.split.grid_rows, self.split.grid_cols, self.split.output_size
                ),
            });
        }

        if self.server.workers == Some(0) || self.split.workers == Some(0) {
            return Err(TerrawinError::Config {
                message: "Worker count cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

impl DataConfig {
    pub fn fit_timeout(&self) -> Option<Duration> {
        (self.fit_timeout_ms > 0).then(|| Duration::from_millis(self.fit_timeout_ms))
    }

    /// Interpolation engine for serving requests
    pub fn engine(&self) -> Result<InterpolationEngine> {
        let surface = get_surface_model(
            &self.surface_model,
            self.variogram,
            self.max_control_points,
        )?;
        let engine =
            InterpolationEngine::new(surface).with_max_output_cells(self.max_output_cells);
        Ok(match self.fit_timeout() {
            Some(timeout) => engine.with_timeout(timeout),
            None => engine,
        })
    }
}

impl SplitConfig {
    pub fn plan(&self) -> SplitPlan {
        SplitPlan::new(self.grid_rows, self.grid_cols, self.output_size)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            workers: self.workers,
            overwrite: self.overwrite,
        }
    }

    /// Engine used for sub-tile resampling
    pub fn engine(&self) -> Result<InterpolationEngine> {
        let surface = get_surface_model(
            SPLIT_SURFACE_MODEL,
            Variogram::default(),
            DEFAULT_MAX_CONTROL_POINTS,
        )?;
        Ok(InterpolationEngine::new(surface))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            split: SplitConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            tile_dir: None,
            target_size: default_target_size(),
            scale_factor: default_scale_factor(),
            surface_model: default_surface_model(),
            variogram: Variogram::default(),
            fit_timeout_ms: default_fit_timeout_ms(),
            max_output_cells: default_max_output_cells(),
            max_control_points: default_max_control_points(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            grid_rows: default_grid(),
            grid_cols: default_grid(),
            output_size: default_output_size(),
            workers: None,
            overwrite: false,
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_target_size() -> usize {
    1000
}

fn default_scale_factor() -> f64 {
    10.0
}

fn default_surface_model() -> String {
    "kriging".to_string()
}

fn default_fit_timeout_ms() -> u64 {
    30_000
}

fn default_max_output_cells() -> usize {
    4_000_000
}

fn default_max_control_points() -> usize {
    DEFAULT_MAX_CONTROL_POINTS
}

fn default_grid() -> usize {
    10
}

fn default_output_size() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::variogram::VariogramModel;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.data.target_size, 1000);
        assert_eq!(config.data.scale_factor, 10.0);
        assert_eq!(config.data.surface_model, "kriging");
        assert_eq!(config.data.variogram.model, VariogramModel::Spherical);
        assert_eq!(config.data.fit_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.split.plan(), SplitPlan::new(10, 10, 100));
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "server": { "port": 9000 },
                "data": { "surface_model": "bicubic", "variogram": { "model": "hole-effect" } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.data.surface_model, "bicubic");
        assert_eq!(config.data.variogram.model, VariogramModel::HoleEffect);
        assert_eq!(config.split.grid_rows, 10);
    }

    #[test]
    fn test_config_merge() {
        let mut config1 = Config::default();
        let mut config2 = Config::default();

        config2.server.port = 9000;
        config2.server.workers = Some(4);
        config2.split.grid_rows = 5;

        config1.merge(config2);

        assert_eq!(config1.server.port, 9000);
        assert_eq!(config1.server.workers, Some(4));
        assert_eq!(config1.split.grid_rows, 5);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "server": {{ "port": 9100 }}, "split": {{ "grid_rows": 4, "output_size": 50 }}, "log_level": "debug" }}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from([
            "terrawin", "split", "in", "out", "--grid-rows", "2", "--overwrite", "--config", path,
        ])
        .unwrap();
        let config = Config::from_command(&cli.command).unwrap();
        assert_eq!(config.split.grid_rows, 2);
        assert_eq!(config.split.grid_cols, 10);
        assert_eq!(config.split.output_size, 50);
        assert!(config.split.overwrite);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.log_level, "debug");

        let cli = Cli::try_parse_from([
            "terrawin", "serve", "--tile-dir", "/tiles", "-p", "7000", "--config", path,
        ])
        .unwrap();
        let config = Config::from_command(&cli.command).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.data.tile_dir, Some(PathBuf::from("/tiles")));
    }

    #[test]
    fn test_config_validation() {
        // Valid config should pass
        let config = Config::default();
        assert!(config.validate().is_ok());

        // Test invalid host
        let mut config = Config::default();
        config.server.host = "".to_string();
        assert!(config.validate().is_err());

        // Test invalid port
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        // Test invalid log level
        let mut config = Config::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        // Test invalid surface model
        let mut config = Config::default();
        config.data.surface_model = "spline".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.scale_factor = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.target_size = 99;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.split.grid_cols = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.variogram.nugget = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.max_output_cells = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engines() {
        let config = Config::default();
        let engine = config.data.engine().unwrap();
        assert_eq!(engine.surface_name(), "kriging");
        let huge = ndarray::Array2::<f32>::zeros((10, 10));
        assert!(matches!(
            engine.interpolate(huge.view(), 1e6, crate::tile::LayerKind::Continuous),
            Err(TerrawinError::InvalidParameter { .. })
        ));
        assert_eq!(config.split.engine().unwrap().surface_name(), "bicubic");
    }
}
