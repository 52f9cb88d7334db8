//! Tile splitting for batch preprocessing.
//!
//! A source tile is cut into a `grid_rows x grid_cols` grid of equal blocks
//! by plain index slicing. Every block of every layer is resampled to
//! `output_size x output_size` with the method its kind calls for, and the
//! block's axes are resampled linearly on the same output positions. Each
//! grid cell becomes an ordinary tile named after its parent and position.
//!
//! A sub-tile's axes span the first to the last source sample of its block,
//! so neighbouring sub-tiles do not touch: the one source cell between the
//! last sample of a block and the first sample of the next is covered by
//! neither, and [`TileIndex::locate`](crate::tile_index::TileIndex::locate)
//! finds nothing there in a split catalog.
//!
//! [`split_directory`] drives the job over a whole directory on a bounded
//! worker pool. A file that fails is logged and skipped; sub-tiles are
//! written atomically, so a rerun with `overwrite = false` resumes where a
//! crashed run stopped.

use ndarray::s;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::data_loader::{is_tile_file, load_tile, write_tile, OUTPUT_EXTENSION};
use crate::error::{Result, TerrawinError};
use crate::interpolation::bilinear::sample_1d;
use crate::interpolation::common::aligned_positions;
use crate::interpolation::InterpolationEngine;
use crate::logging::{log_batch_summary, log_error, log_operation_end, log_operation_start};
use crate::tile::RasterTile;

/// Grid and output size of a split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub grid_rows: usize,
    pub grid_cols: usize,
    /// Side length of every sub-tile layer
    pub output_size: usize,
}

impl SplitPlan {
    pub fn new(grid_rows: usize, grid_cols: usize, output_size: usize) -> Self {
        Self {
            grid_rows,
            grid_cols,
            output_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (param, value) in [
            ("grid_rows", self.grid_rows),
            ("grid_cols", self.grid_cols),
            ("output_size", self.output_size),
        ] {
            if value == 0 {
                return Err(TerrawinError::InvalidParameter {
                    param: param.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.grid_rows * self.grid_cols
    }

    /// Names of every sub-tile of `parent`, row-major
    pub fn cell_names(&self, parent: &str) -> Vec<String> {
        (0..self.grid_rows)
            .flat_map(|r| (0..self.grid_cols).map(move |c| sub_tile_name(parent, r, c)))
            .collect()
    }
}

/// Name of the sub-tile at (`row`, `col`) of `parent`.
///
/// Archive names end in a latitude and a longitude component
/// (`AG100.v003.-01.-066`); the row goes after the latitude and the column
/// after the longitude (`AG100.v003.-01.3.-066.7`). Other names get
/// `.{row}.{col}` appended.
pub fn sub_tile_name(parent: &str, row: usize, col: usize) -> String {
    let parts: Vec<&str> = parent.split('.').collect();
    let is_coord = |s: &str| {
        let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    };

    if parts.len() >= 3 && is_coord(parts[parts.len() - 2]) && is_coord(parts[parts.len() - 1]) {
        let head = parts[..parts.len() - 2].join(".");
        format!(
            "{}.{}.{}.{}.{}",
            head,
            parts[parts.len() - 2],
            row,
            parts[parts.len() - 1],
            col
        )
    } else {
        format!("{}.{}.{}", parent, row, col)
    }
}

/// Split `len` indices into `parts` equal, contiguous ranges.
pub fn block_ranges(tile: &str, axis: &str, len: usize, parts: usize) -> Result<Vec<Range<usize>>> {
    if parts == 0 || len % parts != 0 {
        return Err(TerrawinError::InvalidGeometry {
            tile: tile.to_string(),
            message: format!(
                "{} axis of length {} cannot be split into {} equal blocks",
                axis, len, parts
            ),
        });
    }
    let block = len / parts;
    Ok((0..parts).map(|i| i * block..(i + 1) * block).collect())
}

/// Split one tile into resampled sub-tiles, processing grid cells in parallel.
pub fn split_tile(
    tile: &RasterTile,
    plan: &SplitPlan,
    engine: &InterpolationEngine,
) -> Result<Vec<RasterTile>> {
    plan.validate()?;
    tile.validate()?;

    let (rows, cols) = tile.shape();
    let row_ranges = block_ranges(&tile.name, "Latitude", rows, plan.grid_rows)?;
    let col_ranges = block_ranges(&tile.name, "Longitude", cols, plan.grid_cols)?;

    if plan.output_size > 1 && (row_ranges[0].len() < 2 || col_ranges[0].len() < 2) {
        return Err(TerrawinError::InvalidGeometry {
            tile: tile.name.clone(),
            message: format!(
                "Blocks of {}x{} cells are too small to resample to {}",
                row_ranges[0].len(),
                col_ranges[0].len(),
                plan.output_size
            ),
        });
    }

    let cells: Vec<(usize, usize)> = (0..plan.grid_rows)
        .flat_map(|r| (0..plan.grid_cols).map(move |c| (r, c)))
        .collect();

    cells
        .into_par_iter()
        .map(|(r, c)| {
            split_cell(
                tile,
                plan,
                engine,
                (r, c),
                row_ranges[r].clone(),
                col_ranges[c].clone(),
            )
        })
        .collect()
}

fn split_cell(
    tile: &RasterTile,
    plan: &SplitPlan,
    engine: &InterpolationEngine,
    (row, col): (usize, usize),
    rows: Range<usize>,
    cols: Range<usize>,
) -> Result<RasterTile> {
    let out = plan.output_size;
    let latitude = sample_1d(
        &tile.latitude[rows.clone()],
        &aligned_positions(rows.len(), out),
    );
    let longitude = sample_1d(
        &tile.longitude[cols.clone()],
        &aligned_positions(cols.len(), out),
    );

    let mut sub = RasterTile::new(sub_tile_name(&tile.name, row, col), latitude, longitude);
    for (path, data) in &tile.layers {
        let block = data.slice(s![rows.clone(), cols.clone()]);
        let resampled = engine
            .resample(block, (out, out), path.kind())
            .map_err(|e| match e {
                TerrawinError::Interpolation { message } => TerrawinError::Interpolation {
                    message: format!(
                        "{} cell ({}, {}) layer {}: {}",
                        tile.name, row, col, path, message
                    ),
                },
                other => other,
            })?;
        sub.insert_layer(path.clone(), resampled)?;
    }

    debug!(tile = %tile.name, row = row, col = col, "Cell resampled");
    Ok(sub)
}

/// Outcome of splitting one source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub written: usize,
    pub skipped: usize,
}

/// Split one tile file and write its sub-tiles into `output_dir`.
///
/// Existing sub-tiles are kept unless `overwrite` is set; when all of them
/// already exist the source is not even loaded.
pub fn split_file(
    input: &Path,
    output_dir: &Path,
    plan: &SplitPlan,
    engine: &InterpolationEngine,
    overwrite: bool,
) -> Result<FileOutcome> {
    let output_path = |name: &str| output_dir.join(format!("{}.{}", name, OUTPUT_EXTENSION));

    if !overwrite {
        let parent = crate::data_loader::tile_name(input);
        let all_present = plan
            .cell_names(&parent)
            .iter()
            .all(|name| output_path(name).exists());
        if all_present {
            return Ok(FileOutcome {
                written: 0,
                skipped: plan.cell_count(),
            });
        }
    }

    let tile = load_tile(input, None)?;
    let sub_tiles = split_tile(&tile, plan, engine)?;

    let written = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    sub_tiles.par_iter().try_for_each(|sub| -> Result<()> {
        let path = output_path(&sub.name);
        if !overwrite && path.exists() {
            skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        write_tile(sub, &path)?;
        written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;

    Ok(FileOutcome {
        written: written.into_inner(),
        skipped: skipped.into_inner(),
    })
}

/// Options of a directory run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Worker threads; `None` uses one per core
    pub workers: Option<usize>,
    /// Rewrite sub-tiles that already exist
    pub overwrite: bool,
}

/// Summary of a directory run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Source files split successfully
    pub processed: usize,
    /// Sub-tiles written
    pub written: usize,
    /// Sub-tiles left in place from an earlier run
    pub skipped: usize,
    /// Source files that failed, with the error
    pub failed: Vec<(PathBuf, String)>,
}

/// Split every tile file in `input_dir` into `output_dir`.
///
/// A missing input or output directory is fatal. Per-file failures are
/// logged and collected in the report while the remaining files continue.
pub fn split_directory(
    input_dir: &Path,
    output_dir: &Path,
    plan: &SplitPlan,
    engine: &InterpolationEngine,
    options: &BatchOptions,
) -> Result<BatchReport> {
    plan.validate()?;
    if !input_dir.is_dir() {
        return Err(TerrawinError::Config {
            message: format!("Input directory does not exist: {}", input_dir.display()),
        });
    }
    if !output_dir.is_dir() {
        return Err(TerrawinError::Config {
            message: format!("Output directory does not exist: {}", output_dir.display()),
        });
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_tile_file(p))
        .collect();
    files.sort();

    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        files = files.len(),
        grid = %format!("{}x{}", plan.grid_rows, plan.grid_cols),
        output_size = plan.output_size,
        "Starting batch split"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .build()
        .map_err(|e| TerrawinError::Config {
            message: format!("Failed to build worker pool: {}", e),
        })?;

    let remaining = AtomicUsize::new(files.len());
    let outcomes: Vec<(PathBuf, Result<FileOutcome>)> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let details = file.display().to_string();
                log_operation_start("split_file", Some(&details));
                let start = Instant::now();
                let outcome = split_file(file, output_dir, plan, engine, options.overwrite);
                log_operation_end("split_file", start, outcome.is_ok());
                let left = remaining.fetch_sub(1, Ordering::Relaxed) - 1;
                if let Ok(done) = &outcome {
                    info!(
                        file = %details,
                        written = done.written,
                        skipped = done.skipped,
                        remaining = left,
                        "Tile split"
                    );
                }
                (file.clone(), outcome)
            })
            .collect()
    });

    let mut report = BatchReport::default();
    for (file, outcome) in outcomes {
        match outcome {
            Ok(done) => {
                report.processed += 1;
                report.written += done.written;
                report.skipped += done.skipped;
            }
            Err(e) => {
                log_error(&e, &format!("splitting {}", file.display()));
                warn!(file = %file.display(), "Skipping file after failure");
                report.failed.push((file, e.to_string()));
            }
        }
    }

    log_batch_summary(
        report.processed,
        report.written,
        report.skipped,
        report.failed.len(),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::bicubic::BicubicInterpolator;
    use crate::tile::{Coordinate, LayerKind, LayerPath};
    use ndarray::Array2;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn engine() -> InterpolationEngine {
        InterpolationEngine::new(Arc::new(BicubicInterpolator))
    }

    fn source_tile(n: usize) -> RasterTile {
        let latitude: Vec<f64> = (0..n).map(|i| 1.0 - i as f64 / n as f64).collect();
        let longitude: Vec<f64> = (0..n).map(|i| -67.0 + i as f64 / n as f64).collect();
        RasterTile::new("AG100.v003.-01.-067", latitude, longitude)
            .with_layer(
                LayerPath::new("ASTER GDEM", "ASTGDEM"),
                Array2::from_shape_fn((n, n), |(r, c)| (r + c) as f32),
            )
            .unwrap()
            .with_layer(
                LayerPath::new("Land Water Map", "LWmap"),
                Array2::from_shape_fn((n, n), |(r, c)| ((r / 3 + c / 5) % 2) as f32),
            )
            .unwrap()
    }

    #[test]
    fn test_sub_tile_name() {
        assert_eq!(
            sub_tile_name("AG100.v003.-01.-066", 3, 7),
            "AG100.v003.-01.3.-066.7"
        );
        assert_eq!(sub_tile_name("AG100.v003.12.+045", 0, 0), "AG100.v003.12.0.+045.0");
        assert_eq!(sub_tile_name("region", 1, 2), "region.1.2");
        assert_eq!(sub_tile_name("a.-1", 1, 2), "a.-1.1.2");
    }

    #[test]
    fn test_block_ranges() {
        let ranges = block_ranges("t", "Latitude", 1000, 10).unwrap();
        assert_eq!(ranges.len(), 10);
        assert_eq!(ranges[0], 0..100);
        assert_eq!(ranges[9], 900..1000);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(block_ranges("t", "Latitude", 1000, 3).is_err());
    }

    #[test]
    fn test_plan_validation() {
        assert!(SplitPlan::new(10, 10, 100).validate().is_ok());
        assert!(SplitPlan::new(0, 10, 100).validate().is_err());
        assert!(SplitPlan::new(10, 10, 0).validate().is_err());
        assert_eq!(SplitPlan::new(2, 3, 5).cell_names("x").len(), 6);
    }

    #[test]
    fn test_split_tile_shapes_and_names() {
        let tile = source_tile(40);
        let plan = SplitPlan::new(4, 2, 25);
        let subs = split_tile(&tile, &plan, &engine()).unwrap();
        assert_eq!(subs.len(), 8);

        let names: HashSet<String> = subs.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains("AG100.v003.-01.3.-067.1"));

        for sub in &subs {
            assert_eq!(sub.shape(), (25, 25));
            assert_eq!(sub.layers.len(), 2);
            assert!(sub.validate().is_ok());
        }
    }

    #[test]
    fn test_split_preserves_axes_and_classes() {
        let tile = source_tile(20);
        let subs = split_tile(&tile, &SplitPlan::new(2, 2, 30), &engine()).unwrap();
        let first = subs
            .iter()
            .find(|t| t.name == "AG100.v003.-01.0.-067.0")
            .unwrap();
        assert_eq!(first.latitude[0], tile.latitude[0]);
        assert!((first.latitude[29] - tile.latitude[9]).abs() < 1e-12);
        assert_eq!(first.longitude[0], tile.longitude[0]);

        let mask = LayerPath::new("Land Water Map", "LWmap");
        assert_eq!(mask.kind(), LayerKind::Categorical);
        for sub in &subs {
            assert!(sub.layer(&mask).unwrap().iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }

    #[test]
    fn test_neighbouring_sub_tiles_leave_a_cell_gap() {
        let tile = source_tile(20);
        let subs = split_tile(&tile, &SplitPlan::new(2, 2, 30), &engine()).unwrap();
        let bbox_of = |name: &str| {
            subs.iter()
                .find(|t| t.name == name)
                .unwrap()
                .bounding_box()
                .unwrap()
        };
        let top = bbox_of("AG100.v003.-01.0.-067.0");
        let bottom = bbox_of("AG100.v003.-01.1.-067.0");

        // Latitude descends: block 0 ends at sample 9, block 1 starts at 10
        assert!((top.lat_min - tile.latitude[9]).abs() < 1e-12);
        assert!((bottom.lat_max - tile.latitude[10]).abs() < 1e-12);

        let between = Coordinate::new(
            (tile.latitude[9] + tile.latitude[10]) / 2.0,
            tile.longitude[2],
        );
        assert!(!top.contains(between));
        assert!(!bottom.contains(between));
        assert!(tile.bounding_box().unwrap().contains(between));
    }

    #[test]
    fn test_split_rejects_uneven_grid() {
        let tile = source_tile(10);
        let result = split_tile(&tile, &SplitPlan::new(3, 3, 10), &engine());
        assert!(matches!(result, Err(TerrawinError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_split_directory_requires_output_dir() {
        let input = tempfile::tempdir().unwrap();
        let result = split_directory(
            input.path(),
            Path::new("/nonexistent/output"),
            &SplitPlan::new(1, 1, 1),
            &engine(),
            &BatchOptions::default(),
        );
        assert!(matches!(result, Err(TerrawinError::Config { .. })));
    }
}
