//! Spatial index over a catalog of tiles.
//!
//! Each entry stores the closed bounding box spanned by a tile's axes. A
//! lookup scans every entry and returns the first whose box contains the
//! coordinate; a coordinate outside all boxes yields `None`, which callers
//! treat as an ordinary outcome.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::data_loader::{is_tile_file, read_tile_bounds, tile_name};
use crate::error::{Result, TerrawinError};
use crate::tile::{BoundingBox, Coordinate};

/// One tile in the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileEntry {
    /// Tile identity
    pub name: String,
    /// File backing the tile
    pub path: PathBuf,
    /// Closed bounding box of the tile axes
    pub bbox: BoundingBox,
}

impl TileEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, bbox: BoundingBox) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            bbox,
        }
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        self.bbox.contains(coord)
    }
}

/// Bounding-box list over all catalog entries
#[derive(Debug, Clone, Default)]
pub struct TileIndex {
    entries: Vec<TileEntry>,
}

impl TileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TileEntry>) -> Self {
        Self { entries }
    }

    /// Build an index from every tile file in `dir`.
    ///
    /// Files whose axes cannot be read are logged and left out; a missing or
    /// unreadable directory is an error.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TerrawinError::Config {
                message: format!("Tile directory does not exist: {}", dir.display()),
            });
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_tile_file(p))
            .collect();
        paths.sort();

        let mut index = Self::new();
        for path in paths {
            match read_tile_bounds(&path) {
                Ok(bbox) => index.insert(TileEntry::new(tile_name(&path), path, bbox)),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable tile"
                ),
            }
        }

        info!(
            directory = %dir.display(),
            tiles = index.len(),
            "Tile index built"
        );
        Ok(index)
    }

    pub fn insert(&mut self, entry: TileEntry) {
        self.entries.push(entry);
    }

    /// First tile containing `coord`, scanning every entry.
    pub fn locate(&self, coord: Coordinate) -> Option<&TileEntry> {
        self.entries.iter().find(|e| e.contains(coord))
    }

    /// All tiles containing `coord`.
    ///
    /// Adjacent archive tiles share their edges, so an edge coordinate
    /// matches both. Split sub-tiles do not touch; see [`crate::splitter`].
    pub fn locate_all(&self, coord: Coordinate) -> impl Iterator<Item = &TileEntry> {
        self.entries.iter().filter(move |e| e.contains(coord))
    }

    pub fn get(&self, name: &str) -> Option<&TileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[TileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Test a single candidate file: its path if it covers `coord`, else `None`.
pub fn choose_tile(path: &Path, coord: Coordinate) -> Result<Option<PathBuf>> {
    let bbox = read_tile_bounds(path)?;
    Ok(bbox.contains(coord).then(|| path.to_path_buf()))
}
