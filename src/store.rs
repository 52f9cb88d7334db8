//! Store of the most recently computed layer arrays.
//!
//! A pipeline run publishes all of its layers in one step under a single
//! write lock, so readers never observe a mix of two runs. Lookups are pure:
//! they never trigger computation and report an empty result when nothing
//! has been published for a key yet.
//!
//! Serving clients address layers with an escaped key where `/` becomes `-`
//! and spaces become `_` (`ASTER GDEM/ASTGDEM` is `ASTER_GDEM-ASTGDEM`).

use ndarray::Array2;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::tile::{Coordinate, LayerPath};

/// Escape a layer path into a serving key
pub fn encode_layer_key(path: &LayerPath) -> String {
    path.to_string().replace('/', "-").replace(' ', "_")
}

/// Map a serving key back to the layer path it names.
pub fn decode_layer_key(key: &str) -> Result<LayerPath> {
    LayerPath::parse(&key.replace('-', "/").replace('_', " "))
}

/// One published layer
#[derive(Debug, Clone)]
pub struct StoredLayer {
    pub data: Arc<Array2<f32>>,
    /// Tile the layer was computed from
    pub tile: String,
    /// Coordinate the window was centred on
    pub coordinate: Coordinate,
    /// Sequence number of the run that published it
    pub run: u64,
}

/// Summary of a stored layer, without its data
#[derive(Debug, Clone, Serialize)]
pub struct StoredLayerInfo {
    pub key: String,
    pub layer: String,
    pub tile: String,
    pub shape: (usize, usize),
    pub run: u64,
}

/// Shared store of the latest array per layer
#[derive(Debug, Default)]
pub struct LayerStore {
    layers: RwLock<HashMap<LayerPath, StoredLayer>>,
    runs: AtomicU64,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored arrays for every layer in `layers` at once.
    ///
    /// Returns the run number assigned to this publication.
    pub fn publish(
        &self,
        tile: &str,
        coordinate: Coordinate,
        layers: Vec<(LayerPath, Array2<f32>)>,
    ) -> u64 {
        let mut guard = self.layers.write();
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        for (path, data) in layers {
            guard.insert(
                path,
                StoredLayer {
                    data: Arc::new(data),
                    tile: tile.to_string(),
                    coordinate,
                    run,
                },
            );
        }
        run
    }

    pub fn get(&self, path: &LayerPath) -> Option<StoredLayer> {
        self.layers.read().get(path).cloned()
    }

    /// Look up a layer by its escaped key
    pub fn get_by_key(&self, key: &str) -> Result<Option<StoredLayer>> {
        let path = decode_layer_key(key)?;
        Ok(self.get(&path))
    }

    /// Summaries of all stored layers, sorted by key
    pub fn list(&self) -> Vec<StoredLayerInfo> {
        let guard = self.layers.read();
        let mut infos: Vec<StoredLayerInfo> = guard
            .iter()
            .map(|(path, stored)| StoredLayerInfo {
                key: encode_layer_key(path),
                layer: path.to_string(),
                tile: stored.tile.clone(),
                shape: stored.data.dim(),
                run: stored.run,
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    pub fn len(&self) -> usize {
        self.layers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.read().is_empty()
    }

    /// Approximate bytes held by stored arrays
    pub fn memory_bytes(&self) -> usize {
        self.layers
            .read()
            .values()
            .map(|l| l.data.len() * std::mem::size_of::<f32>())
            .sum()
    }

    pub fn clear(&self) {
        self.layers.write().clear();
    }
}
