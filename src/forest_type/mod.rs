//! Forest types and the per-metric composite merge.
//!
//! Removal metrics are modeled separately per forest type, on rasters whose
//! supports are made mutually exclusive upstream: mangrove masks out planted
//! and natural forest, and planted masks out natural. Merging is therefore a
//! per-pixel sum — at any pixel at most one input is non-zero, so the
//! composite carries that single type's value, never a blend.
//!
//! The merge does not hide upstream masking bugs: if two types are non-zero
//! at the same pixel the values still sum, and [`overlap_count`] exists so
//! tests (and spot checks) can detect the violation instead of the merge
//! silently resolving it.

use crate::error::Result;
use crate::grid::TileId;
use crate::raster::{BlockLayout, InputSpec, TileOutcome, TileSetReader, TileWriter};
use ndarray::{Array2, ArrayView2};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The forest types modeled, in masking precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForestType {
    /// Highest precedence: masks out planted and natural forest.
    Mangrove,
    /// Masks out natural forest.
    PlantedForest,
    /// Lowest precedence; covers everything the other types do not claim.
    NaturalForest,
}

impl ForestType {
    /// All types, highest masking precedence first.
    pub const ALL: [ForestType; 3] = [
        ForestType::Mangrove,
        ForestType::PlantedForest,
        ForestType::NaturalForest,
    ];

    /// Stable name used in tile file patterns.
    pub fn name(&self) -> &'static str {
        match self {
            ForestType::Mangrove => "mangrove",
            ForestType::PlantedForest => "planted_forest",
            ForestType::NaturalForest => "natural_forest",
        }
    }
}

/// Sums per-type windows into one composite window.
///
/// Inputs must share a shape. Missing type rasters are represented by the
/// caller as zero arrays, so the output support is exactly the union of the
/// input supports.
pub fn merge_window(inputs: &[ArrayView2<f32>]) -> Array2<f32> {
    assert!(!inputs.is_empty());
    let mut out = Array2::<f32>::zeros(inputs[0].dim());
    for input in inputs {
        debug_assert_eq!(input.dim(), out.dim());
        out += input;
    }
    out
}

/// Counts pixels where two or more inputs are simultaneously non-zero.
///
/// Upstream masking guarantees this is 0; a positive count is a correctness
/// violation in the per-type inputs, not something the merge resolves.
pub fn overlap_count(inputs: &[ArrayView2<f32>]) -> usize {
    if inputs.is_empty() {
        return 0;
    }
    let dim = inputs[0].dim();
    let mut overlaps = 0;
    for row in 0..dim.0 {
        for col in 0..dim.1 {
            let contributors = inputs
                .iter()
                .filter(|input| input[[row, col]] != 0.0)
                .count();
            if contributors > 1 {
                overlaps += 1;
            }
        }
    }
    overlaps
}

/// Windowed per-tile driver merging per-type rasters for one metric.
pub struct ForestTypeMerger {
    window_rows: usize,
}

impl ForestTypeMerger {
    pub fn new(window_rows: usize) -> Self {
        Self { window_rows }
    }

    /// Merges the per-type rasters of one metric into a composite tile.
    ///
    /// Every input is optional: a type with no raster for this tile
    /// contributes zeros. If no type has a raster at all the tile is
    /// skipped — there is nothing to define the grid, let alone merge.
    pub fn merge_tile(
        &self,
        tile: &TileId,
        per_type: &[(ForestType, PathBuf)],
        out_path: &Path,
    ) -> Result<TileOutcome> {
        let present: Vec<&PathBuf> = per_type
            .iter()
            .map(|(_, path)| path)
            .filter(|path| path.exists())
            .collect();
        if present.is_empty() {
            warn!(%tile, "no forest type raster present, skipping merge");
            return Ok(TileOutcome::Skipped(per_type[0].1.clone()));
        }
        info!(
            %tile,
            types = present.len(),
            "merging forest type rasters"
        );

        let set: Vec<InputSpec> = per_type
            .iter()
            .map(|(_, path)| InputSpec::optional(path))
            .collect();
        let reader = TileSetReader::open(&set)?;
        let mut writer =
            TileWriter::<f32>::create(out_path, reader.spec(), BlockLayout::RowStripes)?;

        for window in reader.stripes(self.window_rows).iter() {
            let mut arrays = Vec::with_capacity(per_type.len());
            for index in 0..per_type.len() {
                arrays.push(reader.read_window::<f32>(index, &window)?);
            }
            let views: Vec<ArrayView2<f32>> = arrays.iter().map(|a| a.view()).collect();
            let merged = merge_window(&views);
            writer.write_window(&window, &merged)?;
        }

        writer.finish()
    }
}
