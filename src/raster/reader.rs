//! Aligned multi-input windowed reads.

use super::window::{Window, WindowPlan};
use super::RasterSpec;
use crate::error::{FluxError, Result};
use gdal::raster::GdalType;
use gdal::Dataset;
use ndarray::Array2;
use std::path::PathBuf;
use tracing::debug;

/// One input raster of a stage, required or optional.
///
/// An optional input that does not exist on disk is not an error: its
/// windows read as all zeros (the shared nodata value). This replaces the
/// original "try the tile, fall back to zeros on failure" control flow with
/// an explicit contract.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub path: PathBuf,
    pub optional: bool,
}

impl InputSpec {
    /// A raster that must exist; a missing file is `MissingInputTile`.
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: false,
        }
    }

    /// A raster that may be absent; missing files read as zeros.
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            optional: true,
        }
    }
}

/// A set of spatially aligned single-band inputs for one tile.
///
/// The first present input defines the tile's [`RasterSpec`]; every other
/// present input must align with it exactly, otherwise the stage fails for
/// this tile with `SpatialMismatch`.
#[derive(Debug)]
pub struct TileSetReader {
    spec: RasterSpec,
    inputs: Vec<Option<Dataset>>,
}

impl TileSetReader {
    /// Opens a set of inputs, verifying spatial alignment.
    ///
    /// At least one input must be present on disk to define the tile grid;
    /// if none is, the first path is reported as missing.
    pub fn open(inputs: &[InputSpec]) -> Result<Self> {
        assert!(!inputs.is_empty(), "a stage must declare at least one input");

        let mut datasets: Vec<Option<Dataset>> = Vec::with_capacity(inputs.len());
        let mut spec: Option<RasterSpec> = None;

        for input in inputs {
            if !input.path.exists() {
                if input.optional {
                    debug!(path = %input.path.display(), "optional input absent, reading as zeros");
                    datasets.push(None);
                    continue;
                }
                return Err(FluxError::MissingInputTile {
                    path: input.path.clone(),
                });
            }
            let dataset = Dataset::open(&input.path)?;
            let this_spec = RasterSpec::from_dataset(&dataset)?;
            match &spec {
                Some(spec) => spec.ensure_aligned(&this_spec, &input.path)?,
                None => spec = Some(this_spec),
            }
            datasets.push(Some(dataset));
        }

        let spec = spec.ok_or_else(|| FluxError::MissingInputTile {
            path: inputs[0].path.clone(),
        })?;

        Ok(Self {
            spec,
            inputs: datasets,
        })
    }

    /// Spatial description shared by all inputs.
    pub fn spec(&self) -> &RasterSpec {
        &self.spec
    }

    /// Whether the input at `index` is actually present on disk.
    pub fn is_present(&self, index: usize) -> bool {
        self.inputs[index].is_some()
    }

    /// Row-stripe window plan over the shared grid.
    pub fn stripes(&self, rows: usize) -> WindowPlan {
        WindowPlan::stripes(self.spec.width, self.spec.height, rows)
    }

    /// Square-block window plan over the shared grid.
    pub fn blocks(&self, block_edge: usize) -> Result<WindowPlan> {
        WindowPlan::blocks(self.spec.width, self.spec.height, block_edge)
    }

    /// Reads one window of one input as a `(rows, cols)` array.
    ///
    /// Absent optional inputs yield an all-zero array of the window shape.
    pub fn read_window<T>(&self, index: usize, window: &Window) -> Result<Array2<T>>
    where
        T: GdalType + Copy + Default,
    {
        let Some(dataset) = &self.inputs[index] else {
            return Ok(Array2::from_elem(window.dim(), T::default()));
        };
        let band = dataset.rasterband(1)?;
        let buffer = band.read_as::<T>(window.offset(), window.size(), window.size(), None)?;
        let data: Vec<T> = buffer.into_iter().collect();
        Ok(Array2::from_shape_vec(window.dim(), data)?)
    }
}
