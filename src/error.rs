//! Error types for tile processing.
//!
//! Errors are tile-scoped: one tile's failure is reported to the worker pool
//! and logged, and the remaining tiles continue processing. The variants
//! mirror the failure modes a stage can actually hit — a missing companion
//! raster, inputs that disagree spatially, or a broken window layout.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FluxError>;

/// Errors that can occur while processing a single tile.
#[derive(Debug, Error)]
pub enum FluxError {
    /// A required input raster does not exist for this tile.
    ///
    /// Optional inputs never raise this; they read as all-zero windows.
    #[error("missing required input tile: {path}")]
    MissingInputTile { path: PathBuf },

    /// Two inputs for the same tile disagree in size, geotransform,
    /// or projection. Core arithmetic cannot proceed on this tile.
    #[error("spatial mismatch for {path}: {detail}")]
    SpatialMismatch { path: PathBuf, detail: String },

    /// A square block edge does not divide the raster (or the
    /// fine-per-coarse factor) exactly.
    #[error("block edge {block_edge} does not divide {extent} exactly")]
    BlockLayout { block_edge: usize, extent: usize },

    /// Configuration failed validation or could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A tile id string could not be parsed.
    #[error(transparent)]
    TileId(#[from] crate::grid::TileIdError),

    /// GDAL raised an error opening, reading, or writing a raster.
    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    /// Buffer-to-array reshaping failed (window size bookkeeping bug).
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// Filesystem error outside GDAL (e.g. deleting an empty output).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Worker pool construction failed.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}
