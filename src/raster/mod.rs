//! Windowed raster I/O.
//!
//! All tile rasters are single-band GeoTIFFs with nodata 0 on the fixed
//! EPSG:4326 grid. [`TileSetReader`] opens a set of spatially aligned inputs
//! (with optional inputs defaulting to zero windows) and [`TileWriter`]
//! streams windows into a new output, deleting it afterwards if nothing but
//! nodata was written.

mod reader;
mod window;
mod writer;

pub use reader::{InputSpec, TileSetReader};
pub use window::{Window, WindowIter, WindowPlan};
pub use writer::{BlockLayout, TileWriter};

use crate::error::{FluxError, Result};
use gdal::Dataset;
use std::path::PathBuf;

/// Spatial description shared by every raster of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSpec {
    pub width: usize,
    pub height: usize,
    pub geo_transform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterSpec {
    /// Reads the spatial description of an open dataset's first band.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let band = dataset.rasterband(1)?;
        Ok(Self {
            width: band.x_size(),
            height: band.y_size(),
            geo_transform: dataset.geo_transform()?,
            projection: dataset.projection(),
            nodata: band.no_data_value(),
        })
    }

    /// Checks that another raster occupies the same grid.
    ///
    /// Size and geotransform must match exactly (within floating tolerance
    /// for the transform); a projection string difference is reported too,
    /// since core arithmetic cannot proceed across projections.
    pub fn ensure_aligned(&self, other: &RasterSpec, path: &std::path::Path) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(FluxError::SpatialMismatch {
                path: path.to_path_buf(),
                detail: format!(
                    "size {}x{} differs from {}x{}",
                    other.width, other.height, self.width, self.height
                ),
            });
        }
        let transform_differs = self
            .geo_transform
            .iter()
            .zip(other.geo_transform.iter())
            .any(|(a, b)| (a - b).abs() > 1e-9);
        if transform_differs {
            return Err(FluxError::SpatialMismatch {
                path: path.to_path_buf(),
                detail: format!(
                    "geotransform {:?} differs from {:?}",
                    other.geo_transform, self.geo_transform
                ),
            });
        }
        if self.projection != other.projection {
            return Err(FluxError::SpatialMismatch {
                path: path.to_path_buf(),
                detail: "projection differs".to_string(),
            });
        }
        Ok(())
    }

    /// Pixel width in map units (decimal degrees on this grid).
    pub fn pixel_size(&self) -> f64 {
        self.geo_transform[1].abs()
    }
}

/// What became of one tile after a stage ran.
///
/// Stages produce either a real output, delete an output that contained only
/// nodata, or skip the tile entirely when a required input is absent. None
/// of these block sibling tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    /// Output written and kept.
    Written(PathBuf),
    /// Output contained only nodata and was deleted.
    DeletedEmpty(PathBuf),
    /// Tile skipped because this input was missing.
    Skipped(PathBuf),
}
