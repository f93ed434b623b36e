//! Global mosaicking and sensitivity comparison.
//!
//! Coarse per-tile rasters are stitched into a single global raster through
//! a virtual mosaic (VRT), then materialized as one GeoTIFF carrying
//! descriptive metadata — units, scale convention, source, extent, and the
//! canopy threshold the model ran with.
//!
//! Sensitivity analyses are compared against the standard model with two
//! derived rasters: a percent-difference raster and a four-state
//! categorical sign-change raster. Pixels where both models are nodata map
//! to nodata, never to "stays source" — missing data must not be
//! mis-categorized.

use crate::error::Result;
use crate::raster::{
    BlockLayout, InputSpec, RasterSpec, TileOutcome, TileSetReader, TileWriter,
};
use gdal::programs::raster::build_vrt;
use gdal::{Dataset, Metadata};
use ndarray::{Array2, ArrayView2};
use std::path::{Path, PathBuf};
use tracing::info;

/// Sign-change category values of the comparison raster.
///
/// 0 is nodata, as everywhere else in the model.
pub const STAYS_SOURCE: u8 = 1;
pub const STAYS_SINK: u8 = 2;
pub const SOURCE_TO_SINK: u8 = 3;
pub const SINK_TO_SOURCE: u8 = 4;

/// Descriptive metadata attached to a global output raster.
#[derive(Debug, Clone)]
pub struct MosaicMetadata {
    /// e.g. "Mt CO2e/yr".
    pub units: String,
    /// Sign/scale convention, e.g. "negative = net sink".
    pub scale: String,
    /// Model run that produced the tiles.
    pub source: String,
    /// Spatial extent description.
    pub extent: String,
    /// Canopy-density threshold the model ran with.
    pub canopy_threshold: u8,
}

/// Percent difference of a sensitivity run against the standard model.
///
/// `(sensitivity − standard) / |standard| × 100`. Pixels where the standard
/// value is nodata (0) are nodata in the output: there is no baseline to
/// compare against, and dividing by zero is not a comparison.
pub fn percent_diff_window(
    sensitivity: ArrayView2<f32>,
    standard: ArrayView2<f32>,
) -> Array2<f32> {
    debug_assert_eq!(sensitivity.dim(), standard.dim());
    let mut out = Array2::<f32>::zeros(sensitivity.dim());
    for ((row, col), out_value) in out.indexed_iter_mut() {
        let baseline = standard[[row, col]];
        if baseline != 0.0 {
            let diff = sensitivity[[row, col]] as f64 - baseline as f64;
            *out_value = (diff / (baseline as f64).abs() * 100.0) as f32;
        }
    }
    out
}

/// Categorizes source/sink changes between a sensitivity run and the
/// standard model.
///
/// Both-zero pixels are nodata, never [`STAYS_SOURCE`].
pub fn sign_change_window(
    sensitivity: ArrayView2<f32>,
    standard: ArrayView2<f32>,
) -> Array2<u8> {
    debug_assert_eq!(sensitivity.dim(), standard.dim());
    let mut out = Array2::<u8>::zeros(sensitivity.dim());
    for ((row, col), out_value) in out.indexed_iter_mut() {
        let sens = sensitivity[[row, col]];
        let std = standard[[row, col]];
        if sens == 0.0 && std == 0.0 {
            continue;
        }
        *out_value = if sens > 0.0 && std >= 0.0 {
            STAYS_SOURCE
        } else if sens < 0.0 && std < 0.0 {
            STAYS_SINK
        } else if sens < 0.0 && std >= 0.0 {
            // The standard model was a source (or zero) and the
            // sensitivity run flipped it to a sink.
            SOURCE_TO_SINK
        } else if sens >= 0.0 && std < 0.0 {
            SINK_TO_SOURCE
        } else {
            // sens == 0, std > 0: sensitivity has no data to classify.
            0
        };
    }
    out
}

/// Stitches coarse tiles into global rasters and compares model runs.
pub struct GlobalMosaicBuilder {
    window_rows: usize,
}

impl GlobalMosaicBuilder {
    pub fn new(window_rows: usize) -> Self {
        Self { window_rows }
    }

    /// Builds the global raster from per-tile coarse outputs.
    ///
    /// The tiles are combined into a VRT at `vrt_path`, then materialized
    /// window by window into a GeoTIFF at `out_path` with `metadata`
    /// attached. The grid is already EPSG:4326, so no resampling is
    /// involved — the VRT only merges extents. An all-nodata mosaic is
    /// deleted like any other empty output and reported as such.
    pub fn build(
        &self,
        coarse_tiles: &[PathBuf],
        vrt_path: &Path,
        out_path: &Path,
        metadata: &MosaicMetadata,
    ) -> Result<TileOutcome> {
        info!(tiles = coarse_tiles.len(), out = %out_path.display(), "building global mosaic");

        let mut datasets = Vec::with_capacity(coarse_tiles.len());
        for tile_path in coarse_tiles {
            datasets.push(Dataset::open(tile_path)?);
        }
        let vrt = build_vrt(Some(vrt_path), &datasets, None)?;
        drop(vrt);

        let reader = TileSetReader::open(&[InputSpec::required(vrt_path)])?;
        let spec: RasterSpec = reader.spec().clone();
        let mut writer =
            TileWriter::<f32>::create(out_path, &spec, BlockLayout::RowStripes)?;
        for window in reader.stripes(self.window_rows).iter() {
            let data = reader.read_window::<f32>(0, &window)?;
            writer.write_window(&window, &data)?;
        }
        let outcome = writer.finish()?;

        if let TileOutcome::Written(path) = &outcome {
            let mut dataset = Dataset::open_ex(
                path,
                gdal::DatasetOptions {
                    open_flags: gdal::GdalOpenFlags::GDAL_OF_UPDATE,
                    ..Default::default()
                },
            )?;
            dataset.set_metadata_item("units", &metadata.units, "")?;
            dataset.set_metadata_item("scale", &metadata.scale, "")?;
            dataset.set_metadata_item("source", &metadata.source, "")?;
            dataset.set_metadata_item("extent", &metadata.extent, "")?;
            dataset.set_metadata_item(
                "canopy_threshold",
                &metadata.canopy_threshold.to_string(),
                "",
            )?;
        }
        Ok(outcome)
    }

    /// Writes the percent-difference raster between two global rasters.
    pub fn percent_diff(
        &self,
        sensitivity: &Path,
        standard: &Path,
        out_path: &Path,
    ) -> Result<TileOutcome> {
        info!(out = %out_path.display(), "computing sensitivity percent difference");
        let reader = TileSetReader::open(&[
            InputSpec::required(sensitivity),
            InputSpec::required(standard),
        ])?;
        let mut writer =
            TileWriter::<f32>::create(out_path, reader.spec(), BlockLayout::RowStripes)?;
        for window in reader.stripes(self.window_rows).iter() {
            let sens = reader.read_window::<f32>(0, &window)?;
            let std = reader.read_window::<f32>(1, &window)?;
            writer.write_window(&window, &percent_diff_window(sens.view(), std.view()))?;
        }
        writer.finish()
    }

    /// Writes the categorical sign-change raster between two global rasters.
    pub fn sign_change(
        &self,
        sensitivity: &Path,
        standard: &Path,
        out_path: &Path,
    ) -> Result<TileOutcome> {
        info!(out = %out_path.display(), "computing sensitivity sign changes");
        let reader = TileSetReader::open(&[
            InputSpec::required(sensitivity),
            InputSpec::required(standard),
        ])?;
        let mut writer =
            TileWriter::<u8>::create(out_path, reader.spec(), BlockLayout::RowStripes)?;
        for window in reader.stripes(self.window_rows).iter() {
            let sens = reader.read_window::<f32>(0, &window)?;
            let std = reader.read_window::<f32>(1, &window)?;
            writer.write_window(&window, &sign_change_window(sens.view(), std.view()))?;
        }
        writer.finish()
    }
}
