//! Multi-resolution tile aggregation.
//!
//! Coarsening a fine tile is a two-step process:
//!
//! 1. **rewindow** — rewrite the raster's internal I/O block layout from
//!    long single-row stripes to fixed-size square blocks whose edge divides
//!    the fine-per-coarse factor exactly. Values do not change; this only
//!    makes the block reads of step 2 cheap.
//! 2. **aggregate** — sum every `factor × factor` block of fine pixels
//!    (f64 accumulation, so the sum is exact for the value ranges involved)
//!    into one coarse cell, then apply the metric's post-summation scaling.
//!
//! The core invariant: before scaling, the sum of all fine pixels equals the
//! sum of all coarse cells. Scaling happens once per coarse cell, never
//! before summation — annualization or unit conversion applied to fine
//! pixels first would be the classic unit-inconsistency bug.

use crate::error::{FluxError, Result};
use crate::grid::TileId;
use crate::raster::{
    BlockLayout, InputSpec, RasterSpec, TileOutcome, TileSetReader, TileWriter, Window, WindowPlan,
};
use ndarray::{Array2, ArrayView2};
use std::path::Path;
use tracing::{info, warn};

/// Metric type of a tile being aggregated, selecting its post-sum scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMetric {
    /// Annual AGC gain rate (all forest types): convert to megatonnes and
    /// negate (removals are sinks).
    AnnualGainRate,
    /// Cumulative AGCO2+BGCO2 gain: annualize over the loss record,
    /// convert to megatonnes, negate.
    CumulativeGainCo2,
    /// Gross emissions (all gases, all drivers): annualize and convert,
    /// no negation — emissions are sources.
    GrossEmissions,
    /// Net flux: annualize and convert, sign preserved.
    NetFlux,
}

impl AggregationMetric {
    /// Applies the metric's scaling to one summed coarse value.
    ///
    /// `loss_years` annualizes cumulative metrics; `tonnes_to_megatonnes`
    /// converts mass units.
    pub fn scale(&self, sum: f64, loss_years: u32, tonnes_to_megatonnes: f64) -> f64 {
        match self {
            AggregationMetric::AnnualGainRate => -(sum / tonnes_to_megatonnes),
            AggregationMetric::CumulativeGainCo2 => {
                -(sum / loss_years as f64 / tonnes_to_megatonnes)
            }
            AggregationMetric::GrossEmissions => sum / loss_years as f64 / tonnes_to_megatonnes,
            AggregationMetric::NetFlux => sum / loss_years as f64 / tonnes_to_megatonnes,
        }
    }
}

/// Sums every `factor × factor` block of a fine window into one value.
///
/// The window's dimensions must be exact multiples of `factor`.
pub fn aggregate_window(fine: ArrayView2<f32>, factor: usize) -> Result<Array2<f64>> {
    let (rows, cols) = fine.dim();
    if factor == 0 || rows % factor != 0 {
        return Err(FluxError::BlockLayout {
            block_edge: factor,
            extent: rows,
        });
    }
    if cols % factor != 0 {
        return Err(FluxError::BlockLayout {
            block_edge: factor,
            extent: cols,
        });
    }

    let mut out = Array2::<f64>::zeros((rows / factor, cols / factor));
    for ((row, col), &value) in fine.indexed_iter() {
        if value != 0.0 {
            out[[row / factor, col / factor]] += value as f64;
        }
    }
    Ok(out)
}

/// Coarsens fine tiles into low-resolution summary tiles.
pub struct TileAggregator {
    loss_years: u32,
    tonnes_to_megatonnes: f64,
    coarse_pixel_deg: f64,
    rewindow_block_edge: usize,
    window_rows: usize,
}

impl TileAggregator {
    pub fn new(config: &crate::config::ModelConfig) -> Self {
        Self {
            loss_years: config.years.loss_years,
            tonnes_to_megatonnes: config.units.tonnes_to_megatonnes,
            coarse_pixel_deg: config.grid.coarse_pixel_deg,
            rewindow_block_edge: config.grid.rewindow_block_edge,
            window_rows: config.workers.window_rows,
        }
    }

    /// Fine pixels per coarse cell edge for a given fine raster.
    fn factor(&self, spec: &RasterSpec, src: &Path) -> Result<usize> {
        let factor = self.coarse_pixel_deg / spec.pixel_size();
        let rounded = factor.round();
        if (factor - rounded).abs() > 1e-6 || rounded < 1.0 {
            return Err(FluxError::SpatialMismatch {
                path: src.to_path_buf(),
                detail: format!(
                    "coarse pixel {} is not an integer multiple of fine pixel {}",
                    self.coarse_pixel_deg,
                    spec.pixel_size()
                ),
            });
        }
        Ok(rounded as usize)
    }

    /// Rewrites a tile's internal block layout to square blocks.
    ///
    /// Pixel values, resolution, and extent are unchanged; only the GeoTIFF
    /// block structure differs. The block edge must divide the
    /// fine-per-coarse factor exactly so each aggregation block read stays
    /// within whole I/O blocks. A missing source tile is skipped, not
    /// zero-filled.
    pub fn rewindow(&self, tile: &TileId, src: &Path, dst: &Path) -> Result<TileOutcome> {
        if !src.exists() {
            warn!(%tile, path = %src.display(), "fine tile absent, skipping rewindow");
            return Ok(TileOutcome::Skipped(src.to_path_buf()));
        }
        info!(%tile, block_edge = self.rewindow_block_edge, "rewindowing");

        let reader = TileSetReader::open(&[InputSpec::required(src)])?;
        let spec = reader.spec();
        let factor = self.factor(spec, src)?;
        if factor % self.rewindow_block_edge != 0 {
            return Err(FluxError::BlockLayout {
                block_edge: self.rewindow_block_edge,
                extent: factor,
            });
        }

        let mut writer = TileWriter::<f32>::create(
            dst,
            spec,
            BlockLayout::Square(self.rewindow_block_edge),
        )?;
        for window in reader.stripes(self.window_rows).iter() {
            let data = reader.read_window::<f32>(0, &window)?;
            writer.write_window(&window, &data)?;
        }
        writer.finish()
    }

    /// Aggregates one fine tile into a coarse tile.
    ///
    /// The coarse output covers the same 10°×10° extent at the coarse pixel
    /// size (250×250 cells at 0.04°, 100×100 at 0.1°). A missing fine tile
    /// is skipped entirely; no zero-filled substitute is produced.
    pub fn aggregate_tile(
        &self,
        tile: &TileId,
        src: &Path,
        dst: &Path,
        metric: AggregationMetric,
    ) -> Result<TileOutcome> {
        if !src.exists() {
            warn!(%tile, path = %src.display(), "fine tile absent, skipping aggregation");
            return Ok(TileOutcome::Skipped(src.to_path_buf()));
        }
        info!(%tile, ?metric, "aggregating to coarse resolution");

        let reader = TileSetReader::open(&[InputSpec::required(src)])?;
        let spec = reader.spec();
        let factor = self.factor(spec, src)?;
        if spec.width % factor != 0 {
            return Err(FluxError::BlockLayout {
                block_edge: factor,
                extent: spec.width,
            });
        }
        if spec.height % factor != 0 {
            return Err(FluxError::BlockLayout {
                block_edge: factor,
                extent: spec.height,
            });
        }

        let coarse_spec = RasterSpec {
            width: spec.width / factor,
            height: spec.height / factor,
            geo_transform: [
                spec.geo_transform[0],
                spec.geo_transform[1] * factor as f64,
                0.0,
                spec.geo_transform[3],
                0.0,
                spec.geo_transform[5] * factor as f64,
            ],
            projection: spec.projection.clone(),
            nodata: spec.nodata,
        };
        let mut writer =
            TileWriter::<f32>::create(dst, &coarse_spec, BlockLayout::RowStripes)?;

        // Read stripes exactly one coarse row tall, so each stripe
        // aggregates to one full row of coarse cells.
        let plan = WindowPlan::stripes(spec.width, spec.height, factor);
        for (coarse_row, window) in plan.iter().enumerate() {
            let fine = reader.read_window::<f32>(0, &window)?;
            let sums = aggregate_window(fine.view(), factor)?;

            let scaled = sums.mapv(|sum| {
                if sum == 0.0 {
                    0.0
                } else {
                    metric.scale(sum, self.loss_years, self.tonnes_to_megatonnes) as f32
                }
            });
            let coarse_window = Window {
                x_off: 0,
                y_off: coarse_row,
                width: coarse_spec.width,
                height: 1,
            };
            writer.write_window(&coarse_window, &scaled)?;
        }

        writer.finish()
    }
}
