//! Gain-year counting.
//!
//! For every pixel, estimates how many years of biomass accumulation
//! occurred over the model period given its tree-cover loss/gain history.
//! Four mutually exclusive, exhaustive cases cover the disturbance regimes
//! (selected by `loss > 0?` × `gain == 1?`); because the cases are disjoint
//! by construction their results can be computed independently and summed,
//! which is how the windowed driver assembles the output.
//!
//! Counts are always in `[0, loss_years]` and are forced to 0 wherever the
//! forest-type extent mask is 0.

use crate::error::Result;
use crate::grid::TileId;
use crate::raster::{BlockLayout, InputSpec, TileOutcome, TileSetReader, TileWriter};
use ndarray::{Array2, ArrayView2};
use std::path::{Path, PathBuf};
use tracing::info;

/// How gain years are credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainYearMode {
    /// Gain pixels accumulate for half the relevant period on average.
    Standard,
    /// Sensitivity analysis: gain pixels accumulate for the whole period.
    MaxGain,
}

/// Model-period parameters for gain-year counting.
#[derive(Debug, Clone, Copy)]
pub struct GainYearParams {
    /// Number of years in the loss record; also the count for undisturbed
    /// pixels.
    pub loss_years: u32,
    /// Number of years in the gain record.
    pub gain_years: u32,
    pub mode: GainYearMode,
}

/// Input rasters for one tile's gain-year count.
///
/// `extent` and `canopy` are optional by contract: an absent extent raster
/// substitutes an all-zero mask (the whole tile is outside this forest
/// type, not an error), and `canopy` is only supplied for forest types
/// whose undisturbed pixels are additionally gated on canopy density.
/// Mangrove deliberately omits the gate; natural forest applies it. This is
/// a preserved per-type behavioral difference, not an oversight to unify.
#[derive(Debug, Clone)]
pub struct GainYearInputs {
    /// Loss-year raster: 0 = no loss, else year index 1..=loss_years.
    pub loss: PathBuf,
    /// Binary gain raster.
    pub gain: PathBuf,
    /// Forest-type extent raster (non-zero = pixel belongs to the type).
    pub extent: Option<PathBuf>,
    /// Canopy-density raster gating the no-change case, if the type uses it.
    pub canopy: Option<PathBuf>,
}

/// Number of accumulation years for a pixel with no loss and no gain.
#[inline]
fn count_no_change(p: &GainYearParams, canopy: Option<u8>) -> u32 {
    // The canopy gate only exists for types that supply a density raster.
    if canopy == Some(0) {
        return 0;
    }
    p.loss_years
}

/// Number of accumulation years for a pixel with loss only.
///
/// Growth stops the year of loss, so a pixel lost in year index `n`
/// accumulated for `n − 1` years.
#[inline]
fn count_loss_only(loss_year: u32) -> u32 {
    loss_year.saturating_sub(1)
}

/// Number of accumulation years for a pixel with gain only.
#[inline]
fn count_gain_only(p: &GainYearParams) -> u32 {
    match p.mode {
        // Gain could have begun any year of the record; half on average.
        GainYearMode::Standard => p.gain_years / 2,
        GainYearMode::MaxGain => p.loss_years,
    }
}

/// Number of accumulation years for a pixel with both loss and gain.
#[inline]
fn count_loss_and_gain(p: &GainYearParams, loss_year: u32) -> u32 {
    match p.mode {
        // Growth before the loss, plus regrowth for half the remainder.
        GainYearMode::Standard => (loss_year - 1) + (p.loss_years + 1 - loss_year) / 2,
        GainYearMode::MaxGain => p.loss_years - 1,
    }
}

/// Computes the gain-year count for one window.
///
/// `canopy` is `Some` only for forest types that gate the no-change case on
/// canopy density. All input views must share the window's shape.
pub fn gain_year_window(
    loss: ArrayView2<u8>,
    gain: ArrayView2<u8>,
    extent: ArrayView2<u8>,
    canopy: Option<ArrayView2<u8>>,
    params: &GainYearParams,
) -> Array2<u8> {
    let dim = loss.dim();
    debug_assert_eq!(gain.dim(), dim);
    debug_assert_eq!(extent.dim(), dim);

    let mut out = Array2::<u8>::zeros(dim);
    for ((row, col), out_value) in out.indexed_iter_mut() {
        if extent[[row, col]] == 0 {
            continue;
        }
        let loss_year = loss[[row, col]] as u32;
        let has_gain = gain[[row, col]] == 1;
        let count = match (loss_year > 0, has_gain) {
            (false, false) => {
                count_no_change(params, canopy.as_ref().map(|c| c[[row, col]]))
            }
            (true, false) => count_loss_only(loss_year),
            (false, true) => count_gain_only(params),
            (true, true) => count_loss_and_gain(params, loss_year),
        };
        *out_value = count as u8;
    }
    out
}

/// Windowed per-tile driver for gain-year counting.
pub struct GainYearCounter {
    params: GainYearParams,
    window_rows: usize,
}

impl GainYearCounter {
    pub fn new(params: GainYearParams, window_rows: usize) -> Self {
        Self {
            params,
            window_rows,
        }
    }

    /// Computes the gain-year count raster for one tile.
    ///
    /// The output shares the inputs' grid; a result of pure nodata (e.g.
    /// when the extent raster is absent) is deleted and reported as
    /// [`TileOutcome::DeletedEmpty`].
    pub fn compute_tile(
        &self,
        tile: &TileId,
        inputs: &GainYearInputs,
        out_path: &Path,
    ) -> Result<TileOutcome> {
        info!(%tile, mode = ?self.params.mode, "computing gain year count");

        let mut set = vec![
            InputSpec::required(&inputs.loss),
            InputSpec::required(&inputs.gain),
        ];
        let extent_index = inputs.extent.as_ref().map(|path| {
            set.push(InputSpec::optional(path));
            set.len() - 1
        });
        let canopy_index = inputs.canopy.as_ref().map(|path| {
            set.push(InputSpec::required(path));
            set.len() - 1
        });

        let reader = TileSetReader::open(&set)?;
        let mut writer =
            TileWriter::<u8>::create(out_path, reader.spec(), BlockLayout::RowStripes)?;

        for window in reader.stripes(self.window_rows).iter() {
            let loss = reader.read_window::<u8>(0, &window)?;
            let gain = reader.read_window::<u8>(1, &window)?;
            // No extent raster for this tile means an all-zero mask, not
            // an error; the whole output then comes back nodata and is
            // deleted by the writer.
            let extent = match extent_index {
                Some(index) => reader.read_window::<u8>(index, &window)?,
                None => Array2::zeros(window.dim()),
            };
            let canopy = match canopy_index {
                Some(index) => Some(reader.read_window::<u8>(index, &window)?),
                None => None,
            };

            let counts = gain_year_window(
                loss.view(),
                gain.view(),
                extent.view(),
                canopy.as_ref().map(|c| c.view()),
                &self.params,
            );
            writer.write_window(&window, &counts)?;
        }

        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(mode: GainYearMode) -> GainYearParams {
        GainYearParams {
            loss_years: 15,
            gain_years: 12,
            mode,
        }
    }

    #[test]
    fn test_standard_four_cases() {
        // One pixel per disturbance regime: no change, loss year 5,
        // gain only, loss year 5 + gain.
        let loss = array![[0u8, 5, 0, 5]];
        let gain = array![[0u8, 0, 1, 1]];
        let extent = array![[1u8, 1, 1, 1]];

        let out = gain_year_window(
            loss.view(),
            gain.view(),
            extent.view(),
            None,
            &params(GainYearMode::Standard),
        );
        assert_eq!(out, array![[15u8, 4, 6, 9]]);
    }

    #[test]
    fn test_maxgain_four_cases() {
        let loss = array![[0u8, 5, 0, 5]];
        let gain = array![[0u8, 0, 1, 1]];
        let extent = array![[1u8, 1, 1, 1]];

        let out = gain_year_window(
            loss.view(),
            gain.view(),
            extent.view(),
            None,
            &params(GainYearMode::MaxGain),
        );
        // Loss-only is unaffected by mode; gain cases credit the full record.
        assert_eq!(out, array![[15u8, 4, 15, 14]]);
    }

    #[test]
    fn test_extent_mask_forces_zero() {
        let loss = array![[0u8, 5]];
        let gain = array![[1u8, 1]];
        let extent = array![[0u8, 0]];

        let out = gain_year_window(
            loss.view(),
            gain.view(),
            extent.view(),
            None,
            &params(GainYearMode::Standard),
        );
        assert_eq!(out, array![[0u8, 0]], "masked pixels are always 0");
    }

    #[test]
    fn test_counts_stay_in_range() {
        let p = params(GainYearMode::Standard);
        for loss_year in 0..=15u8 {
            for gain in 0..=1u8 {
                let out = gain_year_window(
                    array![[loss_year]].view(),
                    array![[gain]].view(),
                    array![[1u8]].view(),
                    None,
                    &p,
                );
                let count = out[[0, 0]] as u32;
                assert!(
                    count <= p.loss_years,
                    "loss={loss_year} gain={gain} gave count {count} > {}",
                    p.loss_years
                );
            }
        }
    }

    #[test]
    fn test_loss_and_gain_splits_remaining_years() {
        // loss in year 1: no growth before loss, regrowth half of 15 years.
        let p = params(GainYearMode::Standard);
        assert_eq!(count_loss_and_gain(&p, 1), 7);
        // loss in the final year: 14 years before, nothing after.
        assert_eq!(count_loss_and_gain(&p, 15), 14);
    }

    #[test]
    fn test_canopy_gate_applies_only_to_no_change() {
        let loss = array![[0u8, 5]];
        let gain = array![[0u8, 0]];
        let extent = array![[1u8, 1]];
        let canopy = array![[0u8, 0]];

        let out = gain_year_window(
            loss.view(),
            gain.view(),
            extent.view(),
            Some(canopy.view()),
            &params(GainYearMode::Standard),
        );
        // No-change pixel with zero canopy density drops to 0; the loss
        // pixel keeps its count. Mangrove callers pass no canopy raster and
        // skip the gate entirely.
        assert_eq!(out, array![[0u8, 4]]);
    }
}
