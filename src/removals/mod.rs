//! Cumulative removals, emissions, and net flux.
//!
//! Annual per-hectare rates become cumulative CO2 by multiplying with the
//! per-pixel years of activity and the carbon→CO2 ratio (44/12). Years of
//! activity is the gain-year count for removals, or a loss-derived indicator
//! for emissions. Net flux is gross emissions minus gross removals, with
//! negative values marking net sinks.

use crate::error::Result;
use crate::grid::TileId;
use crate::raster::{BlockLayout, InputSpec, TileOutcome, TileSetReader, TileWriter};
use ndarray::{Array2, ArrayView2};
use std::path::Path;
use tracing::info;

/// Multiplies a rate window by years of activity and the C→CO2 ratio.
///
/// Nodata (0) in either input propagates: a pixel with no rate or no
/// activity years has no cumulative value.
pub fn cumulative_window(
    annual_rate: ArrayView2<f32>,
    years: ArrayView2<u8>,
    c_to_co2: f64,
) -> Array2<f32> {
    debug_assert_eq!(annual_rate.dim(), years.dim());
    let mut out = Array2::<f32>::zeros(annual_rate.dim());
    for ((row, col), out_value) in out.indexed_iter_mut() {
        let rate = annual_rate[[row, col]];
        let year_count = years[[row, col]];
        if rate != 0.0 && year_count != 0 {
            *out_value = (rate as f64 * year_count as f64 * c_to_co2) as f32;
        }
    }
    out
}

/// Computes net flux: gross emissions − gross removals.
///
/// Sign convention: negative = net sink, positive = net source. Output is
/// nodata wherever either input is nodata.
pub fn net_flux_window(
    gross_emissions: ArrayView2<f32>,
    gross_removals: ArrayView2<f32>,
) -> Array2<f32> {
    debug_assert_eq!(gross_emissions.dim(), gross_removals.dim());
    let mut out = Array2::<f32>::zeros(gross_emissions.dim());
    for ((row, col), out_value) in out.indexed_iter_mut() {
        let emissions = gross_emissions[[row, col]];
        let removals = gross_removals[[row, col]];
        if emissions != 0.0 && removals != 0.0 {
            *out_value = emissions - removals;
        }
    }
    out
}

/// Windowed per-tile driver for cumulative outputs.
pub struct RemovalAccumulator {
    c_to_co2: f64,
    window_rows: usize,
}

impl RemovalAccumulator {
    pub fn new(c_to_co2: f64, window_rows: usize) -> Self {
        Self {
            c_to_co2,
            window_rows,
        }
    }

    /// Accumulates an annual rate raster into cumulative CO2 for one tile.
    ///
    /// `years` is the gain-year count for removals, or the loss-derived
    /// activity indicator for emissions.
    pub fn accumulate_tile(
        &self,
        tile: &TileId,
        annual_rate: &Path,
        years: &Path,
        out_path: &Path,
    ) -> Result<TileOutcome> {
        info!(%tile, "accumulating cumulative CO2");

        let reader = TileSetReader::open(&[
            InputSpec::required(annual_rate),
            InputSpec::required(years),
        ])?;
        let mut writer =
            TileWriter::<f32>::create(out_path, reader.spec(), BlockLayout::RowStripes)?;

        for window in reader.stripes(self.window_rows).iter() {
            let rate = reader.read_window::<f32>(0, &window)?;
            let year_counts = reader.read_window::<u8>(1, &window)?;
            let cumulative = cumulative_window(rate.view(), year_counts.view(), self.c_to_co2);
            writer.write_window(&window, &cumulative)?;
        }

        writer.finish()
    }

    /// Computes the net-flux raster for one tile.
    pub fn net_flux_tile(
        &self,
        tile: &TileId,
        gross_emissions: &Path,
        gross_removals: &Path,
        out_path: &Path,
    ) -> Result<TileOutcome> {
        info!(%tile, "computing net flux");

        let reader = TileSetReader::open(&[
            InputSpec::required(gross_emissions),
            InputSpec::required(gross_removals),
        ])?;
        let mut writer =
            TileWriter::<f32>::create(out_path, reader.spec(), BlockLayout::RowStripes)?;

        for window in reader.stripes(self.window_rows).iter() {
            let emissions = reader.read_window::<f32>(0, &window)?;
            let removals = reader.read_window::<f32>(1, &window)?;
            let net = net_flux_window(emissions.view(), removals.view());
            writer.write_window(&window, &net)?;
        }

        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::C_TO_CO2;
    use ndarray::array;

    #[test]
    fn test_cumulative_multiplies_rate_years_ratio() {
        let rate = array![[2.0f32]];
        let years = array![[15u8]];

        let out = cumulative_window(rate.view(), years.view(), C_TO_CO2);
        let expected = 2.0 * 15.0 * (44.0 / 12.0);
        assert!(
            (out[[0, 0]] - expected as f32).abs() < 1e-4,
            "got {}, expected {}",
            out[[0, 0]],
            expected
        );
    }

    #[test]
    fn test_cumulative_keeps_fractional_precision() {
        let rate = array![[0.33f32]];
        let years = array![[7u8]];

        let out = cumulative_window(rate.view(), years.view(), C_TO_CO2);
        let expected = (0.33f64 * 7.0 * C_TO_CO2) as f32;
        assert!((out[[0, 0]] - expected).abs() < 1e-5);
        assert_ne!(out[[0, 0]].fract(), 0.0, "output must not be truncated");
    }

    #[test]
    fn test_cumulative_nodata_propagates() {
        let rate = array![[0.0f32, 2.0]];
        let years = array![[10u8, 0]];

        let out = cumulative_window(rate.view(), years.view(), C_TO_CO2);
        assert_eq!(out, array![[0.0f32, 0.0]]);
    }

    #[test]
    fn test_net_flux_sign_convention() {
        // More removals than emissions → negative (net sink).
        let emissions = array![[10.0f32, 30.0]];
        let removals = array![[25.0f32, 5.0]];

        let out = net_flux_window(emissions.view(), removals.view());
        assert_eq!(out, array![[-15.0f32, 25.0]]);
    }

    #[test]
    fn test_net_flux_nodata_propagates() {
        let emissions = array![[0.0f32, 30.0]];
        let removals = array![[25.0f32, 0.0]];

        let out = net_flux_window(emissions.view(), removals.view());
        assert_eq!(out, array![[0.0f32, 0.0]]);
    }
}
