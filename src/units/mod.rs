//! Per-hectare ↔ per-pixel density conversion and forest-extent masking.
//!
//! Pixel area varies with latitude on the fixed decimal-degree grid, so
//! per-hectare densities and per-pixel masses are different rasters. One
//! pass over the inputs derives three co-consistent outputs:
//!
//! 1. full-extent per-pixel = per_hectare × pixel_area_m2 / 10,000
//! 2. forest-extent per-hectare = per_hectare where the pixel is forest,
//!    else nodata
//! 3. forest-extent per-pixel = (2) × pixel_area_m2 / 10,000
//!
//! so (3) always equals formula (1) applied to (2) — the invariant the
//! round-trip tests pin down.

use crate::config::defaults::SQ_M_PER_HECTARE;
use crate::config::ExtentSettings;
use crate::error::Result;
use crate::grid::TileId;
use crate::raster::{BlockLayout, InputSpec, TileOutcome, TileSetReader, TileWriter};
use ndarray::{Array2, ArrayView2};
use std::path::PathBuf;
use tracing::info;

/// The three co-derived density outputs for one window.
#[derive(Debug)]
pub struct DensityWindows {
    /// Per-pixel values over the full tile extent.
    pub full_per_pixel: Array2<f32>,
    /// Per-hectare values masked to forest extent.
    pub forest_per_hectare: Array2<f32>,
    /// Per-pixel values masked to forest extent.
    pub forest_per_pixel: Array2<f32>,
}

/// Input rasters for one tile's density conversion.
#[derive(Debug, Clone)]
pub struct DensityInputs {
    /// Per-hectare source raster (e.g. t C/ha).
    pub per_hectare: PathBuf,
    /// Pixel area in m², varying with latitude.
    pub pixel_area: PathBuf,
    /// Tree-cover density percentage.
    pub canopy: PathBuf,
    /// Binary gain raster.
    pub gain: PathBuf,
    /// Type-specific biomass raster; non-zero pixels count as forest even
    /// below the canopy threshold.
    pub type_biomass: Option<PathBuf>,
    /// Pre-2000 plantation mask, applied only when the configuration
    /// enables the exclusion.
    pub pre_2000_plantations: Option<PathBuf>,
}

/// Whether a pixel is inside forest extent for masked outputs.
#[inline]
fn is_forest(
    canopy: u8,
    gain: u8,
    type_biomass: f32,
    pre_2000: u8,
    criteria: &ExtentSettings,
) -> bool {
    let meets = canopy > criteria.canopy_threshold || gain == 1 || type_biomass != 0.0;
    if !meets {
        return false;
    }
    !(criteria.exclude_pre_2000_plantations && pre_2000 != 0)
}

/// Converts one window of per-hectare densities.
///
/// `type_biomass` and `pre_2000` default to zero arrays when absent.
pub fn density_window(
    per_hectare: ArrayView2<f32>,
    pixel_area_m2: ArrayView2<f32>,
    canopy: ArrayView2<u8>,
    gain: ArrayView2<u8>,
    type_biomass: Option<ArrayView2<f32>>,
    pre_2000: Option<ArrayView2<u8>>,
    criteria: &ExtentSettings,
) -> DensityWindows {
    let dim = per_hectare.dim();
    let mut full_per_pixel = Array2::<f32>::zeros(dim);
    let mut forest_per_hectare = Array2::<f32>::zeros(dim);
    let mut forest_per_pixel = Array2::<f32>::zeros(dim);

    for ((row, col), &density) in per_hectare.indexed_iter() {
        let area = pixel_area_m2[[row, col]] as f64;
        let per_pixel = (density as f64 * area / SQ_M_PER_HECTARE) as f32;
        full_per_pixel[[row, col]] = per_pixel;

        let biomass = type_biomass.as_ref().map_or(0.0, |b| b[[row, col]]);
        let plantation = pre_2000.as_ref().map_or(0, |p| p[[row, col]]);
        if is_forest(
            canopy[[row, col]],
            gain[[row, col]],
            biomass,
            plantation,
            criteria,
        ) {
            forest_per_hectare[[row, col]] = density;
            forest_per_pixel[[row, col]] = per_pixel;
        }
    }

    DensityWindows {
        full_per_pixel,
        forest_per_hectare,
        forest_per_pixel,
    }
}

/// Output paths for the three co-derived rasters.
#[derive(Debug, Clone)]
pub struct DensityOutputs {
    pub full_per_pixel: PathBuf,
    pub forest_per_hectare: PathBuf,
    pub forest_per_pixel: PathBuf,
}

/// Windowed per-tile driver for density conversion.
pub struct DensityUnitConverter {
    criteria: ExtentSettings,
    window_rows: usize,
}

impl DensityUnitConverter {
    pub fn new(criteria: ExtentSettings, window_rows: usize) -> Self {
        Self {
            criteria,
            window_rows,
        }
    }

    /// Produces the three density rasters for one tile in a single pass.
    pub fn convert_tile(
        &self,
        tile: &TileId,
        inputs: &DensityInputs,
        outputs: &DensityOutputs,
    ) -> Result<[TileOutcome; 3]> {
        info!(%tile, "converting density units");

        let mut set = vec![
            InputSpec::required(&inputs.per_hectare),
            InputSpec::required(&inputs.pixel_area),
            InputSpec::required(&inputs.canopy),
            InputSpec::required(&inputs.gain),
        ];
        let biomass_index = inputs.type_biomass.as_ref().map(|path| {
            set.push(InputSpec::optional(path));
            set.len() - 1
        });
        let pre_2000_index = inputs.pre_2000_plantations.as_ref().map(|path| {
            set.push(InputSpec::optional(path));
            set.len() - 1
        });

        let reader = TileSetReader::open(&set)?;
        let spec = reader.spec();
        let mut full_writer =
            TileWriter::<f32>::create(&outputs.full_per_pixel, spec, BlockLayout::RowStripes)?;
        let mut hectare_writer =
            TileWriter::<f32>::create(&outputs.forest_per_hectare, spec, BlockLayout::RowStripes)?;
        let mut pixel_writer =
            TileWriter::<f32>::create(&outputs.forest_per_pixel, spec, BlockLayout::RowStripes)?;

        for window in reader.stripes(self.window_rows).iter() {
            let per_hectare = reader.read_window::<f32>(0, &window)?;
            let area = reader.read_window::<f32>(1, &window)?;
            let canopy = reader.read_window::<u8>(2, &window)?;
            let gain = reader.read_window::<u8>(3, &window)?;
            let biomass = match biomass_index {
                Some(index) => Some(reader.read_window::<f32>(index, &window)?),
                None => None,
            };
            let pre_2000 = match pre_2000_index {
                Some(index) => Some(reader.read_window::<u8>(index, &window)?),
                None => None,
            };

            let derived = density_window(
                per_hectare.view(),
                area.view(),
                canopy.view(),
                gain.view(),
                biomass.as_ref().map(|b| b.view()),
                pre_2000.as_ref().map(|p| p.view()),
                &self.criteria,
            );
            full_writer.write_window(&window, &derived.full_per_pixel)?;
            hectare_writer.write_window(&window, &derived.forest_per_hectare)?;
            pixel_writer.write_window(&window, &derived.forest_per_pixel)?;
        }

        Ok([
            full_writer.finish()?,
            hectare_writer.finish()?,
            pixel_writer.finish()?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn criteria() -> ExtentSettings {
        ExtentSettings {
            canopy_threshold: 30,
            exclude_pre_2000_plantations: false,
        }
    }

    #[test]
    fn test_per_pixel_conversion() {
        // ~767 m² is a realistic fine-pixel area near the equator.
        let per_hectare = array![[100.0f32]];
        let area = array![[767.0f32]];
        let canopy = array![[80u8]];
        let gain = array![[0u8]];

        let out = density_window(
            per_hectare.view(),
            area.view(),
            canopy.view(),
            gain.view(),
            None,
            None,
            &criteria(),
        );
        let expected = 100.0 * 767.0 / 10_000.0;
        assert!((out.full_per_pixel[[0, 0]] - expected).abs() < 1e-4);
        assert_eq!(out.forest_per_hectare[[0, 0]], 100.0);
        assert!((out.forest_per_pixel[[0, 0]] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_round_trip_recovers_per_hectare() {
        let per_hectare = array![[42.5f32, 3.25]];
        let area = array![[767.0f32, 623.5]];
        let canopy = array![[90u8, 90]];
        let gain = array![[0u8, 0]];

        let out = density_window(
            per_hectare.view(),
            area.view(),
            canopy.view(),
            gain.view(),
            None,
            None,
            &criteria(),
        );
        for col in 0..2 {
            let recovered =
                out.full_per_pixel[[0, col]] * (10_000.0 / area[[0, col]]);
            assert!(
                (recovered - per_hectare[[0, col]]).abs() < 1e-3,
                "per_pixel × 10000/area must reproduce per_hectare"
            );
        }
    }

    #[test]
    fn test_forest_extent_criteria() {
        // Columns: below threshold, above threshold, gain only,
        // biomass only, nothing.
        let per_hectare = array![[10.0f32, 10.0, 10.0, 10.0, 10.0]];
        let area = array![[700.0f32; 5]];
        let canopy = array![[30u8, 31, 0, 0, 0]];
        let gain = array![[0u8, 0, 1, 0, 0]];
        let biomass = array![[0.0f32, 0.0, 0.0, 5.0, 0.0]];

        let out = density_window(
            per_hectare.view(),
            area.view(),
            canopy.view(),
            gain.view(),
            Some(biomass.view()),
            None,
            &criteria(),
        );
        assert_eq!(
            out.forest_per_hectare,
            array![[0.0f32, 10.0, 10.0, 10.0, 0.0]],
            "threshold is strict: tcd must exceed it"
        );
        // Full-extent output ignores the mask entirely.
        assert!(out.full_per_pixel.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_pre_2000_plantation_exclusion() {
        let per_hectare = array![[10.0f32, 10.0]];
        let area = array![[700.0f32, 700.0]];
        let canopy = array![[80u8, 80]];
        let gain = array![[0u8, 0]];
        let plantation = array![[1u8, 0]];

        let excluding = ExtentSettings {
            canopy_threshold: 30,
            exclude_pre_2000_plantations: true,
        };
        let out = density_window(
            per_hectare.view(),
            area.view(),
            canopy.view(),
            gain.view(),
            None,
            Some(plantation.view()),
            &excluding,
        );
        assert_eq!(out.forest_per_hectare, array![[0.0f32, 10.0]]);

        // With the exclusion disabled the mask raster is ignored.
        let out = density_window(
            per_hectare.view(),
            area.view(),
            canopy.view(),
            gain.view(),
            None,
            Some(plantation.view()),
            &criteria(),
        );
        assert_eq!(out.forest_per_hectare, array![[10.0f32, 10.0]]);
    }

    #[test]
    fn test_internal_consistency_of_three_outputs() {
        let per_hectare = array![[12.0f32, 0.5, 99.0]];
        let area = array![[700.0f32, 750.0, 800.0]];
        let canopy = array![[80u8, 10, 80]];
        let gain = array![[0u8, 0, 0]];

        let out = density_window(
            per_hectare.view(),
            area.view(),
            canopy.view(),
            gain.view(),
            None,
            None,
            &criteria(),
        );
        // Output 3 must equal formula 1 applied to output 2.
        for col in 0..3 {
            let rederived = out.forest_per_hectare[[0, col]] as f64 * area[[0, col]] as f64
                / SQ_M_PER_HECTARE;
            assert!(
                (out.forest_per_pixel[[0, col]] as f64 - rederived).abs() < 1e-6,
                "forest per-pixel inconsistent at column {col}"
            );
        }
    }
}
