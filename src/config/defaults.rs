//! Default model constants.
//!
//! Single source of truth for the values every stage must agree on. All of
//! these can be overridden through [`super::ModelConfig`]; nothing reads
//! them as ambient global state.

/// Number of years in the tree-cover-loss record (2001..=2015 era default).
pub const LOSS_YEARS: u32 = 15;

/// Number of years in the tree-cover-gain record (2000-2012 composite).
pub const GAIN_YEARS: u32 = 12;

/// Canopy-density percentage above which a pixel counts as forest extent.
pub const CANOPY_COVER_THRESHOLD: u8 = 30;

/// Ratio converting tonnes of carbon to tonnes of CO2 (44/12).
pub const C_TO_CO2: f64 = 44.0 / 12.0;

/// Tonnes per megatonne, for coarse-output unit scaling.
pub const TONNES_TO_MEGATONNES: f64 = 1_000_000.0;

/// Square metres per hectare, for per-hectare ↔ per-pixel conversion.
pub const SQ_M_PER_HECTARE: f64 = 10_000.0;

/// Fine (native) pixel size in decimal degrees, ≈30 m at the equator.
pub const FINE_PIXEL_DEG: f64 = 0.00025;

/// Coarse pixel size for 0.04° aggregated outputs (160 fine pixels/edge).
pub const COARSE_PIXEL_DEG_004: f64 = 0.04;

/// Coarse pixel size for 0.1° aggregated outputs (400 fine pixels/edge).
pub const COARSE_PIXEL_DEG_010: f64 = 0.1;

/// Edge length of one tile in decimal degrees.
pub const TILE_SIZE_DEG: f64 = 10.0;

/// Nodata value shared by every raster in the model.
pub const NODATA: f64 = 0.0;

/// Default number of rows per read/write window.
///
/// A full-width stripe of a 40,000-pixel-wide tile at 400 rows is ~64 MB of
/// f32 per input, which keeps a multi-input stage well under typical
/// per-worker memory limits.
pub const WINDOW_ROWS: usize = 400;

/// Default square block edge used when rewindowing for aggregation.
pub const REWINDOW_BLOCK_EDGE: usize = 160;
