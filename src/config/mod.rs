//! Model configuration.
//!
//! An explicit [`ModelConfig`] struct is passed into each component instead
//! of ambient global constants, giving single-source-of-truth behavior
//! without global mutable state. Each section struct covers one concern;
//! defaults come from [`defaults`] and a config can be loaded from TOML.

pub mod defaults;

use crate::error::{FluxError, Result};
use serde::Deserialize;

/// Complete model configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Years covered by the loss/gain records.
    pub years: YearSettings,
    /// Forest-extent criteria.
    pub extent: ExtentSettings,
    /// Unit conversion constants.
    pub units: UnitSettings,
    /// Grid resolution parameters.
    pub grid: GridSettings,
    /// Worker pool and windowing parameters.
    pub workers: WorkerSettings,
}

/// Years covered by the disturbance records.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct YearSettings {
    /// Number of years in the tree-cover-loss record.
    pub loss_years: u32,
    /// Number of years in the tree-cover-gain record.
    pub gain_years: u32,
}

/// Criteria defining forest extent for masked outputs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtentSettings {
    /// Canopy-density percentage above which a pixel is forest.
    pub canopy_threshold: u8,
    /// Whether pixels inside pre-2000 plantations are excluded from
    /// forest extent even when they meet the canopy/gain/biomass criteria.
    pub exclude_pre_2000_plantations: bool,
}

/// Unit conversion constants.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnitSettings {
    /// Tonnes carbon → tonnes CO2 ratio.
    pub c_to_co2: f64,
    /// Tonnes per megatonne.
    pub tonnes_to_megatonnes: f64,
}

/// Grid resolution parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridSettings {
    /// Fine (native) pixel size in decimal degrees.
    pub fine_pixel_deg: f64,
    /// Coarse pixel size for aggregated outputs.
    pub coarse_pixel_deg: f64,
    /// Square block edge used when rewindowing before aggregation.
    /// Must be a multiple of 16 (a GeoTIFF tiled-layout requirement) and
    /// divide the fine-per-coarse factor exactly.
    pub rewindow_block_edge: usize,
}

/// Worker pool and windowed I/O parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    /// Number of worker threads. 0 means one per CPU core.
    pub threads: usize,
    /// Rows per read/write window.
    pub window_rows: usize,
}

impl Default for YearSettings {
    fn default() -> Self {
        Self {
            loss_years: defaults::LOSS_YEARS,
            gain_years: defaults::GAIN_YEARS,
        }
    }
}

impl Default for ExtentSettings {
    fn default() -> Self {
        Self {
            canopy_threshold: defaults::CANOPY_COVER_THRESHOLD,
            exclude_pre_2000_plantations: false,
        }
    }
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            c_to_co2: defaults::C_TO_CO2,
            tonnes_to_megatonnes: defaults::TONNES_TO_MEGATONNES,
        }
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            fine_pixel_deg: defaults::FINE_PIXEL_DEG,
            coarse_pixel_deg: defaults::COARSE_PIXEL_DEG_004,
            rewindow_block_edge: defaults::REWINDOW_BLOCK_EDGE,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            threads: 0,
            window_rows: defaults::WINDOW_ROWS,
        }
    }
}

impl ModelConfig {
    /// Parses a configuration from a TOML document.
    ///
    /// Missing sections and keys fall back to their defaults, so an empty
    /// document yields `ModelConfig::default()`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ModelConfig =
            toml::from_str(text).map_err(|e| FluxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.years.loss_years == 0 {
            return Err(FluxError::Config("loss_years must be positive".into()));
        }
        if self.grid.fine_pixel_deg <= 0.0 || self.grid.coarse_pixel_deg <= 0.0 {
            return Err(FluxError::Config("pixel sizes must be positive".into()));
        }
        if self.grid.coarse_pixel_deg <= self.grid.fine_pixel_deg {
            return Err(FluxError::Config(
                "coarse pixel size must exceed fine pixel size".into(),
            ));
        }
        let factor = self.grid.coarse_pixel_deg / self.grid.fine_pixel_deg;
        if (factor - factor.round()).abs() > 1e-9 {
            return Err(FluxError::Config(format!(
                "coarse pixel size {} is not an integer multiple of fine pixel size {}",
                self.grid.coarse_pixel_deg, self.grid.fine_pixel_deg
            )));
        }
        let factor = factor.round() as usize;
        if self.grid.rewindow_block_edge == 0 || self.grid.rewindow_block_edge % 16 != 0 {
            return Err(FluxError::Config(format!(
                "rewindow block edge {} must be a positive multiple of 16",
                self.grid.rewindow_block_edge
            )));
        }
        if factor % self.grid.rewindow_block_edge != 0 {
            return Err(FluxError::Config(format!(
                "rewindow block edge {} does not divide the fine-per-coarse factor {}",
                self.grid.rewindow_block_edge, factor
            )));
        }
        if self.workers.window_rows == 0 {
            return Err(FluxError::Config("window_rows must be positive".into()));
        }
        Ok(())
    }

    /// Number of fine pixels along one edge of a coarse cell.
    pub fn fine_per_coarse(&self) -> usize {
        (self.grid.coarse_pixel_deg / self.grid.fine_pixel_deg).round() as usize
    }
}
