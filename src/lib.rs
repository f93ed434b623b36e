//! carbonflux - Forest carbon flux accounting over a global tile grid
//!
//! This library is the per-pixel carbon accounting and multi-resolution
//! aggregation engine of a tiled forest carbon flux model. The global land
//! surface is divided into 10°×10° single-band GeoTIFF tiles at a fixed
//! 0.00025° pixel size; every stage reads tiles in bounded windows, applies
//! a per-pixel kernel, and writes new tiles (no tile is mutated in place).
//!
//! # Pipeline shape
//!
//! ```text
//! loss/gain/extent → GainYearCounter ─┐
//! biomass/area     → DensityUnits    ─┼→ ForestTypeMerger → RemovalAccumulator
//!                                     │        ↓
//!                                     └→ TileAggregator → GlobalMosaicBuilder
//! ```
//!
//! Tiles are independent: the [`pipeline::TileRunner`] fans tile ids out over
//! a rayon worker pool, and a failure on one tile is logged without touching
//! its siblings. Object-storage transfer, CLI parsing, and log subscriber
//! setup are the caller's concern.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod factors;
pub mod forest_type;
pub mod gainyear;
pub mod grid;
pub mod mosaic;
pub mod pipeline;
pub mod raster;
pub mod removals;
pub mod units;

pub use error::{FluxError, Result};

/// Version of the carbonflux library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
