//! Tile grid arithmetic.
//!
//! Conversions between tile id strings, bounding boxes, geotransforms, and
//! pixel dimensions on the fixed global equirectangular grid (EPSG:4326,
//! north-up, 10°×10° tiles).

mod types;

pub use types::{BoundingBox, TileId, TileIdError};

use crate::config::defaults::TILE_SIZE_DEG;
use std::path::{Path, PathBuf};

/// Where the stage pattern sits relative to the tile id in a file name.
///
/// Tile files are named either `{tile_id}_{pattern}.tif` or
/// `{pattern}_{tile_id}.tif` depending on the pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternPlacement {
    /// `{pattern}_{tile_id}.tif`
    Prefix,
    /// `{tile_id}_{pattern}.tif`
    Suffix,
}

/// Returns the file name for a tile at a given stage.
pub fn tile_filename(tile: &TileId, pattern: &str, placement: PatternPlacement) -> String {
    match placement {
        PatternPlacement::Prefix => format!("{}_{}.tif", pattern, tile),
        PatternPlacement::Suffix => format!("{}_{}.tif", tile, pattern),
    }
}

/// Returns the full path for a tile at a given stage.
pub fn tile_path(dir: &Path, tile: &TileId, pattern: &str, placement: PatternPlacement) -> PathBuf {
    dir.join(tile_filename(tile, pattern, placement))
}

/// Number of pixels along one 10° tile edge at a given pixel size.
pub fn pixels_per_edge(pixel_deg: f64) -> usize {
    (TILE_SIZE_DEG / pixel_deg).round() as usize
}

/// Number of fine pixels along one coarse pixel edge.
///
/// 160 for 0.04° outputs, 400 for 0.1° outputs.
pub fn fine_per_coarse(fine_pixel_deg: f64, coarse_pixel_deg: f64) -> usize {
    (coarse_pixel_deg / fine_pixel_deg).round() as usize
}

/// North-up GDAL geotransform for a tile at a given pixel size.
pub fn geo_transform(tile: &TileId, pixel_deg: f64) -> [f64; 6] {
    let bounds = tile.bounds();
    [bounds.xmin, pixel_deg, 0.0, bounds.ymax, 0.0, -pixel_deg]
}

/// Scans a directory for tile files matching a stage pattern and returns the
/// tile ids found, sorted.
///
/// Files that do not match the pattern or whose id part does not parse are
/// ignored; directory listing is the only I/O performed.
pub fn tiles_in_dir(
    dir: &Path,
    pattern: &str,
    placement: PatternPlacement,
) -> std::io::Result<Vec<TileId>> {
    let mut tiles = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".tif") else {
            continue;
        };
        let id_part = match placement {
            PatternPlacement::Prefix => stem.strip_prefix(pattern).and_then(|s| s.strip_prefix('_')),
            PatternPlacement::Suffix => stem.strip_suffix(pattern).and_then(|s| s.strip_suffix('_')),
        };
        if let Some(id_part) = id_part {
            if let Ok(tile) = id_part.parse::<TileId>() {
                tiles.push(tile);
            }
        }
    }
    tiles.sort_by_key(|t| (t.ymax, t.xmin));
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{COARSE_PIXEL_DEG_004, COARSE_PIXEL_DEG_010, FINE_PIXEL_DEG};

    #[test]
    fn test_parse_equator_tile() {
        let tile: TileId = "00N_110E".parse().unwrap();
        assert_eq!(tile.ymax, 0);
        assert_eq!(tile.xmin, 110);

        let bounds = tile.bounds();
        assert_eq!(bounds.ymax, 0.0);
        assert_eq!(bounds.ymin, -10.0);
        assert_eq!(bounds.xmin, 110.0);
        assert_eq!(bounds.xmax, 120.0);
    }

    #[test]
    fn test_parse_southwest_tile() {
        let tile: TileId = "10S_060W".parse().unwrap();
        assert_eq!(tile.ymax, -10);
        assert_eq!(tile.xmin, -60);

        let bounds = tile.bounds();
        assert_eq!(bounds.ymax, -10.0);
        assert_eq!(bounds.ymin, -20.0);
        assert_eq!(bounds.xmin, -60.0);
        assert_eq!(bounds.xmax, -50.0);
    }

    #[test]
    fn test_display_roundtrip() {
        for id in ["00N_110E", "10S_060W", "80N_180W", "50S_000E"] {
            let tile: TileId = id.parse().unwrap();
            assert_eq!(tile.to_string(), id);
        }
    }

    #[test]
    fn test_malformed_ids_rejected() {
        assert!("110E_00N".parse::<TileId>().is_err());
        assert!("00X_110E".parse::<TileId>().is_err());
        assert!("00N-110E".parse::<TileId>().is_err());
        assert!("0N_110E".parse::<TileId>().is_err());
        assert!("91N_110E".parse::<TileId>().is_err());
        assert!("00N_181E".parse::<TileId>().is_err());
    }

    #[test]
    fn test_tile_filename_placement() {
        let tile: TileId = "00N_110E".parse().unwrap();
        assert_eq!(
            tile_filename(&tile, "gross_removals_co2", PatternPlacement::Suffix),
            "00N_110E_gross_removals_co2.tif"
        );
        assert_eq!(
            tile_filename(&tile, "gross_removals_co2", PatternPlacement::Prefix),
            "gross_removals_co2_00N_110E.tif"
        );
    }

    #[test]
    fn test_pixel_dimensions() {
        assert_eq!(pixels_per_edge(FINE_PIXEL_DEG), 40_000);
        assert_eq!(pixels_per_edge(COARSE_PIXEL_DEG_004), 250);
        assert_eq!(pixels_per_edge(COARSE_PIXEL_DEG_010), 100);
        assert_eq!(fine_per_coarse(FINE_PIXEL_DEG, COARSE_PIXEL_DEG_004), 160);
        assert_eq!(fine_per_coarse(FINE_PIXEL_DEG, COARSE_PIXEL_DEG_010), 400);
    }

    #[test]
    fn test_geo_transform_north_up() {
        let tile: TileId = "10S_060W".parse().unwrap();
        let gt = geo_transform(&tile, FINE_PIXEL_DEG);
        assert_eq!(gt[0], -60.0);
        assert_eq!(gt[3], -10.0);
        assert_eq!(gt[1], FINE_PIXEL_DEG);
        assert_eq!(gt[5], -FINE_PIXEL_DEG);
        assert_eq!((gt[2], gt[4]), (0.0, 0.0));
    }

    #[test]
    fn test_tiles_in_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "10S_060W_biomass.tif",
            "00N_110E_biomass.tif",
            "00N_110E_other.tif",
            "garbage_biomass.tif",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let tiles = tiles_in_dir(dir.path(), "biomass", PatternPlacement::Suffix).unwrap();
        let ids: Vec<String> = tiles.iter().map(|t| t.to_string()).collect();
        assert_eq!(ids, vec!["10S_060W", "00N_110E"]);
    }
}
