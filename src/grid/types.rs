//! Tile identifier and bounding-box types.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 10°×10° tile on the global equirectangular grid.
///
/// The id string encodes the tile's northwest corner, e.g. `00N_110E` is the
/// tile whose top edge sits on the equator and whose left edge sits at
/// 110°E. Internally the signed corner is stored directly: `ymax` is
/// negative for southern-hemisphere ids, `xmin` for western ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    /// Latitude of the top edge in degrees (negative = south).
    pub ymax: i32,
    /// Longitude of the left edge in degrees (negative = west).
    pub xmin: i32,
}

/// Geographic bounding box of a tile in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// Errors that can occur parsing a tile id string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileIdError {
    /// The string does not match `{lat:2}{N|S}_{lon:3}{E|W}`.
    #[error("malformed tile id '{0}' (expected e.g. 00N_110E)")]
    Malformed(String),

    /// Latitude magnitude exceeds 90.
    #[error("tile latitude {0} out of range (0..=90)")]
    LatitudeOutOfRange(u32),

    /// Longitude magnitude exceeds 180.
    #[error("tile longitude {0} out of range (0..=180)")]
    LongitudeOutOfRange(u32),
}

impl TileId {
    /// Creates a tile id from its signed northwest corner.
    pub fn new(ymax: i32, xmin: i32) -> Self {
        Self { ymax, xmin }
    }

    /// Returns the tile's bounding box.
    ///
    /// `ymin = ymax − 10`, `xmax = xmin + 10`.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            xmin: self.xmin as f64,
            ymin: (self.ymax - 10) as f64,
            xmax: (self.xmin + 10) as f64,
            ymax: self.ymax as f64,
        }
    }
}

impl FromStr for TileId {
    type Err = TileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TileIdError::Malformed(s.to_string());

        // {lat:2}{N|S}_{lon:3}{E|W} is exactly 8 ASCII characters.
        if s.len() != 8 || !s.is_ascii() || s.as_bytes()[3] != b'_' {
            return Err(malformed());
        }
        let (lat_part, lon_part) = (&s[..3], &s[4..]);

        let lat: u32 = lat_part[..2].parse().map_err(|_| malformed())?;
        let lat_sign = match &lat_part[2..3] {
            "N" => 1,
            "S" => -1,
            _ => return Err(malformed()),
        };
        let lon: u32 = lon_part[..3].parse().map_err(|_| malformed())?;
        let lon_sign = match &lon_part[3..4] {
            "E" => 1,
            "W" => -1,
            _ => return Err(malformed()),
        };

        if lat > 90 {
            return Err(TileIdError::LatitudeOutOfRange(lat));
        }
        if lon > 180 {
            return Err(TileIdError::LongitudeOutOfRange(lon));
        }

        Ok(TileId {
            ymax: lat_sign * lat as i32,
            xmin: lon_sign * lon as i32,
        })
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.ymax < 0 { 'S' } else { 'N' };
        let ew = if self.xmin < 0 { 'W' } else { 'E' };
        write!(
            f,
            "{:02}{}_{:03}{}",
            self.ymax.unsigned_abs(),
            ns,
            self.xmin.unsigned_abs(),
            ew
        )
    }
}
