//! Typed removal-factor lookup.
//!
//! Annual carbon-accumulation rates for natural forest depend on where a
//! pixel sits (continent, ecozone) and how old its forest is. The original
//! model encoded those categorical fields into one composite integer via
//! multiplication and addition; here the lookup is keyed by a structured
//! [`FactorKey`] with the same override precedence and none of the
//! magic-number encoding: an exact key wins over a continent+ecozone entry,
//! which wins over the table default.

use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;

/// Forest age category of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeCategory {
    /// Secondary forest ≤ 20 years old.
    YoungSecondary,
    /// Secondary forest > 20 years old.
    OldSecondary,
    /// Primary forest.
    Primary,
}

impl AgeCategory {
    /// Decodes the raster code (1..=3); anything else is nodata.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(AgeCategory::YoungSecondary),
            2 => Some(AgeCategory::OldSecondary),
            3 => Some(AgeCategory::Primary),
            _ => None,
        }
    }
}

/// Structured lookup key for removal factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactorKey {
    /// Continent code as carried by the continent raster.
    pub continent: u8,
    /// FAO ecozone code.
    pub ecozone: u8,
    pub age: AgeCategory,
}

/// Annual removal rates for one key, in t C/ha/yr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemovalFactor {
    /// Above-ground carbon rate.
    pub agc_rate: f32,
    /// Combined above- and below-ground carbon rate.
    pub agc_bgc_rate: f32,
}

/// Removal-factor table with override precedence.
#[derive(Debug, Clone)]
pub struct RemovalFactorTable {
    exact: HashMap<FactorKey, RemovalFactor>,
    by_region: HashMap<(u8, u8), RemovalFactor>,
    default: RemovalFactor,
}

impl RemovalFactorTable {
    /// Creates a table with only the global default rate.
    pub fn new(default: RemovalFactor) -> Self {
        Self {
            exact: HashMap::new(),
            by_region: HashMap::new(),
            default,
        }
    }

    /// Registers a rate for an exact (continent, ecozone, age) key.
    pub fn insert(&mut self, key: FactorKey, factor: RemovalFactor) {
        self.exact.insert(key, factor);
    }

    /// Registers an age-independent rate for a continent+ecozone region.
    pub fn insert_region(&mut self, continent: u8, ecozone: u8, factor: RemovalFactor) {
        self.by_region.insert((continent, ecozone), factor);
    }

    /// Looks up the rate for a key, most specific entry first.
    pub fn lookup(&self, key: &FactorKey) -> RemovalFactor {
        if let Some(factor) = self.exact.get(key) {
            return *factor;
        }
        if let Some(factor) = self.by_region.get(&(key.continent, key.ecozone)) {
            return *factor;
        }
        self.default
    }

    /// Assigns annual AGC+BGC rates to one window of categorical rasters.
    ///
    /// Pixels whose age code is nodata get rate 0.
    pub fn rate_window(
        &self,
        continent: ArrayView2<u8>,
        ecozone: ArrayView2<u8>,
        age: ArrayView2<u8>,
    ) -> Array2<f32> {
        debug_assert_eq!(continent.dim(), ecozone.dim());
        debug_assert_eq!(continent.dim(), age.dim());

        let mut out = Array2::<f32>::zeros(continent.dim());
        for ((row, col), out_value) in out.indexed_iter_mut() {
            let Some(age) = AgeCategory::from_code(age[[row, col]]) else {
                continue;
            };
            let key = FactorKey {
                continent: continent[[row, col]],
                ecozone: ecozone[[row, col]],
                age,
            };
            *out_value = self.lookup(&key).agc_bgc_rate;
        }
        out
    }
}
