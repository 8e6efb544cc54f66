//! JSON run configuration.
//!
//! ```json
//! {
//!   "MaxBounds": { "P0": [0, 0, 0], "P1": [10000, 10000, 10000] },
//!   "MinVol": [10, 10, 10],
//!   "MaxVol": [400, 400, 400],
//!   "Additions": 100000,
//!   "Removals": 50000,
//!   "Queries": 20000,
//!   "RandSeed": 1
//! }
//! ```

use std::fs;
use std::path::Path;

use bvh_rs::{Coord, Orthotope, DIM};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generator::{seeded_rng, BenchRng, OrthotopeGenerator};

/// Corners of the coordinate universe, as spelled in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bounds {
    pub p0: [Coord; DIM],
    pub p1: [Coord; DIM],
}

impl From<Bounds> for Orthotope {
    fn from(bounds: Bounds) -> Self {
        Orthotope {
            p0: bounds.p0,
            p1: bounds.p1,
        }
    }
}

/// Immutable description of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BenchConfig {
    pub max_bounds: Bounds,
    /// Inclusive lower bound on generated extents, per axis.
    pub min_vol: [Coord; DIM],
    /// Exclusive upper bound on generated extents, per axis.
    pub max_vol: [Coord; DIM],
    pub additions: usize,
    #[serde(default)]
    pub removals: usize,
    #[serde(default)]
    pub queries: usize,
    #[serde(default)]
    pub rand_seed: i64,
}

impl BenchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check that every orthotope draw has a non-empty range.
    pub fn validate_generation(&self) -> Result<(), ConfigError> {
        for axis in 0..DIM {
            let (min, max) = (self.min_vol[axis], self.max_vol[axis]);
            if min < 0 || min >= max {
                return Err(ConfigError::ExtentRange { axis, min, max });
            }
            // The largest extent drawn is max - 1; its corner range is
            // [0, bound - (max - 1)).
            let bound = self.max_bounds.p1[axis];
            if i64::from(bound) - i64::from(max - 1) <= 0 {
                return Err(ConfigError::BoundsTooSmall {
                    axis,
                    bound,
                    extent: max - 1,
                });
            }
        }
        Ok(())
    }

    /// Generation checks plus `Removals <= Additions`.
    pub fn validate_benchmark(&self) -> Result<(), ConfigError> {
        if self.removals > self.additions {
            return Err(ConfigError::RemovalsExceedAdditions {
                removals: self.removals,
                additions: self.additions,
            });
        }
        self.validate_generation()
    }

    pub fn generator(&self) -> OrthotopeGenerator {
        OrthotopeGenerator::new(&self.max_bounds.into(), self.min_vol, self.max_vol)
    }

    pub fn rng(&self) -> BenchRng {
        seeded_rng(self.rand_seed)
    }
}
