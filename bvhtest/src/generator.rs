//! Random orthotope generation.

use bvh_rs::{Coord, Orthotope, DIM};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::GenerationError;

/// The single random source threaded through a run.
///
/// ChaCha output is specified independently of platform and `rand` release, so
/// a seed names the same workload everywhere.
pub type BenchRng = ChaCha20Rng;

/// Seed a run's random source. The seed is reinterpreted bit for bit.
pub fn seeded_rng(seed: i64) -> BenchRng {
    BenchRng::seed_from_u64(seed as u64)
}

/// Draws orthotopes with per-axis extents in `[min_extent, max_extent)`,
/// placed so that they fit inside `[0, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrthotopeGenerator {
    upper: [Coord; DIM],
    min_extent: [Coord; DIM],
    max_extent: [Coord; DIM],
}

impl OrthotopeGenerator {
    /// Only the maximum corner of `max_bounds` matters: minimum corners are
    /// always drawn from zero.
    pub fn new(max_bounds: &Orthotope, min_extent: [Coord; DIM], max_extent: [Coord; DIM]) -> Self {
        Self {
            upper: max_bounds.p1,
            min_extent,
            max_extent,
        }
    }

    /// Draw one orthotope. Each axis consumes two draws, extent first and
    /// then the minimum corner, in axis order.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Orthotope, GenerationError> {
        let mut orth = Orthotope::default();
        for axis in 0..DIM {
            let (min, max) = (self.min_extent[axis], self.max_extent[axis]);
            if min >= max {
                return Err(GenerationError::EmptyExtentRange { axis, min, max });
            }
            if min < 0 {
                return Err(GenerationError::NegativeExtent { axis, min });
            }
            let extent = rng.gen_range(min..max);

            let upper = i64::from(self.upper[axis]) - i64::from(extent);
            if upper <= 0 {
                return Err(GenerationError::EmptyCornerRange {
                    axis,
                    upper,
                    extent,
                });
            }
            // upper <= Coord::MAX because extent >= 0.
            let p0 = rng.gen_range(0..upper as Coord);
            orth.p0[axis] = p0;
            orth.p1[axis] = p0 + extent;
        }
        Ok(orth)
    }
}
