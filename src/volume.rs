//! Axis-aligned integer orthotopes (hyperrectangles).

use std::fmt;

/// Number of dimensions of every orthotope stored in the hierarchy.
pub const DIM: usize = 3;

/// Coordinate type shared by all volumes.
pub type Coord = i32;

/// An axis-aligned box with a minimum corner `p0` and a maximum corner `p1`.
///
/// A well-formed orthotope has `p0[d] <= p1[d]` on every axis. The fields are
/// public so callers can build volumes directly; [`Orthotope::new`] is the
/// checked constructor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Orthotope {
    pub p0: [Coord; DIM],
    pub p1: [Coord; DIM],
}

impl Orthotope {
    /// Build an orthotope, returning `None` if any axis has `p0 > p1`.
    pub fn new(p0: [Coord; DIM], p1: [Coord; DIM]) -> Option<Self> {
        let orth = Self { p0, p1 };
        orth.is_valid().then_some(orth)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        (0..DIM).all(|d| self.p0[d] <= self.p1[d])
    }

    /// Length along axis `d`. Zero for malformed axes.
    #[inline]
    pub fn extent(&self, d: usize) -> u64 {
        (i64::from(self.p1[d]) - i64::from(self.p0[d])).max(0) as u64
    }

    /// Smallest orthotope enclosing both `self` and `other`.
    #[inline]
    pub fn union(&self, other: &Orthotope) -> Orthotope {
        let mut out = *self;
        for d in 0..DIM {
            out.p0[d] = out.p0[d].min(other.p0[d]);
            out.p1[d] = out.p1[d].max(other.p1[d]);
        }
        out
    }

    /// Closed-interval overlap test: boxes that only touch do intersect.
    #[inline]
    pub fn intersects(&self, other: &Orthotope) -> bool {
        (0..DIM).all(|d| self.p0[d] <= other.p1[d] && other.p0[d] <= self.p1[d])
    }

    /// Generalized surface area: twice the sum of extent products over every
    /// pair of axes. In three dimensions this is the ordinary box surface.
    pub fn surface(&self) -> u128 {
        let mut sum = 0u128;
        for i in 0..DIM {
            for j in (i + 1)..DIM {
                sum += u128::from(self.extent(i)) * u128::from(self.extent(j));
            }
        }
        sum * 2
    }
}

/// Renders as `{[x0 y0 z0] [x1 y1 z1]}`.
impl fmt::Display for Orthotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn corner(f: &mut fmt::Formatter<'_>, p: &[Coord; DIM]) -> fmt::Result {
            f.write_str("[")?;
            for (d, c) in p.iter().enumerate() {
                if d > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str("]")
        }

        f.write_str("{")?;
        corner(f, &self.p0)?;
        f.write_str(" ")?;
        corner(f, &self.p1)?;
        f.write_str("}")
    }
}
