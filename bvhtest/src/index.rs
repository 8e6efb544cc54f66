//! The contract a spatial index must meet to be driven by the harness.

use bvh_rs::{Bvh, ItemRef, Orthotope, Query, VerifyError};

/// Operations the harness times and inspects.
///
/// Items are keyed by their insertion index, which is what `remove` hands
/// back and what `sub` records print.
pub trait SpatialIndex {
    /// Opaque token for removing one item. Valid until that item is removed.
    type Handle: Copy;

    /// Lazy sequence of matches for one query.
    type Matches<'a>: Iterator
    where
        Self: 'a;

    fn insert(&mut self, orthotope: Orthotope, key: usize) -> Self::Handle;

    /// `None` when the handle no longer refers to a live item.
    fn remove(&mut self, handle: Self::Handle) -> Option<usize>;

    fn query<'a>(&'a self, region: &Orthotope) -> Self::Matches<'a>;

    fn depth(&self) -> usize;

    fn score(&self) -> f64;

    fn verify(&self) -> Result<(), VerifyError>;
}

impl SpatialIndex for Bvh<usize> {
    type Handle = ItemRef;
    type Matches<'a> = Query<'a, usize>;

    #[inline]
    fn insert(&mut self, orthotope: Orthotope, key: usize) -> ItemRef {
        Bvh::insert(self, orthotope, key)
    }

    #[inline]
    fn remove(&mut self, handle: ItemRef) -> Option<usize> {
        Bvh::remove(self, handle)
    }

    #[inline]
    fn query<'a>(&'a self, region: &Orthotope) -> Query<'a, usize> {
        Bvh::query(self, region)
    }

    #[inline]
    fn depth(&self) -> usize {
        Bvh::depth(self)
    }

    #[inline]
    fn score(&self) -> f64 {
        Bvh::score(self)
    }

    fn verify(&self) -> Result<(), VerifyError> {
        Bvh::verify(self)
    }
}
