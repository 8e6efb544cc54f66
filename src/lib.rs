//! # bvh-rs
//!
//! A dynamic bounding volume hierarchy over integer orthotopes.
//!
//! Items are inserted one at a time. Every insertion descends towards the
//! leaf whose bounds grow the least, splits it into a branch, and refits and
//! rebalances the ancestors on the way back up, so the tree stays within the
//! AVL height bound no matter what order items arrive in.
//!
//! ## Example
//!
//! ```rust
//! use bvh_rs::{Bvh, Orthotope};
//!
//! let mut tree: Bvh<u32> = Bvh::new();
//! let a = tree.insert(Orthotope::new([0, 0, 0], [4, 4, 4]).unwrap(), 1);
//! tree.insert(Orthotope::new([10, 10, 10], [12, 12, 12]).unwrap(), 2);
//!
//! let region = Orthotope::new([3, 3, 3], [5, 5, 5]).unwrap();
//! assert_eq!(tree.query(&region).count(), 1);
//!
//! assert_eq!(tree.remove(a), Some(1));
//! assert_eq!(tree.remove(a), None);
//! tree.verify().unwrap();
//! ```

#![warn(clippy::all)]

mod volume;

pub use volume::{Coord, Orthotope, DIM};

use smallvec::SmallVec;
use thiserror::Error;

// =============================================================================
// Slots and handles
// =============================================================================

/// Sentinel slot meaning "no node".
const NULL: u32 = u32::MAX;

/// Inline capacity of the query stack. A balanced tree over a few million
/// items stays well below this depth. Must be a size `smallvec` implements
/// `Array` for.
const QUERY_STACK_INLINE: usize = 64;

/// Handle returned by [`Bvh::insert`], used to remove that item later.
///
/// Handles carry the generation of their slot, so a handle whose item was
/// already removed (and whose slot may since have been reused) is rejected
/// instead of removing an unrelated item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemRef {
    slot: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
enum NodeKind<V> {
    Leaf(V),
    Branch([u32; 2]),
    Free { next: u32 },
}

#[derive(Clone, Debug)]
struct Node<V> {
    bounds: Orthotope,
    parent: u32,
    /// 0 for leaves, `1 + max(child heights)` for branches.
    height: u32,
    /// Bumped every time the slot is released.
    generation: u32,
    kind: NodeKind<V>,
}

// =============================================================================
// Errors
// =============================================================================

/// A broken structural invariant found by [`Bvh::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("root slot {slot} is outside the node arena")]
    DanglingRoot { slot: u32 },
    #[error("root slot {slot} has parent {parent}")]
    RootHasParent { slot: u32, parent: u32 },
    #[error("slot {slot} references child {child} outside the node arena")]
    DanglingChild { slot: u32, child: u32 },
    #[error("slot {slot} is free but reachable from the root")]
    FreeSlotReachable { slot: u32 },
    #[error("child {child} of slot {slot} records parent {found}")]
    ParentMismatch { slot: u32, child: u32, found: u32 },
    #[error("bounds of slot {slot} are not the union of its children")]
    LooseBounds { slot: u32 },
    #[error("leaf slot {slot} has inverted bounds {bounds}")]
    InvalidBounds { slot: u32, bounds: Orthotope },
    #[error("slot {slot} stores height {stored}, expected {expected}")]
    Height { slot: u32, stored: u32, expected: u32 },
    #[error("slot {slot} is unbalanced: child heights {left} and {right}")]
    Unbalanced { slot: u32, left: u32, right: u32 },
    #[error("traversal visited more nodes than the {slots} allocated slots")]
    Cycle { slots: usize },
    #[error("{found} reachable leaves, but the tree holds {expected} items")]
    LeafCount { expected: usize, found: usize },
    #[error("score accumulator {stored} does not match recomputed {expected}")]
    Score { stored: u128, expected: u128 },
}

// =============================================================================
// Tree
// =============================================================================

/// Dynamic bounding volume hierarchy mapping orthotopes to values.
///
/// Nodes live in a single arena addressed by `u32` slots; released slots are
/// threaded onto a free list and reused by later insertions.
#[derive(Clone, Debug)]
pub struct Bvh<V> {
    nodes: Vec<Node<V>>,
    free_head: u32,
    root: u32,
    count: usize,
    /// Sum of `surface()` over every branch node.
    branch_surface: u128,
}

impl<V> Bvh<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Reserve room for `items` insertions without reallocating.
    pub fn with_capacity(items: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(items.saturating_mul(2)),
            free_head: NULL,
            root: NULL,
            count: 0,
            branch_surface: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of nodes on the longest root-to-leaf path.
    #[inline]
    pub fn depth(&self) -> usize {
        if self.root == NULL {
            0
        } else {
            self.nodes[self.root as usize].height as usize + 1
        }
    }

    /// Total surface of all branch bounds. Lower is tighter.
    #[inline]
    pub fn score(&self) -> f64 {
        self.branch_surface as f64
    }

    /// Look up a live item by handle.
    pub fn get(&self, item: ItemRef) -> Option<(&Orthotope, &V)> {
        let node = self.nodes.get(item.slot as usize)?;
        match &node.kind {
            NodeKind::Leaf(value) if node.generation == item.generation => {
                Some((&node.bounds, value))
            }
            _ => None,
        }
    }

    /// Insert `bounds` with an associated value.
    pub fn insert(&mut self, bounds: Orthotope, value: V) -> ItemRef {
        let leaf = self.alloc(bounds, NULL, 0, NodeKind::Leaf(value));
        self.count += 1;
        let item = ItemRef {
            slot: leaf,
            generation: self.nodes[leaf as usize].generation,
        };

        if self.root == NULL {
            self.root = leaf;
            return item;
        }

        let sibling = self.choose_sibling(&bounds);
        let old_parent = self.nodes[sibling as usize].parent;
        let merged = self.nodes[sibling as usize].bounds.union(&bounds);
        let height = self.nodes[sibling as usize].height + 1;
        let branch = self.alloc(merged, old_parent, height, NodeKind::Branch([sibling, leaf]));
        self.branch_surface += merged.surface();
        self.nodes[sibling as usize].parent = branch;
        self.nodes[leaf as usize].parent = branch;

        if old_parent == NULL {
            self.root = branch;
        } else {
            self.replace_child(old_parent, sibling, branch);
        }
        self.fix_upwards(old_parent);
        item
    }

    /// Remove the item behind `item`, returning its value.
    ///
    /// Returns `None` if the handle is stale (already removed) or unknown.
    pub fn remove(&mut self, item: ItemRef) -> Option<V> {
        let node = self.nodes.get(item.slot as usize)?;
        if node.generation != item.generation || !matches!(node.kind, NodeKind::Leaf(_)) {
            return None;
        }
        let parent = node.parent;
        let NodeKind::Leaf(value) = self.release(item.slot) else {
            return None;
        };
        self.count -= 1;

        if parent == NULL {
            self.root = NULL;
            return Some(value);
        }

        let sibling = match self.children(parent) {
            Some([left, right]) if left == item.slot => right,
            Some([left, _]) => left,
            None => return Some(value),
        };
        let grand = self.nodes[parent as usize].parent;
        self.branch_surface -= self.nodes[parent as usize].bounds.surface();
        self.release(parent);
        self.nodes[sibling as usize].parent = grand;

        if grand == NULL {
            self.root = sibling;
        } else {
            self.replace_child(grand, parent, sibling);
            self.fix_upwards(grand);
        }
        Some(value)
    }

    /// Lazily yield every item whose bounds intersect `region`.
    pub fn query(&self, region: &Orthotope) -> Query<'_, V> {
        let mut stack = SmallVec::new();
        if self.root != NULL {
            stack.push(self.root);
        }
        Query {
            tree: self,
            region: *region,
            stack,
        }
    }

    /// Iterate over all live items in slot order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            nodes: self.nodes.iter(),
        }
    }

    /// Walk the whole tree and check every structural invariant.
    ///
    /// Read-only; calling it repeatedly without mutation gives the same answer.
    pub fn verify(&self) -> Result<(), VerifyError> {
        let mut leaves = 0usize;
        let mut surface = 0u128;

        if self.root != NULL {
            let root = self
                .nodes
                .get(self.root as usize)
                .ok_or(VerifyError::DanglingRoot { slot: self.root })?;
            if root.parent != NULL {
                return Err(VerifyError::RootHasParent {
                    slot: self.root,
                    parent: root.parent,
                });
            }

            let mut visited = 0usize;
            let mut stack = vec![self.root];
            while let Some(slot) = stack.pop() {
                visited += 1;
                if visited > self.nodes.len() {
                    return Err(VerifyError::Cycle {
                        slots: self.nodes.len(),
                    });
                }

                let node = &self.nodes[slot as usize];
                match &node.kind {
                    NodeKind::Free { .. } => {
                        return Err(VerifyError::FreeSlotReachable { slot });
                    }
                    NodeKind::Leaf(_) => {
                        if !node.bounds.is_valid() {
                            return Err(VerifyError::InvalidBounds {
                                slot,
                                bounds: node.bounds,
                            });
                        }
                        if node.height != 0 {
                            return Err(VerifyError::Height {
                                slot,
                                stored: node.height,
                                expected: 0,
                            });
                        }
                        leaves += 1;
                    }
                    &NodeKind::Branch([left, right]) => {
                        for child in [left, right] {
                            let c = self
                                .nodes
                                .get(child as usize)
                                .ok_or(VerifyError::DanglingChild { slot, child })?;
                            if c.parent != slot {
                                return Err(VerifyError::ParentMismatch {
                                    slot,
                                    child,
                                    found: c.parent,
                                });
                            }
                        }

                        let l = &self.nodes[left as usize];
                        let r = &self.nodes[right as usize];
                        let expected = 1 + l.height.max(r.height);
                        if node.height != expected {
                            return Err(VerifyError::Height {
                                slot,
                                stored: node.height,
                                expected,
                            });
                        }
                        if l.height.abs_diff(r.height) > 1 {
                            return Err(VerifyError::Unbalanced {
                                slot,
                                left: l.height,
                                right: r.height,
                            });
                        }
                        if node.bounds != l.bounds.union(&r.bounds) {
                            return Err(VerifyError::LooseBounds { slot });
                        }

                        surface += node.bounds.surface();
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }

        if leaves != self.count {
            return Err(VerifyError::LeafCount {
                expected: self.count,
                found: leaves,
            });
        }
        if surface != self.branch_surface {
            return Err(VerifyError::Score {
                stored: self.branch_surface,
                expected: surface,
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Arena
    // -------------------------------------------------------------------------

    fn alloc(&mut self, bounds: Orthotope, parent: u32, height: u32, kind: NodeKind<V>) -> u32 {
        if self.free_head != NULL {
            let slot = self.free_head;
            let node = &mut self.nodes[slot as usize];
            self.free_head = match node.kind {
                NodeKind::Free { next } => next,
                _ => NULL,
            };
            node.bounds = bounds;
            node.parent = parent;
            node.height = height;
            node.kind = kind;
            return slot;
        }

        assert!(self.nodes.len() < NULL as usize, "BVH slot space exhausted");
        let slot = self.nodes.len() as u32;
        self.nodes.push(Node {
            bounds,
            parent,
            height,
            generation: 0,
            kind,
        });
        slot
    }

    /// Put `slot` on the free list and hand back what it held.
    fn release(&mut self, slot: u32) -> NodeKind<V> {
        let node = &mut self.nodes[slot as usize];
        node.generation = node.generation.wrapping_add(1);
        node.parent = NULL;
        node.height = 0;
        let kind = std::mem::replace(
            &mut node.kind,
            NodeKind::Free {
                next: self.free_head,
            },
        );
        self.free_head = slot;
        kind
    }

    #[inline]
    fn children(&self, slot: u32) -> Option<[u32; 2]> {
        match self.nodes[slot as usize].kind {
            NodeKind::Branch(children) => Some(children),
            _ => None,
        }
    }

    #[inline]
    fn height(&self, slot: u32) -> u32 {
        self.nodes[slot as usize].height
    }

    fn replace_child(&mut self, parent: u32, old: u32, new: u32) {
        if let NodeKind::Branch(children) = &mut self.nodes[parent as usize].kind {
            for child in children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Surface growth of `slot` if it had to enclose `bounds`, then the merged
    /// surface as a tie breaker.
    #[inline]
    fn growth(&self, slot: u32, bounds: &Orthotope) -> (u128, u128) {
        let current = &self.nodes[slot as usize].bounds;
        let merged = current.union(bounds).surface();
        (merged - current.surface(), merged)
    }

    fn choose_sibling(&self, bounds: &Orthotope) -> u32 {
        let mut cur = self.root;
        while let Some([left, right]) = self.children(cur) {
            cur = if self.growth(left, bounds) <= self.growth(right, bounds) {
                left
            } else {
                right
            };
        }
        cur
    }

    /// Recompute bounds and height of a branch from its children.
    fn refit(&mut self, slot: u32) {
        let Some([left, right]) = self.children(slot) else {
            return;
        };
        let bounds = self.nodes[left as usize]
            .bounds
            .union(&self.nodes[right as usize].bounds);
        let height = 1 + self.height(left).max(self.height(right));

        let node = &mut self.nodes[slot as usize];
        self.branch_surface -= node.bounds.surface();
        self.branch_surface += bounds.surface();
        node.bounds = bounds;
        node.height = height;
    }

    /// Rebalance and refit from `slot` up to the root.
    fn fix_upwards(&mut self, mut slot: u32) {
        while slot != NULL {
            let top = self.balance(slot);
            self.refit(top);
            slot = self.nodes[top as usize].parent;
        }
    }

    /// Rotate `slot` if its children differ in height by more than one.
    /// Returns the slot now occupying that position.
    fn balance(&mut self, slot: u32) -> u32 {
        let Some([left, right]) = self.children(slot) else {
            return slot;
        };
        let (hl, hr) = (self.height(left), self.height(right));
        if hr > hl + 1 {
            self.rotate_up(slot, right, left)
        } else if hl > hr + 1 {
            self.rotate_up(slot, left, right)
        } else {
            slot
        }
    }

    /// Promote `tall` (a child of `a`) into `a`'s position. `a` keeps `short`
    /// and adopts the lower of `tall`'s children; `tall` keeps the higher one.
    fn rotate_up(&mut self, a: u32, tall: u32, short: u32) -> u32 {
        let Some([f, g]) = self.children(tall) else {
            return a;
        };
        let (keep, give) = if self.height(f) > self.height(g) {
            (f, g)
        } else {
            (g, f)
        };

        let parent = self.nodes[a as usize].parent;
        self.nodes[tall as usize].parent = parent;
        if parent == NULL {
            self.root = tall;
        } else {
            self.replace_child(parent, a, tall);
        }

        self.nodes[tall as usize].kind = NodeKind::Branch([a, keep]);
        self.nodes[a as usize].parent = tall;
        self.nodes[a as usize].kind = NodeKind::Branch([short, give]);
        self.nodes[give as usize].parent = a;

        self.refit(a);
        self.refit(tall);
        tall
    }
}

impl<V> Default for Bvh<V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Lazy range query over a [`Bvh`]. See [`Bvh::query`].
pub struct Query<'a, V> {
    tree: &'a Bvh<V>,
    region: Orthotope,
    stack: SmallVec<[u32; QUERY_STACK_INLINE]>,
}

impl<'a, V> Iterator for Query<'a, V> {
    type Item = (&'a Orthotope, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(slot) = self.stack.pop() {
            let node = &tree.nodes[slot as usize];
            if !node.bounds.intersects(&self.region) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(value) => return Some((&node.bounds, value)),
                &NodeKind::Branch([left, right]) => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
                NodeKind::Free { .. } => {}
            }
        }
        None
    }
}

/// All live items of a [`Bvh`]. See [`Bvh::iter`].
pub struct Iter<'a, V> {
    nodes: std::slice::Iter<'a, Node<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a Orthotope, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for node in self.nodes.by_ref() {
            if let NodeKind::Leaf(value) = &node.kind {
                return Some((&node.bounds, value));
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: i32, y: i32, z: i32, side: i32) -> Orthotope {
        Orthotope::new([x, y, z], [x + side, y + side, z + side]).unwrap()
    }

    #[test]
    fn test_empty() {
        let t: Bvh<u32> = Bvh::new();
        assert_eq!(t.len(), 0);
        assert_eq!(t.depth(), 0);
        assert_eq!(t.score(), 0.0);
        assert_eq!(t.query(&cube(0, 0, 0, 100)).count(), 0);
        t.verify().unwrap();
    }

    #[test]
    fn test_single_item() {
        let mut t: Bvh<u32> = Bvh::new();
        let r = t.insert(cube(1, 1, 1, 2), 7);
        assert_eq!(t.len(), 1);
        assert_eq!(t.depth(), 1);
        // No branches yet.
        assert_eq!(t.score(), 0.0);
        assert_eq!(t.get(r), Some((&cube(1, 1, 1, 2), &7)));
        t.verify().unwrap();

        assert_eq!(t.remove(r), Some(7));
        assert!(t.is_empty());
        assert_eq!(t.depth(), 0);
        t.verify().unwrap();
    }

    #[test]
    fn test_two_items_score() {
        let mut t: Bvh<u32> = Bvh::new();
        t.insert(cube(0, 0, 0, 1), 0);
        t.insert(cube(2, 0, 0, 1), 1);
        assert_eq!(t.depth(), 2);
        // Root bounds [0,3]x[0,1]x[0,1].
        assert_eq!(t.score(), (2 * (3 + 3 + 1)) as f64);
        t.verify().unwrap();
    }

    #[test]
    fn test_query() {
        let mut t: Bvh<usize> = Bvh::new();
        for i in 0..10 {
            t.insert(cube(i * 10, 0, 0, 5), i as usize);
        }
        t.verify().unwrap();

        let mut hits: Vec<usize> = t.query(&cube(12, 1, 1, 10)).map(|(_, v)| *v).collect();
        hits.sort_unstable();
        // [12,22] touches item 1 ([10,15]) and item 2 ([20,25]).
        assert_eq!(hits, vec![1, 2]);

        assert_eq!(t.query(&cube(-100, -100, -100, 1000)).count(), 10);
        assert_eq!(t.query(&cube(0, 50, 0, 5)).count(), 0);
    }

    #[test]
    fn test_query_visits_whole_degenerate_tree() {
        let mut t: Bvh<usize> = Bvh::new();
        for i in 0..4096 {
            t.insert(cube(0, 0, 0, 0), i);
        }
        let mut hits: Vec<usize> = t.query(&cube(0, 0, 0, 0)).map(|(_, v)| *v).collect();
        hits.sort_unstable();
        assert_eq!(hits, (0..4096).collect::<Vec<_>>());
        assert_eq!(t.query(&cube(1, 1, 1, 0)).count(), 0);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut t: Bvh<u32> = Bvh::new();
        let a = t.insert(cube(0, 0, 0, 1), 1);
        let b = t.insert(cube(5, 5, 5, 1), 2);
        assert_eq!(t.remove(a), Some(1));
        assert_eq!(t.remove(a), None);

        // The freed slots get reused; the old handle must still miss.
        let c = t.insert(cube(9, 9, 9, 1), 3);
        assert_eq!(t.remove(a), None);
        assert_eq!(t.get(a), None);
        assert_eq!(t.len(), 2);
        assert_eq!(t.remove(b), Some(2));
        assert_eq!(t.remove(c), Some(3));
        t.verify().unwrap();
    }

    #[test]
    fn test_depth_stays_logarithmic() {
        let mut t: Bvh<u32> = Bvh::new();
        // A degenerate sequence: every item lands at the same spot, so the
        // surface heuristic alone would build a list.
        for i in 0..4096 {
            t.insert(cube(0, 0, 0, 0), i);
        }
        t.verify().unwrap();
        // AVL bound: height < 1.45 * log2(n + 2).
        assert!(t.depth() <= 18, "depth {}", t.depth());
    }

    #[test]
    fn test_verify_idempotent() {
        let mut t: Bvh<u32> = Bvh::new();
        for i in 0..100 {
            t.insert(cube(i, i * 2, i * 3, 4), i as u32);
        }
        let first = t.verify();
        let second = t.verify();
        assert_eq!(first, second);
        assert!(first.is_ok());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut t: Bvh<u32> = Bvh::new();
        for i in 0..8 {
            t.insert(cube(i * 3, 0, 0, 2), i as u32);
        }
        t.branch_surface += 1;
        assert!(matches!(t.verify(), Err(VerifyError::Score { .. })));
        t.branch_surface -= 1;

        let root = t.root as usize;
        t.nodes[root].bounds.p1[0] += 1;
        assert_eq!(
            t.verify(),
            Err(VerifyError::LooseBounds { slot: t.root })
        );
    }

    #[test]
    fn test_randomized_insert_remove_query() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut t: Bvh<usize> = Bvh::new();
        let mut live: Vec<(ItemRef, Orthotope, usize)> = Vec::new();

        for i in 0..5000 {
            if live.is_empty() || rng.gen_range(0..100) < 60 {
                let orth = cube(
                    rng.gen_range(0..1000),
                    rng.gen_range(0..1000),
                    rng.gen_range(0..1000),
                    rng.gen_range(0..50),
                );
                live.push((t.insert(orth, i), orth, i));
            } else {
                let idx = rng.gen_range(0..live.len());
                let (r, _, v) = live.swap_remove(idx);
                assert_eq!(t.remove(r), Some(v));
            }

            if i % 97 == 0 {
                t.verify().unwrap();
                let region = cube(
                    rng.gen_range(0..1000),
                    rng.gen_range(0..1000),
                    rng.gen_range(0..1000),
                    rng.gen_range(0..200),
                );
                let mut got: Vec<usize> = t.query(&region).map(|(_, v)| *v).collect();
                let mut expected: Vec<usize> = live
                    .iter()
                    .filter(|(_, o, _)| o.intersects(&region))
                    .map(|(_, _, v)| *v)
                    .collect();
                got.sort_unstable();
                expected.sort_unstable();
                assert_eq!(got, expected);
            }
        }

        assert_eq!(t.len(), live.len());
        assert_eq!(t.iter().count(), live.len());
        t.verify().unwrap();
    }

    #[test]
    fn test_clone() {
        let mut t: Bvh<u32> = Bvh::new();
        let a = t.insert(cube(0, 0, 0, 1), 1);
        t.insert(cube(3, 3, 3, 1), 2);
        let mut t2 = t.clone();
        assert_eq!(t2.remove(a), Some(1));
        assert_eq!(t.len(), 2);
        assert_eq!(t2.len(), 1);
        t.verify().unwrap();
        t2.verify().unwrap();
    }
}

#[cfg(test)]
mod proptests;
