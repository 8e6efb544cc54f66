//! Removal bookkeeping.
//!
//! Every insertion appends one [`Insertion`] to an append-only log, holding
//! the orthotope, the index handle and a removed flag. Removal attempts at
//! step `a` draw a candidate in `[0, a]` and, if it is already gone, scan
//! forward (never wrapping) for a live one. When the scan runs past `a` the
//! attempt is carried to step `a + 1`, or dropped at the last step, so a run
//! can realize fewer removals than it scheduled. The shortfall is fixed by
//! the seed.

use bvh_rs::Orthotope;
use rand::Rng;

use crate::distribute::EventSchedule;

/// One inserted item. Entries are never removed from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion<H> {
    pub orthotope: Orthotope,
    pub handle: H,
    pub removed: bool,
}

/// Append-only record of every insertion in a run, indexed by step.
#[derive(Debug, Clone)]
pub struct InsertionLog<H> {
    entries: Vec<Insertion<H>>,
    removed: usize,
}

impl<H> InsertionLog<H> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            removed: 0,
        }
    }

    /// Append an insertion and return its index.
    pub fn push(&mut self, orthotope: Orthotope, handle: H) -> usize {
        self.entries.push(Insertion {
            orthotope,
            handle,
            removed: false,
        });
        self.entries.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn removed_count(&self) -> usize {
        self.removed
    }

    pub fn live_count(&self) -> usize {
        self.entries.len() - self.removed
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Insertion<H>> {
        self.entries.iter()
    }

    /// First live index in `[candidate, last]`, marked removed on the way
    /// out. Indices below `candidate` are not considered.
    pub fn claim_from(&mut self, candidate: usize, last: usize) -> Option<usize> {
        let last = last.min(self.entries.len().checked_sub(1)?);
        let index = (candidate..=last).find(|&i| !self.entries[i].removed)?;
        self.entries[index].removed = true;
        self.removed += 1;
        Some(index)
    }
}

/// What became of one removal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome<H> {
    /// `index` was live and is now marked removed; `handle` must be passed to
    /// the index.
    Selected { index: usize, handle: H },
    /// Nothing live at or after the candidate; retried at the next step.
    Deferred,
    /// Nothing live at or after the candidate, and no step left to retry.
    Dropped,
}

/// Insertion log plus the removal schedule it is consumed against.
#[derive(Debug, Clone)]
pub struct RemovalTracker<H> {
    log: InsertionLog<H>,
    schedule: EventSchedule,
}

impl<H: Copy> RemovalTracker<H> {
    pub fn new(schedule: EventSchedule) -> Self {
        Self {
            log: InsertionLog::with_capacity(schedule.len()),
            schedule,
        }
    }

    pub fn record_insertion(&mut self, orthotope: Orthotope, handle: H) -> usize {
        self.log.push(orthotope, handle)
    }

    /// Removal attempts scheduled for `step`, including carried ones.
    #[inline]
    pub fn due(&self, step: usize) -> usize {
        self.schedule.at(step)
    }

    /// Make one removal attempt at `step`, where items `[0, step]` have been
    /// inserted. Always consumes exactly one draw from `rng`.
    pub fn attempt<R: Rng + ?Sized>(&mut self, rng: &mut R, step: usize) -> RemovalOutcome<H> {
        debug_assert!(step < self.log.len(), "removal attempt before insertion {step}");
        let candidate = rng.gen_range(0..=step);
        match self.log.claim_from(candidate, step) {
            Some(index) => RemovalOutcome::Selected {
                index,
                handle: self.log.entries[index].handle,
            },
            None if self.schedule.defer(step) => RemovalOutcome::Deferred,
            None => RemovalOutcome::Dropped,
        }
    }

    pub fn log(&self) -> &InsertionLog<H> {
        &self.log
    }

    pub fn schedule(&self) -> &EventSchedule {
        &self.schedule
    }
}
