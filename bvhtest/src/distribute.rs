//! Spreading a fixed number of events over insertion steps.

use rand::Rng;

/// Per-step event counts for one run.
///
/// Built once by [`EventSchedule::distribute`] and consumed step by step.
/// Removals that cannot be served at a step are pushed onto the next one with
/// [`EventSchedule::defer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchedule {
    counts: Vec<usize>,
}

impl EventSchedule {
    /// Throw `total` events at `steps` buckets, each landing on a uniformly
    /// drawn step. The result is multinomial, not an even split: bursts and
    /// empty steps are expected.
    ///
    /// With zero steps nothing is drawn and the schedule is empty.
    pub fn distribute<R: Rng + ?Sized>(rng: &mut R, total: usize, steps: usize) -> Self {
        let mut counts = vec![0; steps];
        if steps > 0 {
            for _ in 0..total {
                counts[rng.gen_range(0..steps)] += 1;
            }
        }
        Self { counts }
    }

    pub fn from_counts(counts: Vec<usize>) -> Self {
        Self { counts }
    }

    /// Events due at `step`; zero past the end.
    #[inline]
    pub fn at(&self, step: usize) -> usize {
        self.counts.get(step).copied().unwrap_or(0)
    }

    /// Move one event from `step` onto the following step. Returns `false`
    /// (and changes nothing) when `step` is the last one.
    pub fn defer(&mut self, step: usize) -> bool {
        match self.counts.get_mut(step + 1) {
            Some(next) => {
                *next += 1;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seeded_rng;

    #[test]
    fn test_zero_steps() {
        let mut rng = seeded_rng(1);
        let schedule = EventSchedule::distribute(&mut rng, 10, 0);
        assert!(schedule.is_empty());
        assert_eq!(schedule.at(0), 0);

        // No draws were consumed.
        let mut fresh = seeded_rng(1);
        assert_eq!(rng.gen::<u64>(), fresh.gen::<u64>());
    }

    #[test]
    fn test_single_step_gets_everything() {
        let schedule = EventSchedule::distribute(&mut seeded_rng(9), 17, 1);
        assert_eq!(schedule.as_slice(), &[17]);
    }

    #[test]
    fn test_deterministic() {
        let a = EventSchedule::distribute(&mut seeded_rng(5), 1000, 37);
        let b = EventSchedule::distribute(&mut seeded_rng(5), 1000, 37);
        assert_eq!(a, b);
        assert_eq!(a.total(), 1000);
    }

    #[test]
    fn test_defer() {
        let mut schedule = EventSchedule::from_counts(vec![2, 0, 1]);
        assert!(schedule.defer(0));
        assert!(schedule.defer(1));
        assert_eq!(schedule.as_slice(), &[2, 1, 2]);
        assert!(!schedule.defer(2));
        assert_eq!(schedule.as_slice(), &[2, 1, 2]);
    }

    mod props {
        use crate::distribute::EventSchedule;
        use crate::generator::seeded_rng;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_sum_and_length(seed in any::<i64>(), total in 0usize..2000, steps in 1usize..300) {
                let schedule = EventSchedule::distribute(&mut seeded_rng(seed), total, steps);
                prop_assert_eq!(schedule.len(), steps);
                prop_assert_eq!(schedule.total(), total);
            }
        }
    }
}
