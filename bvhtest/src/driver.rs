//! Run orchestration.
//!
//! A benchmark run walks `Additions` steps. Each step inserts one generated
//! orthotope, serves the removals and queries scheduled for that step, and
//! emits one record per operation. After the last step the index verifies
//! its own structure. A comparison run only inserts, reporting depth and
//! score after every insertion.
//!
//! Timers wrap the index call alone; drawing the orthotope happens before
//! the clock starts.

use std::time::Instant;

use bvh_rs::Orthotope;

use crate::config::BenchConfig;
use crate::distribute::EventSchedule;
use crate::error::{BenchError, ConfigError};
use crate::generator::{BenchRng, OrthotopeGenerator};
use crate::index::SpatialIndex;
use crate::record::{Record, RecordSink};
use crate::tracker::{RemovalOutcome, RemovalTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Interleaved insertions, removals and queries.
    Benchmark,
    /// Insertions only, one growth record per insertion.
    Comparison,
}

impl Mode {
    /// Configuration checks a run in this mode needs before it starts.
    pub fn validate(self, config: &BenchConfig) -> Result<(), ConfigError> {
        match self {
            Mode::Benchmark => config.validate_benchmark(),
            Mode::Comparison => config.validate_generation(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running { step: usize },
    Verifying,
    Done,
}

/// Count and accumulated duration of one kind of operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpTotals {
    pub count: usize,
    pub nanos: u128,
}

impl OpTotals {
    #[inline]
    fn record(&mut self, nanos: u128) {
        self.count += 1;
        self.nanos += nanos;
    }

    /// Mean duration, zero when nothing ran.
    pub fn mean_nanos(&self) -> u128 {
        if self.count == 0 {
            0
        } else {
            self.nanos / self.count as u128
        }
    }
}

/// Aggregate figures for a finished run. Never part of the record stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub adds: OpTotals,
    /// Removals the index performed.
    pub subs: OpTotals,
    pub queries: OpTotals,
    /// Removals requested by the configuration.
    pub removals_scheduled: usize,
    /// Attempts pushed to a later step (an attempt can be pushed repeatedly).
    pub removals_deferred: usize,
    /// Attempts abandoned at the last step.
    pub removals_dropped: usize,
    /// Removals the index reported it could not perform.
    pub removal_misses: usize,
    pub final_live: usize,
    pub final_depth: usize,
}

impl RunSummary {
    pub fn log(&self) {
        log::info!(
            "adds: {} ({} ns mean), subs: {} ({} ns mean), queries: {} ({} ns mean)",
            self.adds.count,
            self.adds.mean_nanos(),
            self.subs.count,
            self.subs.mean_nanos(),
            self.queries.count,
            self.queries.mean_nanos(),
        );
        log::info!(
            "removals: {} realized of {} scheduled, {} deferred, {} dropped; final live {} at depth {}",
            self.subs.count,
            self.removals_scheduled,
            self.removals_deferred,
            self.removals_dropped,
            self.final_live,
            self.final_depth,
        );
        if self.removal_misses > 0 {
            log::warn!("index missed {} removals", self.removal_misses);
        }
    }
}

/// Validate `config` for `mode` and execute one run against `index`.
///
/// Configuration errors are returned before the index or the sink is touched.
pub fn run<I, S>(
    config: &BenchConfig,
    mode: Mode,
    index: &mut I,
    sink: &mut S,
) -> Result<RunSummary, BenchError>
where
    I: SpatialIndex,
    S: RecordSink,
{
    mode.validate(config)?;

    let mut harness = Harness::new(config, index, sink);
    match mode {
        Mode::Benchmark => harness.benchmark(config)?,
        Mode::Comparison => harness.comparison(config.additions)?,
    }
    Ok(harness.summary)
}

struct Harness<'a, I, S> {
    index: &'a mut I,
    sink: &'a mut S,
    generator: OrthotopeGenerator,
    rng: BenchRng,
    phase: Phase,
    /// Items inserted minus items removed, as seen by the harness.
    live: usize,
    summary: RunSummary,
}

impl<'a, I: SpatialIndex, S: RecordSink> Harness<'a, I, S> {
    fn new(config: &BenchConfig, index: &'a mut I, sink: &'a mut S) -> Self {
        Self {
            index,
            sink,
            generator: config.generator(),
            rng: config.rng(),
            phase: Phase::Idle,
            live: 0,
            summary: RunSummary::default(),
        }
    }

    fn enter(&mut self, phase: Phase) {
        if !matches!(phase, Phase::Running { .. }) {
            log::debug!("{:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
    }

    /// Generate and insert the item for `step`.
    fn add(&mut self, step: usize) -> Result<(I::Handle, Orthotope, u128), BenchError> {
        self.enter(Phase::Running { step });
        let orthotope = self.generator.generate(&mut self.rng)?;

        let start = Instant::now();
        let handle = self.index.insert(orthotope, step);
        let nanos = start.elapsed().as_nanos();

        self.live += 1;
        self.summary.adds.record(nanos);
        Ok((handle, orthotope, nanos))
    }

    fn benchmark(&mut self, config: &BenchConfig) -> Result<(), BenchError> {
        // Both schedules are drawn before the first orthotope.
        let removals = EventSchedule::distribute(&mut self.rng, config.removals, config.additions);
        let queries = EventSchedule::distribute(&mut self.rng, config.queries, config.additions);
        let mut tracker: RemovalTracker<I::Handle> = RemovalTracker::new(removals);
        self.summary.removals_scheduled = config.removals;

        for step in 0..config.additions {
            let (handle, orthotope, nanos) = self.add(step)?;
            tracker.record_insertion(orthotope, handle);
            self.sink.emit(Record::Add {
                live: self.live,
                depth: self.index.depth(),
                nanos,
                orthotope,
            })?;

            for _ in 0..tracker.due(step) {
                match tracker.attempt(&mut self.rng, step) {
                    RemovalOutcome::Selected { index, handle } => self.sub(index, handle)?,
                    RemovalOutcome::Deferred => {
                        self.summary.removals_deferred += 1;
                        log::trace!("removal at step {step} deferred to step {}", step + 1);
                    }
                    RemovalOutcome::Dropped => {
                        self.summary.removals_dropped += 1;
                        log::debug!("removal at final step {step} dropped");
                    }
                }
            }

            for _ in 0..queries.at(step) {
                self.query()?;
            }
        }

        self.finish()?;
        self.enter(Phase::Verifying);
        if let Err(err) = self.index.verify() {
            log::error!("verification failed after {} steps: {err}", config.additions);
            return Err(err.into());
        }
        self.enter(Phase::Done);
        Ok(())
    }

    /// Remove insertion `index`. The tracker has already marked it removed, so
    /// the live count follows the tracker even if the index reports a miss.
    fn sub(&mut self, index: usize, handle: I::Handle) -> Result<(), BenchError> {
        let start = Instant::now();
        let removed = self.index.remove(handle);
        let nanos = start.elapsed().as_nanos();

        if removed == Some(index) {
            self.summary.subs.record(nanos);
        } else {
            self.summary.removal_misses += 1;
            log::warn!("index returned {removed:?} when removing insertion {index}");
        }
        self.live -= 1;
        self.sink.emit(Record::Sub {
            live: self.live,
            depth: self.index.depth(),
            nanos,
            key: index,
        })?;
        Ok(())
    }

    fn query(&mut self) -> Result<(), BenchError> {
        let region = self.generator.generate(&mut self.rng)?;

        let start = Instant::now();
        let count = self.index.query(&region).count();
        let nanos = start.elapsed().as_nanos();

        self.summary.queries.record(nanos);
        self.sink.emit(Record::Que {
            live: self.live,
            depth: self.index.depth(),
            nanos,
            count,
            region,
        })?;
        Ok(())
    }

    fn comparison(&mut self, additions: usize) -> Result<(), BenchError> {
        for step in 0..additions {
            // The handle is discarded: nothing is ever removed in this mode.
            let _ = self.add(step)?;
            self.sink.emit(Record::Growth {
                step,
                depth: self.index.depth(),
                score: self.index.score(),
            })?;
        }
        self.finish()?;
        self.enter(Phase::Done);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BenchError> {
        self.sink.finish()?;
        self.summary.final_live = self.live;
        self.summary.final_depth = self.index.depth();
        Ok(())
    }
}
