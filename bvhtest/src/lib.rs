//! # bvhtest
//!
//! A seed-reproducible workload harness for spatial indexes.
//!
//! One run inserts `Additions` random orthotopes into an index. Removals and
//! queries are spread over those insertion steps at random, every operation
//! is timed on its own, and one line per operation is written to a record
//! stream. The same configuration and seed always produce the same stream,
//! apart from the measured durations.
//!
//! ## Example
//!
//! ```rust
//! use bvh_rs::Bvh;
//! use bvhtest::{run, BenchConfig, Mode, Record};
//!
//! let config = BenchConfig::from_json(r#"{
//!     "MaxBounds": {"P0": [0, 0, 0], "P1": [100, 100, 100]},
//!     "MinVol": [1, 1, 1],
//!     "MaxVol": [10, 10, 10],
//!     "Additions": 20,
//!     "Removals": 5,
//!     "Queries": 5,
//!     "RandSeed": 7
//! }"#).unwrap();
//!
//! let mut index: Bvh<usize> = Bvh::new();
//! let mut records: Vec<Record> = Vec::new();
//! let summary = run(&config, Mode::Benchmark, &mut index, &mut records).unwrap();
//! assert_eq!(summary.adds.count, 20);
//! assert_eq!(summary.final_live, index.len());
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod distribute;
pub mod driver;
pub mod error;
pub mod generator;
pub mod index;
pub mod record;
pub mod tracker;

pub use config::BenchConfig;
pub use driver::{run, Mode, RunSummary};
pub use error::{BenchError, ConfigError, GenerationError};
pub use index::SpatialIndex;
pub use record::{LineSink, Record, RecordSink};
