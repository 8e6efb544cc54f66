//! Error taxonomy for a benchmark run.
//!
//! Configuration problems are caught before the index is touched, generation
//! problems abort mid-run, and structural violations surface only from the
//! final verification. Each class maps to its own process exit code.

use std::io;
use std::path::PathBuf;

use bvh_rs::VerifyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Incorrect config, removals larger than additions.")]
    RemovalsExceedAdditions { removals: usize, additions: usize },
    #[error("Incorrect config, MinVol[{axis}] = {min} must be non-negative and below MaxVol[{axis}] = {max}.")]
    ExtentRange { axis: usize, min: i32, max: i32 },
    #[error("Incorrect config, MaxBounds.P1[{axis}] = {bound} leaves no room for an extent of {extent}.")]
    BoundsTooSmall { axis: usize, bound: i32, extent: i32 },
}

/// A random draw whose range is empty or would leave the coordinate type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("empty extent range [{min}, {max}) on axis {axis}")]
    EmptyExtentRange { axis: usize, min: i32, max: i32 },
    #[error("negative minimum extent {min} on axis {axis}")]
    NegativeExtent { axis: usize, min: i32 },
    #[error("empty corner range [0, {upper}) on axis {axis} for extent {extent}")]
    EmptyCornerRange { axis: usize, upper: i64, extent: i32 },
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("structural invariant violation: {0}")]
    Verification(#[from] VerifyError),
    #[error("failed to write records: {0}")]
    Output(#[from] io::Error),
}

impl BenchError {
    /// Process exit status for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Generation(_) => 3,
            Self::Verification(_) => 4,
            Self::Output(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            BenchError::Config(ConfigError::RemovalsExceedAdditions {
                removals: 2,
                additions: 1,
            }),
            BenchError::Generation(GenerationError::NegativeExtent { axis: 0, min: -1 }),
            BenchError::Verification(VerifyError::LooseBounds { slot: 0 }),
            BenchError::Output(io::Error::new(io::ErrorKind::BrokenPipe, "closed")),
        ];
        let mut codes: Vec<u8> = errors.iter().map(BenchError::exit_code).collect();
        codes.dedup();
        assert_eq!(codes, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_removal_message() {
        let err = ConfigError::RemovalsExceedAdditions {
            removals: 10,
            additions: 5,
        };
        assert_eq!(
            err.to_string(),
            "Incorrect config, removals larger than additions."
        );
    }
}
