pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod network;

use crate::model::Degeneracy;
use std::time::Duration;
use thiserror::Error;

/// Substituted for any score whose measurement is numerically degenerate.
pub const SENTINEL_SCORE: f64 = 0.0;

pub const MIN_RELIABLE_ELAPSED: Duration = Duration::from_micros(1);

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// Iteration counts are fixed, never adaptive, so scores only compare across
// runs of the same binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkOutcome {
    pub score: f64,
    pub elapsed: Duration,
    /// Set when `score` is the sentinel.
    pub degenerate: Option<Degeneracy>,
}

impl BenchmarkOutcome {
    pub fn from_score(score: Result<f64, Degeneracy>, elapsed: Duration) -> Self {
        match score {
            Ok(score) => Self {
                score,
                elapsed,
                degenerate: None,
            },
            Err(reason) => Self {
                score: SENTINEL_SCORE,
                elapsed,
                degenerate: Some(reason),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("scratch file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
}

/// Units per second, rejecting timings the clock cannot resolve.
pub fn rate(units: f64, elapsed: Duration) -> Result<f64, Degeneracy> {
    if units <= 0.0 {
        return Err(Degeneracy::NoIterations);
    }
    if elapsed < MIN_RELIABLE_ELAPSED {
        return Err(Degeneracy::ElapsedBelowResolution);
    }
    let value = units / elapsed.as_secs_f64();
    if !value.is_finite() {
        return Err(Degeneracy::NonFinite);
    }
    Ok(value)
}
