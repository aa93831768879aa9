use super::{rate, BenchmarkOutcome};
use crate::model::Degeneracy;
use std::hint::black_box;
use std::time::{Duration, Instant};
/// Scalar floating-point series: Σ 1/i² for i = 1..=n, summed in ascending order.
/// Scalar floating-point series: Σ 1/i² for i = 1..=n, in f64, summed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuWorkload {
    pub iterations: u64,
}

impl CpuWorkload {
    pub fn new(iterations: u64) -> Self {
        Self { iterations }
    }

    pub fn run(&self, base_frequency_mhz: f64, cores: usize) -> BenchmarkOutcome {
        let start = Instant::now();
        let pi = basel_pi(black_box(self.iterations));
        let elapsed = start.elapsed();
        black_box(pi);
        score_cpu(self.iterations, elapsed, base_frequency_mhz, cores)
    }
}

pub fn basel_pi(n: u64) -> f64 {
    let mut sum = 0.0_f64;
    for i in 1..=n {
        let x = i as f64;
        sum += 1.0 / (x * x);
    }
    (6.0 * sum).sqrt()
}

/// `(iterations / seconds) / (base_frequency_mhz · cores) · 10000`.
pub fn score_cpu(
    iterations: u64,
    elapsed: Duration,
    base_frequency_mhz: f64,
    cores: usize,
) -> BenchmarkOutcome {
    let score = rate(iterations as f64, elapsed).and_then(|actual_perf| {
        let base_perf = base_frequency_mhz * cores as f64;
        if !(base_perf.is_finite() && base_perf > 0.0) {
            return Err(Degeneracy::NoBaseline);
        }
        let score = (actual_perf / base_perf) * 10000.0;
        if score.is_finite() {
            Ok(score)
        } else {
            Err(Degeneracy::NonFinite)
        }
    });
    BenchmarkOutcome::from_score(score, elapsed)
}
