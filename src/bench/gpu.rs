use super::{rate, BenchmarkOutcome};
use std::hint::black_box;
use std::time::Instant;

/// Simulated parallel throughput: Σ sin(i)·cos(i) for i = 1..n, each element
/// independent of the others. Runs on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuWorkload {
    pub iterations: u64,
}

impl GpuWorkload {
    pub fn new(iterations: u64) -> Self {
        Self { iterations }
    }

    /// Score is elements per second.
    pub fn run(&self) -> BenchmarkOutcome {
        let start = Instant::now();
        let sum = trig_kernel(black_box(self.iterations));
        let elapsed = start.elapsed();
        black_box(sum);
        BenchmarkOutcome::from_score(rate(self.iterations as f64, elapsed), elapsed)
    }
}

pub fn trig_kernel(n: u64) -> f64 {
    let mut sum = 0.0_f64;
    for i in 1..=n {
        let x = i as f64;
        sum += x.sin() * x.cos();
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::SENTINEL_SCORE;
    use crate::model::Degeneracy;

    #[test]
    fn kernel_matches_half_sine_identity() {
        // sin(x)cos(x) = sin(2x)/2
        let expected: f64 = (1..=1000).map(|i| (2.0 * i as f64).sin() / 2.0).sum();
        assert!((trig_kernel(1000) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_iterations_yield_sentinel() {
        let outcome = GpuWorkload::new(0).run();
        assert_eq!(outcome.score, SENTINEL_SCORE);
        assert_eq!(outcome.degenerate, Some(Degeneracy::NoIterations));
    }
}
