use super::{rate, BenchmarkOutcome, BYTES_PER_MB};
use std::hint::black_box;
use std::time::Instant;

/// The score is MB/s moved in both directions combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWorkload {
    pub buffer_bytes: usize,
    pub passes: u32,
}

impl MemoryWorkload {
    pub fn from_megabytes(buffer_mb: u64, passes: u32) -> Self {
        let buffer_bytes = usize::try_from(buffer_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX);
        Self {
            buffer_bytes,
            passes,
        }
    }

    pub fn run(&self) -> BenchmarkOutcome {
        let words = self.buffer_bytes / std::mem::size_of::<u64>();
        let mut buffer = vec![0_u64; words];

        let start = Instant::now();
        for pass in 0..self.passes {
            let salt = u64::from(pass);
            for (i, word) in buffer.iter_mut().enumerate() {
                *word = (i as u64) ^ salt;
            }
            let checksum = buffer.iter().fold(0_u64, |acc, w| acc.wrapping_add(*w));
            black_box(checksum);
        }
        let elapsed = start.elapsed();

        let moved_bytes = words as f64 * 8.0 * 2.0 * f64::from(self.passes);
        BenchmarkOutcome::from_score(rate(moved_bytes / BYTES_PER_MB, elapsed), elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Degeneracy;

    #[test]
    fn small_buffer_reports_throughput() {
        let outcome = MemoryWorkload::from_megabytes(4, 2).run();
        if outcome.degenerate.is_none() {
            assert!(outcome.score > 0.0);
        }
    }

    #[test]
    fn empty_buffer_is_degenerate() {
        let outcome = MemoryWorkload {
            buffer_bytes: 4,
            passes: 3,
        }
        .run();
        assert_eq!(outcome.degenerate, Some(Degeneracy::NoIterations));
        assert_eq!(outcome.score, 0.0);
    }
}
