use super::{rate, BenchmarkError, BYTES_PER_MB};
use crate::model::Degeneracy;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Instant;
use tempfile::NamedTempFile;

const CHUNK_BYTES: usize = 1024 * 1024;

/// Writes a scratch file chunk by chunk, syncs it, then reads it back.
/// The read pass is usually served from the page cache, so `read_mb_s`
/// measures the cached path rather than the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskWorkload {
    pub file_bytes: u64,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskOutcome {
    pub write_mb_s: f64,
    pub read_mb_s: f64,
    pub write_degenerate: Option<Degeneracy>,
    pub read_degenerate: Option<Degeneracy>,
}

impl DiskOutcome {
    /// Distinct reasons across both directions, write first.
    pub fn degeneracies(&self) -> Vec<Degeneracy> {
        let mut reasons = Vec::new();
        for reason in [self.write_degenerate, self.read_degenerate].into_iter().flatten() {
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }
        reasons
    }
}

impl DiskWorkload {
    pub fn from_megabytes(file_size_mb: u64, directory: Option<PathBuf>) -> Self {
        Self {
            file_bytes: file_size_mb.saturating_mul(1024 * 1024),
            directory,
        }
    }

    pub fn run(&self) -> Result<DiskOutcome, BenchmarkError> {
        let mut file = match &self.directory {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        let chunk = vec![0xA5_u8; CHUNK_BYTES];

        let start = Instant::now();
        let mut remaining = self.file_bytes;
        while remaining > 0 {
            let n = remaining.min(CHUNK_BYTES as u64) as usize;
            file.write_all(&chunk[..n])?;
            remaining -= n as u64;
        }
        file.as_file().sync_all()?;
        let write_elapsed = start.elapsed();

        file.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0_u8; CHUNK_BYTES];
        let mut read_bytes = 0_u64;
        let start = Instant::now();
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            read_bytes += n as u64;
        }
        let read_elapsed = start.elapsed();

        let write = rate(self.file_bytes as f64 / BYTES_PER_MB, write_elapsed);
        let read = rate(read_bytes as f64 / BYTES_PER_MB, read_elapsed);
        Ok(DiskOutcome {
            write_mb_s: write.unwrap_or(super::SENTINEL_SCORE),
            read_mb_s: read.unwrap_or(super::SENTINEL_SCORE),
            write_degenerate: write.err(),
            read_degenerate: read.err(),
        })
    }
}
