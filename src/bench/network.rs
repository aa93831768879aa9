use super::{rate, BenchmarkError, SENTINEL_SCORE};
use crate::model::Degeneracy;
use reqwest::Client;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkWorkload {
    pub url: String,
    pub download_bytes: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkOutcome {
    pub latency_ms: f64,
    pub bandwidth_mbps: f64,
    /// Set when `bandwidth_mbps` is the sentinel.
    pub degenerate: Option<Degeneracy>,
}

impl NetworkWorkload {
    pub fn download_url(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}bytes={}", self.url, self.download_bytes)
    }

    pub async fn run(&self, client: &Client) -> Result<NetworkOutcome, BenchmarkError> {
        let ping_start = Instant::now();
        let head = client
            .head(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        let latency_ms = ping_start.elapsed().as_secs_f64() * 1000.0;
        if head.status().is_server_error() {
            return Err(BenchmarkError::Status(head.status().as_u16()));
        }

        let down_start = Instant::now();
        let down = client
            .get(self.download_url())
            .timeout(self.timeout)
            .send()
            .await?;
        if !down.status().is_success() {
            return Err(BenchmarkError::Status(down.status().as_u16()));
        }
        let body = down.bytes().await?;
        let down_elapsed = down_start.elapsed();
        let megabits = (body.len() as f64) * 8.0 / 1_000_000.0;
        let (bandwidth_mbps, degenerate) = match rate(megabits, down_elapsed) {
            Ok(mbps) => (mbps, None),
            Err(reason) => (SENTINEL_SCORE, Some(reason)),
        };

        Ok(NetworkOutcome {
            latency_ms,
            bandwidth_mbps,
            degenerate,
        })
    }
}
