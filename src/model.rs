use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemInfo {
    pub os_name: String,
    pub cpu_name: String,
    pub cpu_cores: usize,
    pub cpu_threads: usize,
    pub memory_size: u64,
    pub gpu_name: String,
    /// Megabytes; 0 when the platform does not report it.
    pub gpu_memory: u64,
    pub disk_names: Vec<String>,
}

impl SystemInfo {
    pub fn memory_gib(&self) -> f64 {
        self.memory_size as f64 / 1024.0 / 1024.0 / 1024.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Read from a hardware sensor.
    Measured,
    /// Bounded pseudo-random value; no sensor was available.
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureReading {
    pub celsius: f64,
    pub source: ReadingSource,
}

impl TemperatureReading {
    pub fn measured(celsius: f64) -> Self {
        Self {
            celsius,
            source: ReadingSource::Measured,
        }
    }

    pub fn simulated(celsius: f64) -> Self {
        Self {
            celsius,
            source: ReadingSource::Simulated,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.source == ReadingSource::Simulated
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C", self.celsius)?;
        if self.is_simulated() {
            write!(f, " (simulated)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Cpu,
    Gpu,
    Memory,
    Disk,
    Network,
}

impl Subsystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Cpu => "cpu",
            Subsystem::Gpu => "gpu",
            Subsystem::Memory => "memory",
            Subsystem::Disk => "disk",
            Subsystem::Network => "network",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a score was replaced by the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    NoIterations,
    ElapsedBelowResolution,
    NoBaseline,
    NonFinite,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Degeneracy::NoIterations => "workload executed zero iterations",
            Degeneracy::ElapsedBelowResolution => "elapsed time below clock resolution",
            Degeneracy::NoBaseline => "baseline performance is zero",
            Degeneracy::NonFinite => "measurement was not a finite number",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreFlag {
    pub subsystem: Subsystem,
    pub reason: Degeneracy,
}

/// `*_score` and `network_bandwidth` are higher-is-better; `cpu_temp` and
/// `network_latency` are lower-is-better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResults {
    pub cpu_score: f64,
    pub cpu_temp: f64,
    pub cpu_temp_source: ReadingSource,
    /// MB/s
    pub ram_score: f64,
    /// Percent of physical memory in use when the RAM test ran.
    pub ram_usage: f64,
    /// MB/s
    pub disk_read: f64,
    /// MB/s
    pub disk_write: f64,
    /// Milliseconds
    pub network_latency: f64,
    /// Mbit/s
    pub network_bandwidth: f64,
    pub gpu_score: f64,
    pub flags: Vec<ScoreFlag>,
    pub skipped: Vec<Subsystem>,
}

impl TestResults {
    pub fn is_low_confidence(&self, subsystem: Subsystem) -> bool {
        self.flags.iter().any(|f| f.subsystem == subsystem)
    }

    pub fn was_measured(&self, subsystem: Subsystem) -> bool {
        !self.skipped.contains(&subsystem)
    }
}

#[cfg(test)]
pub(crate) fn sample_results() -> TestResults {
    TestResults {
        cpu_score: 6000.0,
        cpu_temp: 55.0,
        cpu_temp_source: ReadingSource::Measured,
        ram_score: 9000.0,
        ram_usage: 41.5,
        disk_read: 1800.0,
        disk_write: 950.0,
        network_latency: 0.0,
        network_bandwidth: 0.0,
        gpu_score: 600.0,
        flags: Vec::new(),
        skipped: vec![Subsystem::Network],
    }
}
