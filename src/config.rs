use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub benchmarks: BenchmarksConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchmarksConfig {
    #[serde(default = "default_cpu_iterations")]
    pub cpu_iterations: u64,
    #[serde(default = "default_gpu_iterations")]
    pub gpu_iterations: u64,
    #[serde(default = "default_fallback_base_frequency_mhz")]
    pub fallback_base_frequency_mhz: f64,
    #[serde(default)]
    pub memory: MemoryBenchConfig,
    #[serde(default)]
    pub disk: DiskBenchConfig,
    #[serde(default)]
    pub network: NetworkBenchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryBenchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_memory_buffer_mb")]
    pub buffer_mb: u64,
    #[serde(default = "default_memory_passes")]
    pub passes: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiskBenchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_disk_file_size_mb")]
    pub file_size_mb: u64,
    /// Scratch directory for the test file; the system temp dir when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkBenchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_network_url")]
    pub url: String,
    #[serde(default = "default_network_download_bytes")]
    pub download_bytes: u64,
    #[serde(default = "default_network_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_html_path")]
    pub html_path: PathBuf,
    #[serde(default)]
    pub json_path: Option<PathBuf>,
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
    #[serde(default = "default_cpu_excellent_threshold")]
    pub cpu_excellent_threshold: f64,
    #[serde(default = "default_gpu_excellent_threshold")]
    pub gpu_excellent_threshold: f64,
    #[serde(default = "default_cpu_gauge_divisor")]
    pub cpu_gauge_divisor: f64,
    #[serde(default = "default_gpu_gauge_divisor")]
    pub gpu_gauge_divisor: f64,
    #[serde(default = "default_safe_cpu_temp_celsius")]
    pub safe_cpu_temp_celsius: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for BenchmarksConfig {
    fn default() -> Self {
        Self {
            cpu_iterations: default_cpu_iterations(),
            gpu_iterations: default_gpu_iterations(),
            fallback_base_frequency_mhz: default_fallback_base_frequency_mhz(),
            memory: MemoryBenchConfig::default(),
            disk: DiskBenchConfig::default(),
            network: NetworkBenchConfig::default(),
        }
    }
}

impl Default for MemoryBenchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_mb: default_memory_buffer_mb(),
            passes: default_memory_passes(),
        }
    }
}

impl Default for DiskBenchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_size_mb: default_disk_file_size_mb(),
            directory: None,
        }
    }
}

impl Default for NetworkBenchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_network_url(),
            download_bytes: default_network_download_bytes(),
            timeout_ms: default_network_timeout_ms(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            html_path: default_html_path(),
            json_path: None,
            metrics_path: None,
            cpu_excellent_threshold: default_cpu_excellent_threshold(),
            gpu_excellent_threshold: default_gpu_excellent_threshold(),
            cpu_gauge_divisor: default_cpu_gauge_divisor(),
            gpu_gauge_divisor: default_gpu_gauge_divisor(),
            safe_cpu_temp_celsius: default_safe_cpu_temp_celsius(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl NetworkBenchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval_ms < 1 {
            return Err(ConfigError::Validation(
                "monitor.interval_ms must be >= 1".to_string(),
            ));
        }

        validate_benchmarks(&self.benchmarks)?;
        validate_report(&self.report)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_benchmarks(cfg: &BenchmarksConfig) -> Result<(), ConfigError> {
    if !(cfg.fallback_base_frequency_mhz.is_finite() && cfg.fallback_base_frequency_mhz > 0.0) {
        return Err(ConfigError::Validation(
            "benchmarks.fallback_base_frequency_mhz must be > 0".to_string(),
        ));
    }
    if cfg.memory.enabled && cfg.memory.buffer_mb == 0 {
        return Err(ConfigError::Validation(
            "benchmarks.memory.buffer_mb must be > 0".to_string(),
        ));
    }
    if cfg.memory.enabled && cfg.memory.passes == 0 {
        return Err(ConfigError::Validation(
            "benchmarks.memory.passes must be >= 1".to_string(),
        ));
    }
    if cfg.disk.enabled && cfg.disk.file_size_mb == 0 {
        return Err(ConfigError::Validation(
            "benchmarks.disk.file_size_mb must be > 0".to_string(),
        ));
    }
    if cfg.network.enabled {
        if cfg.network.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "benchmarks.network.url must not be empty".to_string(),
            ));
        }
        if cfg.network.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "benchmarks.network.timeout_ms must be > 0".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_report(cfg: &ReportConfig) -> Result<(), ConfigError> {
    if cfg.html_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "report.html_path must not be empty".to_string(),
        ));
    }
    for (name, divisor) in [
        ("cpu_gauge_divisor", cfg.cpu_gauge_divisor),
        ("gpu_gauge_divisor", cfg.gpu_gauge_divisor),
    ] {
        if !(divisor.is_finite() && divisor > 0.0) {
            return Err(ConfigError::Validation(format!(
                "report.{name} must be > 0"
            )));
        }
    }
    if cfg.safe_cpu_temp_celsius <= 0.0 {
        return Err(ConfigError::Validation(
            "report.safe_cpu_temp_celsius must be > 0".to_string(),
        ));
    }
    Ok(())
}

const fn default_true() -> bool {
    true
}

const fn default_interval_ms() -> u64 {
    2000
}

const fn default_cpu_iterations() -> u64 {
    100_000_000
}

const fn default_gpu_iterations() -> u64 {
    15_000_000
}

const fn default_fallback_base_frequency_mhz() -> f64 {
    2000.0
}

const fn default_memory_buffer_mb() -> u64 {
    64
}

const fn default_memory_passes() -> u32 {
    4
}

const fn default_disk_file_size_mb() -> u64 {
    64
}

fn default_network_url() -> String {
    "https://speed.cloudflare.com/__down".to_string()
}

const fn default_network_download_bytes() -> u64 {
    10_000_000
}

const fn default_network_timeout_ms() -> u64 {
    20_000
}

fn default_html_path() -> PathBuf {
    PathBuf::from("diagnostic_report.html")
}

const fn default_cpu_excellent_threshold() -> f64 {
    5000.0
}

const fn default_gpu_excellent_threshold() -> f64 {
    500.0
}

const fn default_cpu_gauge_divisor() -> f64 {
    200.0
}

const fn default_gpu_gauge_divisor() -> f64 {
    1000.0
}

const fn default_safe_cpu_temp_celsius() -> f64 {
    85.0
}
