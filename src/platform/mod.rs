#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod generic;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use crate::bench::cpu::CpuWorkload;
use crate::bench::gpu::GpuWorkload;
use crate::bench::BenchmarkOutcome;
use crate::collectors::system;
use crate::model::{SystemInfo, TemperatureReading};
use std::sync::Arc;
use sysinfo::{System, SystemExt};

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub use generic::GenericPlatform as NativePlatform;
#[cfg(target_os = "linux")]
pub use linux::LinuxPlatform as NativePlatform;
#[cfg(target_os = "macos")]
pub use macos::MacPlatform as NativePlatform;
#[cfg(target_os = "windows")]
pub use windows::WindowsPlatform as NativePlatform;

/// Never fails: unreadable sensors yield a simulated reading.
pub trait SensorReader: Send + Sync {
    fn read_cpu_temperature(&self) -> TemperatureReading;
    fn read_gpu_temperature(&self) -> TemperatureReading;
}

pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;

    fn collect_system_info(&self) -> SystemInfo;

    /// Nominal CPU frequency in MHz, if the platform can tell.
    fn base_frequency_mhz(&self, info: &SystemInfo) -> Option<f64>;

    fn sensors(&self) -> Arc<dyn SensorReader>;

    fn memory_usage_percent(&self) -> Option<f64> {
        let mut system = System::new();
        system::memory_usage_percent(&mut system)
    }

    fn run_cpu_benchmark(
        &self,
        workload: &CpuWorkload,
        base_frequency_mhz: f64,
        cores: usize,
    ) -> BenchmarkOutcome {
        workload.run(base_frequency_mhz, cores)
    }

    fn run_gpu_benchmark(&self, workload: &GpuWorkload) -> BenchmarkOutcome {
        workload.run()
    }
}

pub fn native() -> Arc<dyn Platform> {
    Arc::new(NativePlatform::new())
}

/// Value of `KEY=value` in an os-release style file, quotes stripped.
#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
pub(crate) fn key_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key)
            .then(|| v.trim().trim_matches('"').trim())
            .filter(|v| !v.is_empty())
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_strips_quotes() {
        let text = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\nID=ubuntu\nEMPTY=\"\"\n";
        assert_eq!(key_value(text, "PRETTY_NAME"), Some("Ubuntu 24.04 LTS"));
        assert_eq!(key_value(text, "ID"), Some("ubuntu"));
        assert_eq!(key_value(text, "EMPTY"), None);
        assert_eq!(key_value(text, "VERSION"), None);
    }

    #[test]
    fn native_platform_collects_without_panicking() {
        let platform = native();
        assert!(!platform.name().is_empty());
        let info = platform.collect_system_info();
        if let Some(mhz) = platform.base_frequency_mhz(&info) {
            assert!(mhz > 0.0);
        }
        let reading = platform.sensors().read_cpu_temperature();
        assert!(reading.celsius.is_finite());
    }
}
