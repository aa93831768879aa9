use super::{key_value, Platform, SensorReader};
use crate::collectors::probe::command_stdout;
use crate::collectors::system::{collect_common, nvidia_gpu, sysinfo_frequency_mhz};
use crate::collectors::thermal::{self, HostSensors, Probe};
use crate::model::SystemInfo;
use std::fs;
use std::sync::Arc;
use sysinfo::{System, SystemExt};
use tracing::debug;

pub struct LinuxPlatform {
    sensors: Arc<HostSensors>,
}

impl LinuxPlatform {
    pub fn new() -> Self {
        let cpu: Vec<Probe> = vec![thermal::sysinfo_cpu, thermal::linux_thermal_zones];
        let gpu: Vec<Probe> = vec![thermal::nvidia_gpu_temp, thermal::sysinfo_gpu];
        Self {
            sensors: Arc::new(HostSensors::new(cpu, gpu)),
        }
    }
}

impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn collect_system_info(&self) -> SystemInfo {
        let mut system = System::new();
        let mut info = collect_common(&mut system);

        if info.os_name.is_empty() {
            if let Ok(text) = fs::read_to_string("/etc/os-release") {
                info.os_name = key_value(&text, "PRETTY_NAME").unwrap_or_default().to_string();
            }
        }

        match nvidia_gpu() {
            Some((name, memory_mb)) => {
                info.gpu_name = name;
                info.gpu_memory = memory_mb;
            }
            None => {
                if let Some(name) = command_stdout("lspci", &[]).and_then(|t| lspci_gpu_name(&t)) {
                    info.gpu_name = name;
                }
            }
        }
        debug!(gpu = %info.gpu_name, "linux system info collected");
        info
    }

    fn base_frequency_mhz(&self, info: &SystemInfo) -> Option<f64> {
        let count = info.cpu_threads.max(1);
        let max_khz = (0..count)
            .filter_map(|i| {
                fs::read_to_string(format!(
                    "/sys/devices/system/cpu/cpu{i}/cpufreq/cpuinfo_max_freq"
                ))
                .ok()
            })
            .filter_map(|raw| raw.trim().parse::<f64>().ok())
            .filter(|khz| *khz > 0.0)
            .max_by(|a, b| a.total_cmp(b));
        match max_khz {
            Some(khz) => Some(khz / 1000.0),
            None => sysinfo_frequency_mhz(&mut System::new()),
        }
    }

    fn sensors(&self) -> Arc<dyn SensorReader> {
        self.sensors.clone()
    }
}

/// Device description from the first display controller line of `lspci`.
fn lspci_gpu_name(text: &str) -> Option<String> {
    const CLASSES: [&str; 2] = ["VGA compatible controller", "3D controller"];
    text.lines().find_map(|line| {
        CLASSES.iter().find_map(|class| {
            let (_, rest) = line.split_once(class)?;
            let name = rest.trim_start_matches(':').trim();
            (!name.is_empty()).then(|| name.to_string())
        })
    })
}
