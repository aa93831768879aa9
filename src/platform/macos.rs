use super::{Platform, SensorReader};
use crate::collectors::probe::{command_stdout, parse_f64_loose};
use crate::collectors::system::{collect_common, sysinfo_frequency_mhz};
use crate::collectors::thermal::{self, HostSensors, Probe};
use crate::model::SystemInfo;
use std::sync::Arc;
use sysinfo::{System, SystemExt};

pub struct MacPlatform {
    sensors: Arc<HostSensors>,
}

impl MacPlatform {
    pub fn new() -> Self {
        let cpu: Vec<Probe> = vec![thermal::sysinfo_cpu];
        let gpu: Vec<Probe> = vec![thermal::sysinfo_gpu];
        Self {
            sensors: Arc::new(HostSensors::new(cpu, gpu)),
        }
    }
}

fn sysctl(name: &str) -> Option<String> {
    command_stdout("sysctl", &["-n", name])
}

impl Platform for MacPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn collect_system_info(&self) -> SystemInfo {
        let mut system = System::new();
        let mut info = collect_common(&mut system);
        if info.os_name.is_empty() {
            if let Some(release) = sysctl("kern.osrelease") {
                info.os_name = format!("macOS {release}");
            }
        }
        // Unified memory: the GPU has no dedicated VRAM figure.
        info.gpu_name = match sysctl("hw.model") {
            Some(model) => format!("Apple GPU ({model})"),
            None => "Apple GPU".to_string(),
        };
        info.gpu_memory = 0;
        info
    }

    fn base_frequency_mhz(&self, _info: &SystemInfo) -> Option<f64> {
        sysctl("hw.cpufrequency")
            .as_deref()
            .and_then(parse_f64_loose)
            .filter(|hz| *hz > 0.0)
            .map(|hz| hz / 1_000_000.0)
            .or_else(|| sysinfo_frequency_mhz(&mut System::new()))
    }

    fn sensors(&self) -> Arc<dyn SensorReader> {
        self.sensors.clone()
    }
}
