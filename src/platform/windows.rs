use super::{Platform, SensorReader};
use crate::collectors::probe::{parse_f64_loose, parse_u64_loose, powershell};
use crate::collectors::system::{collect_common, nvidia_gpu, sysinfo_frequency_mhz};
use crate::collectors::thermal::{self, HostSensors, Probe};
use crate::model::SystemInfo;
use std::sync::Arc;
use sysinfo::{System, SystemExt};

pub struct WindowsPlatform {
    sensors: Arc<HostSensors>,
}

impl WindowsPlatform {
    pub fn new() -> Self {
        let cpu: Vec<Probe> = vec![thermal::sysinfo_cpu, thermal::windows_thermal_zone];
        let gpu: Vec<Probe> = vec![thermal::nvidia_gpu_temp, thermal::sysinfo_gpu];
        Self {
            sensors: Arc::new(HostSensors::new(cpu, gpu)),
        }
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn collect_system_info(&self) -> SystemInfo {
        let mut system = System::new();
        let mut info = collect_common(&mut system);

        if info.os_name.is_empty() {
            if let Some(caption) =
                powershell("(Get-CimInstance Win32_OperatingSystem).Caption")
            {
                info.os_name = caption;
            }
        }

        if let Some((name, memory_mb)) = nvidia_gpu() {
            info.gpu_name = name;
            info.gpu_memory = memory_mb;
        } else if let Some((name, memory_mb)) = powershell(
            "Get-CimInstance Win32_VideoController | Select-Object -First 1 | ForEach-Object { \"$($_.Name)|$($_.AdapterRAM)\" }",
        )
        .as_deref()
        .and_then(parse_video_controller)
        {
            info.gpu_name = name;
            info.gpu_memory = memory_mb;
        }
        info
    }

    fn base_frequency_mhz(&self, _info: &SystemInfo) -> Option<f64> {
        powershell("(Get-CimInstance Win32_Processor | Select-Object -First 1).MaxClockSpeed")
            .as_deref()
            .and_then(parse_f64_loose)
            .filter(|mhz| *mhz > 0.0)
            .or_else(|| sysinfo_frequency_mhz(&mut System::new()))
    }

    fn sensors(&self) -> Arc<dyn SensorReader> {
        self.sensors.clone()
    }
}

/// `Name|AdapterRAM` with AdapterRAM in bytes.
fn parse_video_controller(line: &str) -> Option<(String, u64)> {
    let (name, ram) = line.split_once('|').unwrap_or((line, ""));
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let memory_mb = parse_u64_loose(ram).map(|b| b / (1024 * 1024)).unwrap_or(0);
    Some((name.to_string(), memory_mb))
}
