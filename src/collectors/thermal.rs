use crate::collectors::probe::{nvidia_smi, parse_f64_loose};
use crate::model::TemperatureReading;
use crate::platform::SensorReader;
use rand::Rng;
use std::ops::Range;
use std::sync::Mutex;
use sysinfo::{ComponentExt, System, SystemExt};
use tracing::debug;

pub const CPU_SIMULATED_RANGE: Range<f64> = 40.0..85.0;
pub const GPU_SIMULATED_RANGE: Range<f64> = 50.0..95.0;

const PLAUSIBLE: std::ops::RangeInclusive<f64> = 0.0..=130.0;

const GPU_MARKERS: [&str; 5] = ["gpu", "nvidia", "amdgpu", "radeon", "edge"];

pub type Probe = fn(&mut System) -> Option<f64>;

pub struct HostSensors {
    system: Mutex<System>,
    cpu_probes: Vec<Probe>,
    gpu_probes: Vec<Probe>,
}

impl HostSensors {
    pub fn new(cpu_probes: Vec<Probe>, gpu_probes: Vec<Probe>) -> Self {
        let mut system = System::new();
        system.refresh_components_list();
        Self {
            system: Mutex::new(system),
            cpu_probes,
            gpu_probes,
        }
    }

    fn first_reading(&self, probes: &[Probe]) -> Option<f64> {
        let mut guard = self.system.lock().unwrap_or_else(|e| e.into_inner());
        let system: &mut System = &mut guard;
        probes
            .iter()
            .find_map(|probe| probe(system).filter(|c| PLAUSIBLE.contains(c)))
    }
}

impl SensorReader for HostSensors {
    fn read_cpu_temperature(&self) -> TemperatureReading {
        read_or_simulate(self.first_reading(&self.cpu_probes), CPU_SIMULATED_RANGE)
    }

    fn read_gpu_temperature(&self) -> TemperatureReading {
        read_or_simulate(self.first_reading(&self.gpu_probes), GPU_SIMULATED_RANGE)
    }
}

fn read_or_simulate(measured: Option<f64>, range: Range<f64>) -> TemperatureReading {
    match measured {
        Some(celsius) => TemperatureReading::measured(celsius),
        None => {
            debug!(?range, "no temperature sensor answered, simulating");
            simulated(range)
        }
    }
}

/// Uniform in `range`. Not hardware data.
pub fn simulated(range: Range<f64>) -> TemperatureReading {
    TemperatureReading::simulated(rand::rng().random_range(range))
}

pub fn sysinfo_cpu(system: &mut System) -> Option<f64> {
    system.refresh_components();
    let labelled: Vec<(String, f64)> = system
        .components()
        .iter()
        .map(|c| (c.label().to_lowercase(), c.temperature() as f64))
        .collect();
    pick_cpu_temperature(&labelled)
}

pub fn sysinfo_gpu(system: &mut System) -> Option<f64> {
    system.refresh_components();
    system
        .components()
        .iter()
        .filter(|c| {
            let label = c.label().to_lowercase();
            GPU_MARKERS.iter().any(|m| label.contains(m))
        })
        .map(|c| c.temperature() as f64)
        .filter(|t| *t > 0.0)
        .max_by(|a, b| a.total_cmp(b))
}

pub fn nvidia_gpu_temp(_system: &mut System) -> Option<f64> {
    let text = nvidia_smi("temperature.gpu")?;
    text.lines()
        .filter_map(parse_f64_loose)
        .filter(|t| *t > 0.0)
        .max_by(|a, b| a.total_cmp(b))
}

fn pick_cpu_temperature(labelled: &[(String, f64)]) -> Option<f64> {
    let primary_markers = ["cpu", "package", "tctl", "tdie", "coretemp", "k10temp", "core"];
    let plausible = || {
        labelled
            .iter()
            .filter(|(_, t)| *t > 0.0 && PLAUSIBLE.contains(t))
            .filter(|(label, _)| !GPU_MARKERS.iter().any(|m| label.contains(m)))
    };

    let primary = plausible()
        .filter(|(label, _)| primary_markers.iter().any(|m| label.contains(m)))
        .map(|(_, t)| *t)
        .max_by(|a, b| a.total_cmp(b));
    if primary.is_some() {
        return primary;
    }

    plausible().map(|(_, t)| *t).max_by(|a, b| a.total_cmp(b))
}

#[cfg(target_os = "linux")]
pub fn linux_thermal_zones(_system: &mut System) -> Option<f64> {
    let entries = std::fs::read_dir("/sys/class/thermal").ok()?;

    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("thermal_zone"))
        })
        .filter_map(|entry| std::fs::read_to_string(entry.path().join("temp")).ok())
        .filter_map(|raw| raw.trim().parse::<f64>().ok())
        .map(millidegrees_to_celsius)
        .filter(|c| *c > 0.0)
        .max_by(|a, b| a.total_cmp(b))
}

#[cfg(any(target_os = "linux", test))]
fn millidegrees_to_celsius(v: f64) -> f64 {
    if v > 1000.0 {
        v / 1000.0
    } else {
        v
    }
}

/// ACPI thermal zone via CIM; the counter is in tenths of Kelvin.
#[cfg(target_os = "windows")]
pub fn windows_thermal_zone(_system: &mut System) -> Option<f64> {
    let script = "Get-CimInstance -Namespace root/wmi -ClassName MSAcpi_ThermalZoneTemperature -ErrorAction SilentlyContinue | ForEach-Object { $_.CurrentTemperature }";
    let text = crate::collectors::probe::powershell(script)?;
    text.lines()
        .filter_map(parse_f64_loose)
        .filter_map(normalize_windows_thermal_zone_temp)
        .max_by(|a, b| a.total_cmp(b))
}

#[cfg(any(target_os = "windows", test))]
fn normalize_windows_thermal_zone_temp(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }

    let mut v = raw;
    if v > 1000.0 {
        v /= 10.0;
    }
    if v > 200.0 {
        v -= 273.15;
    }

    PLAUSIBLE.contains(&v).then_some(v)
}
