use crate::collectors::probe::{nvidia_smi, parse_u64_loose};
use crate::model::SystemInfo;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};

pub fn collect_common(system: &mut System) -> SystemInfo {
    system.refresh_cpu();
    system.refresh_memory();
    system.refresh_disks_list();

    let os_name = system
        .long_os_version()
        .or_else(|| {
            let name = system.name()?;
            Some(match system.os_version() {
                Some(version) => format!("{name} {version}"),
                None => name,
            })
        })
        .unwrap_or_default();
    let cpu_name = system
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .unwrap_or_default();
    let cpu_threads = system.cpus().len();
    let cpu_cores = system.physical_core_count().unwrap_or(0);

    SystemInfo {
        os_name,
        cpu_name,
        cpu_cores,
        cpu_threads,
        memory_size: system.total_memory(),
        gpu_name: String::new(),
        gpu_memory: 0,
        disk_names: disk_names(system),
    }
}

fn disk_names(system: &System) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for disk in system.disks() {
        let name = disk.name().to_string_lossy().trim().to_string();
        let label = if name.is_empty() {
            disk.mount_point().display().to_string()
        } else {
            name
        };
        if !label.is_empty() && !names.contains(&label) {
            names.push(label);
        }
    }
    names
}

/// Highest frequency any CPU reports, in MHz.
pub fn sysinfo_frequency_mhz(system: &mut System) -> Option<f64> {
    system.refresh_cpu();
    system
        .cpus()
        .iter()
        .map(|c| c.frequency())
        .max()
        .filter(|f| *f > 0)
        .map(|f| f as f64)
}

pub fn memory_usage_percent(system: &mut System) -> Option<f64> {
    system.refresh_memory();
    let total = system.total_memory();
    if total == 0 {
        return None;
    }
    Some((system.used_memory() as f64 / total as f64) * 100.0)
}

/// First NVIDIA adapter as (name, MB of VRAM).
pub fn nvidia_gpu() -> Option<(String, u64)> {
    let text = nvidia_smi("name,memory.total")?;
    parse_nvidia_gpu_line(text.lines().next()?)
}

fn parse_nvidia_gpu_line(line: &str) -> Option<(String, u64)> {
    let mut parts = line.split(',').map(str::trim);
    let name = parts.next().filter(|n| !n.is_empty())?.to_string();
    let memory_mb = parts.next().and_then(parse_u64_loose).unwrap_or(0);
    Some((name, memory_mb))
}
