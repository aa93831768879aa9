use super::{Platform, SensorReader};
use crate::collectors::system::{collect_common, sysinfo_frequency_mhz};
use crate::collectors::thermal::{self, HostSensors, Probe};
use crate::model::SystemInfo;
use std::sync::Arc;
use sysinfo::{System, SystemExt};

pub struct GenericPlatform {
    sensors: Arc<HostSensors>,
}

impl GenericPlatform {
    pub fn new() -> Self {
        let cpu: Vec<Probe> = vec![thermal::sysinfo_cpu];
        let gpu: Vec<Probe> = vec![thermal::sysinfo_gpu];
        Self {
            sensors: Arc::new(HostSensors::new(cpu, gpu)),
        }
    }
}

impl Platform for GenericPlatform {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn collect_system_info(&self) -> SystemInfo {
        collect_common(&mut System::new())
    }

    fn base_frequency_mhz(&self, _info: &SystemInfo) -> Option<f64> {
        sysinfo_frequency_mhz(&mut System::new())
    }

    fn sensors(&self) -> Arc<dyn SensorReader> {
        self.sensors.clone()
    }
}
