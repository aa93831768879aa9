use crate::model::{Subsystem, SystemInfo, TestResults};
use crate::orchestrator::DiagnosticRun;
use prometheus::core::Collector;
use prometheus::{opts, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct RunMetrics {
    registry: Registry,
    pub hwdiag_score: GaugeVec,
    pub hwdiag_score_low_confidence: GaugeVec,
    pub hwdiag_measured: GaugeVec,
    pub hwdiag_cpu_temperature_celsius: GaugeVec,
    pub hwdiag_memory_usage_percent: Gauge,
    pub hwdiag_disk_throughput_mb_per_sec: GaugeVec,
    pub hwdiag_network_latency_ms: Gauge,
    pub hwdiag_network_bandwidth_mbps: Gauge,
    pub hwdiag_cpu_cores: Gauge,
    pub hwdiag_cpu_threads: Gauge,
    pub hwdiag_memory_total_bytes: Gauge,
    pub hwdiag_monitor_samples: Gauge,
    pub hwdiag_last_run_timestamp_seconds: Gauge,
}

impl RunMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let hwdiag_score = GaugeVec::new(
            opts!("hwdiag_score", "Benchmark score per subsystem; units differ by subsystem"),
            &["subsystem"],
        )?;
        let hwdiag_score_low_confidence = GaugeVec::new(
            opts!(
                "hwdiag_score_low_confidence",
                "1 when the score was replaced by the degenerate-measurement sentinel"
            ),
            &["subsystem"],
        )?;
        let hwdiag_measured = GaugeVec::new(
            opts!("hwdiag_measured", "1 when the subsystem was benchmarked in this run"),
            &["subsystem"],
        )?;
        let hwdiag_cpu_temperature_celsius = GaugeVec::new(
            opts!(
                "hwdiag_cpu_temperature_celsius",
                "CPU temperature read right after the CPU benchmark"
            ),
            &["source"],
        )?;
        let hwdiag_memory_usage_percent = Gauge::with_opts(opts!(
            "hwdiag_memory_usage_percent",
            "Physical memory in use during the RAM test (0..100)"
        ))?;
        let hwdiag_disk_throughput_mb_per_sec = GaugeVec::new(
            opts!("hwdiag_disk_throughput_mb_per_sec", "Scratch file throughput in MB/s"),
            &["direction"],
        )?;
        let hwdiag_network_latency_ms =
            Gauge::with_opts(opts!("hwdiag_network_latency_ms", "HEAD round trip in ms"))?;
        let hwdiag_network_bandwidth_mbps = Gauge::with_opts(opts!(
            "hwdiag_network_bandwidth_mbps",
            "Download bandwidth in Mbit/s"
        ))?;
        let hwdiag_cpu_cores =
            Gauge::with_opts(opts!("hwdiag_cpu_cores", "Physical CPU cores reported"))?;
        let hwdiag_cpu_threads =
            Gauge::with_opts(opts!("hwdiag_cpu_threads", "Logical CPU threads reported"))?;
        let hwdiag_memory_total_bytes =
            Gauge::with_opts(opts!("hwdiag_memory_total_bytes", "Installed memory in bytes"))?;
        let hwdiag_monitor_samples = Gauge::with_opts(opts!(
            "hwdiag_monitor_samples",
            "Temperature samples printed by the monitor during the run"
        ))?;
        let hwdiag_last_run_timestamp_seconds = Gauge::with_opts(opts!(
            "hwdiag_last_run_timestamp_seconds",
            "Unix time the run finished"
        ))?;

        register(&registry, &hwdiag_score)?;
        register(&registry, &hwdiag_score_low_confidence)?;
        register(&registry, &hwdiag_measured)?;
        register(&registry, &hwdiag_cpu_temperature_celsius)?;
        register(&registry, &hwdiag_memory_usage_percent)?;
        register(&registry, &hwdiag_disk_throughput_mb_per_sec)?;
        register(&registry, &hwdiag_network_latency_ms)?;
        register(&registry, &hwdiag_network_bandwidth_mbps)?;
        register(&registry, &hwdiag_cpu_cores)?;
        register(&registry, &hwdiag_cpu_threads)?;
        register(&registry, &hwdiag_memory_total_bytes)?;
        register(&registry, &hwdiag_monitor_samples)?;
        register(&registry, &hwdiag_last_run_timestamp_seconds)?;

        Ok(Self {
            registry,
            hwdiag_score,
            hwdiag_score_low_confidence,
            hwdiag_measured,
            hwdiag_cpu_temperature_celsius,
            hwdiag_memory_usage_percent,
            hwdiag_disk_throughput_mb_per_sec,
            hwdiag_network_latency_ms,
            hwdiag_network_bandwidth_mbps,
            hwdiag_cpu_cores,
            hwdiag_cpu_threads,
            hwdiag_memory_total_bytes,
            hwdiag_monitor_samples,
            hwdiag_last_run_timestamp_seconds,
        })
    }

    pub fn update_from_run(&self, info: &SystemInfo, run: &DiagnosticRun, finished_at: SystemTime) {
        let results = &run.results;
        for (subsystem, score) in scores(results) {
            let name = subsystem.as_str();
            let measured = results.was_measured(subsystem);
            self.hwdiag_measured
                .with_label_values(&[name])
                .set(if measured { 1.0 } else { 0.0 });
            if !measured {
                continue;
            }
            self.hwdiag_score.with_label_values(&[name]).set(score);
            let low = if results.is_low_confidence(subsystem) { 1.0 } else { 0.0 };
            self.hwdiag_score_low_confidence
                .with_label_values(&[name])
                .set(low);
        }

        let source = match results.cpu_temp_source {
            crate::model::ReadingSource::Measured => "measured",
            crate::model::ReadingSource::Simulated => "simulated",
        };
        self.hwdiag_cpu_temperature_celsius
            .with_label_values(&[source])
            .set(results.cpu_temp);

        if results.was_measured(Subsystem::Memory) {
            self.hwdiag_memory_usage_percent.set(results.ram_usage);
        }
        if results.was_measured(Subsystem::Disk) {
            self.hwdiag_disk_throughput_mb_per_sec
                .with_label_values(&["read"])
                .set(results.disk_read);
            self.hwdiag_disk_throughput_mb_per_sec
                .with_label_values(&["write"])
                .set(results.disk_write);
        }
        if results.was_measured(Subsystem::Network) {
            self.hwdiag_network_latency_ms.set(results.network_latency);
            self.hwdiag_network_bandwidth_mbps
                .set(results.network_bandwidth);
        }

        self.hwdiag_cpu_cores.set(info.cpu_cores as f64);
        self.hwdiag_cpu_threads.set(info.cpu_threads as f64);
        self.hwdiag_memory_total_bytes.set(info.memory_size as f64);
        self.hwdiag_monitor_samples.set(run.samples as f64);
        self.hwdiag_last_run_timestamp_seconds
            .set(unix_seconds(finished_at) as f64);
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

/// Headline score of each subsystem. Disk uses write throughput, network
/// uses bandwidth.
fn scores(results: &TestResults) -> [(Subsystem, f64); 5] {
    [
        (Subsystem::Cpu, results.cpu_score),
        (Subsystem::Gpu, results.gpu_score),
        (Subsystem::Memory, results.ram_score),
        (Subsystem::Disk, results.disk_write),
        (Subsystem::Network, results.network_bandwidth),
    ]
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn unix_seconds(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
