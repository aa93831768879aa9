use crate::bench::cpu::CpuWorkload;
use crate::bench::disk::DiskWorkload;
use crate::bench::gpu::GpuWorkload;
use crate::bench::memory::MemoryWorkload;
use crate::bench::network::{NetworkOutcome, NetworkWorkload};
use crate::bench::BenchmarkError;
use crate::config::Config;
use crate::model::{Degeneracy, ReadingSource, ScoreFlag, Subsystem, SystemInfo, TestResults};
use crate::monitor::{MonitorError, StopSignal, TemperatureMonitor};
use crate::output::OutputSink;
use crate::platform::{Platform, SensorReader};
use crate::report::label;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to start the monitor runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error("{subsystem} benchmark failed: {source}")]
    Benchmark {
        subsystem: Subsystem,
        source: BenchmarkError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRun {
    pub results: TestResults,
    pub samples: usize,
}

pub struct Diagnostics {
    platform: Arc<dyn Platform>,
    sensors: Arc<dyn SensorReader>,
    sink: Arc<dyn OutputSink>,
    config: Config,
    info: SystemInfo,
    runtime: Runtime,
}

impl Diagnostics {
    pub fn new(
        platform: Arc<dyn Platform>,
        sink: Arc<dyn OutputSink>,
        config: Config,
    ) -> Result<Self, OrchestratorError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("temp-monitor")
            .enable_all()
            .build()
            .map_err(OrchestratorError::Runtime)?;

        let info = platform.collect_system_info();
        info!(
            platform = platform.name(),
            os = %info.os_name,
            cpu = %info.cpu_name,
            cores = info.cpu_cores,
            threads = info.cpu_threads,
            "system info collected"
        );
        if info.cpu_threads < info.cpu_cores {
            warn!(
                cores = info.cpu_cores,
                threads = info.cpu_threads,
                "platform reports fewer threads than cores"
            );
        }

        Ok(Self {
            sensors: platform.sensors(),
            platform,
            sink,
            config,
            info,
            runtime,
        })
    }

    pub fn system_info(&self) -> &SystemInfo {
        &self.info
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A failing or panicking step still stops and joins the monitor before
    /// the error leaves this function.
    pub fn run_full_diagnostics(&self) -> Result<DiagnosticRun, OrchestratorError> {
        let stop = StopSignal::new();
        let monitor = TemperatureMonitor::new(
            self.sensors.clone(),
            self.sink.clone(),
            self.config.monitor.interval(),
        );
        debug!(state = %monitor.state(), "starting monitor");
        let handle = monitor.start(self.runtime.handle(), &stop);

        let measured = self.run_benchmarks();

        stop.stop();
        debug!(state = %handle.state(), "stop requested, joining monitor");
        let summary = handle.join()?;
        debug!(samples = summary.samples, state = %summary.final_state, "monitor joined");

        let results = measured?;
        info!(
            cpu_score = results.cpu_score,
            gpu_score = results.gpu_score,
            flagged = results.flags.len(),
            skipped = results.skipped.len(),
            "diagnostics finished"
        );
        Ok(DiagnosticRun {
            results,
            samples: summary.samples,
        })
    }

    fn run_benchmarks(&self) -> Result<TestResults, OrchestratorError> {
        let bench = &self.config.benchmarks;
        let report = &self.config.report;
        let mut flags = Vec::new();
        let mut skipped = Vec::new();

        let cores = effective_cores(&self.info);
        let base_mhz = match self.platform.base_frequency_mhz(&self.info) {
            Some(mhz) if mhz.is_finite() && mhz > 0.0 => mhz,
            _ => {
                debug!(
                    fallback_mhz = bench.fallback_base_frequency_mhz,
                    "base frequency unavailable, using fallback"
                );
                bench.fallback_base_frequency_mhz
            }
        };
        self.sink.print(&format!(
            "[CPU] Running benchmark ({} iterations, {cores} cores at {base_mhz:.0} MHz)...",
            bench.cpu_iterations
        ));
        let cpu = self
            .platform
            .run_cpu_benchmark(&CpuWorkload::new(bench.cpu_iterations), base_mhz, cores);
        let cpu_temp = self.sensors.read_cpu_temperature();
        note_degenerate(&mut flags, Subsystem::Cpu, cpu.degenerate);
        self.sink.print(&format!(
            "[CPU] Score: {:.2} ({})",
            cpu.score,
            label(cpu.score, report.cpu_excellent_threshold)
        ));
        self.sink.print(&format!("[CPU] Temperature: {cpu_temp}"));

        self.sink.print(&format!(
            "[GPU] Running simulated benchmark ({} iterations)...",
            bench.gpu_iterations
        ));
        let gpu = self
            .platform
            .run_gpu_benchmark(&GpuWorkload::new(bench.gpu_iterations));
        note_degenerate(&mut flags, Subsystem::Gpu, gpu.degenerate);
        self.sink.print(&format!(
            "[GPU] Score: {:.2} ({})",
            gpu.score,
            label(gpu.score, report.gpu_excellent_threshold)
        ));

        let (ram_score, ram_usage) = if bench.memory.enabled {
            self.sink.print(&format!(
                "[RAM] Running throughput test ({} MB x {} passes)...",
                bench.memory.buffer_mb, bench.memory.passes
            ));
            let outcome =
                MemoryWorkload::from_megabytes(bench.memory.buffer_mb, bench.memory.passes).run();
            note_degenerate(&mut flags, Subsystem::Memory, outcome.degenerate);
            let usage = self.platform.memory_usage_percent().unwrap_or(0.0);
            self.sink.print(&format!(
                "[RAM] Throughput: {:.1} MB/s, in use: {usage:.1}%",
                outcome.score
            ));
            (outcome.score, usage)
        } else {
            skipped.push(Subsystem::Memory);
            (0.0, 0.0)
        };

        let (disk_read, disk_write) = if bench.disk.enabled {
            self.sink.print(&format!(
                "[DISK] Running read/write test ({} MB)...",
                bench.disk.file_size_mb
            ));
            let outcome =
                DiskWorkload::from_megabytes(bench.disk.file_size_mb, bench.disk.directory.clone())
                    .run()
                    .map_err(|source| {
                        self.sink.error(&format!("disk benchmark failed: {source}"));
                        OrchestratorError::Benchmark {
                            subsystem: Subsystem::Disk,
                            source,
                        }
                    })?;
            for reason in outcome.degeneracies() {
                note_degenerate(&mut flags, Subsystem::Disk, Some(reason));
            }
            self.sink.print(&format!(
                "[DISK] Write: {:.1} MB/s, read: {:.1} MB/s",
                outcome.write_mb_s, outcome.read_mb_s
            ));
            (outcome.read_mb_s, outcome.write_mb_s)
        } else {
            skipped.push(Subsystem::Disk);
            (0.0, 0.0)
        };

        let (network_latency, network_bandwidth) = match self.run_network() {
            Some(outcome) => {
                note_degenerate(&mut flags, Subsystem::Network, outcome.degenerate);
                (outcome.latency_ms, outcome.bandwidth_mbps)
            }
            None => {
                skipped.push(Subsystem::Network);
                (0.0, 0.0)
            }
        };

        Ok(TestResults {
            cpu_score: cpu.score,
            cpu_temp: cpu_temp.celsius,
            cpu_temp_source: cpu_temp.source,
            ram_score,
            ram_usage,
            disk_read,
            disk_write,
            network_latency,
            network_bandwidth,
            gpu_score: gpu.score,
            flags,
            skipped,
        })
    }

    fn run_network(&self) -> Option<NetworkOutcome> {
        let cfg = &self.config.benchmarks.network;
        if !cfg.enabled {
            return None;
        }
        self.sink
            .print(&format!("[NET] Measuring latency and bandwidth against {}...", cfg.url));
        let workload = NetworkWorkload {
            url: cfg.url.clone(),
            download_bytes: cfg.download_bytes,
            timeout: cfg.timeout(),
        };
        let client = Client::builder()
            .user_agent(concat!("hwdiag/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        match self.runtime.block_on(workload.run(&client)) {
            Ok(outcome) => {
                self.sink.print(&format!(
                    "[NET] Latency: {:.1} ms, bandwidth: {:.1} Mbit/s",
                    outcome.latency_ms, outcome.bandwidth_mbps
                ));
                Some(outcome)
            }
            Err(err) => {
                warn!(error = %err, "network benchmark failed");
                self.sink.error(&format!("network benchmark failed: {err}"));
                None
            }
        }
    }
}

/// Physical cores when known, else logical threads, never zero.
pub fn effective_cores(info: &SystemInfo) -> usize {
    if info.cpu_cores > 0 {
        info.cpu_cores
    } else {
        info.cpu_threads.max(1)
    }
}

fn note_degenerate(flags: &mut Vec<ScoreFlag>, subsystem: Subsystem, reason: Option<Degeneracy>) {
    if let Some(reason) = reason {
        warn!(%subsystem, %reason, "score replaced by sentinel");
        flags.push(ScoreFlag { subsystem, reason });
    }
}

impl DiagnosticRun {
    pub fn temperature_was_simulated(&self) -> bool {
        self.results.cpu_temp_source == ReadingSource::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::RecordingSink;
    use crate::model::TemperatureReading;
    use crate::platform::testing::{FakePlatform, FixedSensors};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::time::Duration;

    fn quick_config() -> Config {
        let mut cfg = Config::default();
        cfg.monitor.interval_ms = 10;
        cfg.benchmarks.cpu_iterations = 10_000;
        cfg.benchmarks.gpu_iterations = 10_000;
        cfg.benchmarks.memory.enabled = false;
        cfg.benchmarks.disk.enabled = false;
        cfg.benchmarks.network.enabled = false;
        cfg
    }

    fn diagnostics(platform: FakePlatform, cfg: Config) -> (Diagnostics, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let diag = Diagnostics::new(Arc::new(platform), sink.clone(), cfg).expect("diagnostics");
        (diag, sink)
    }

    #[test]
    fn sample_count_is_bounded_by_elapsed_time() {
        let mut platform = FakePlatform::new();
        platform.bench_delay = Duration::from_millis(30);
        let (diag, sink) = diagnostics(platform, quick_config());

        let run = diag.run_full_diagnostics().expect("run");
        let samples = sink.count_prefixed("[TEMP]");
        assert_eq!(samples, run.samples);
        assert!((2..=8).contains(&samples), "got {samples} samples");
    }

    #[test]
    fn monitor_brackets_every_benchmark_line() {
        let (diag, sink) = diagnostics(FakePlatform::new(), quick_config());
        diag.run_full_diagnostics().expect("run");

        let lines = sink.lines();
        let start = lines
            .iter()
            .position(|l| l.starts_with("[MONITOR] Starting"))
            .expect("start line");
        let stop = lines
            .iter()
            .position(|l| l.starts_with("[MONITOR] Temperature monitoring stopped"))
            .expect("stop line");
        let cpu = lines.iter().position(|l| l.starts_with("[CPU] Running")).expect("cpu");
        let gpu = lines.iter().position(|l| l.starts_with("[GPU] Score")).expect("gpu");
        assert!(start < cpu && gpu < stop);
        assert_eq!(stop, lines.len() - 1);
    }

    #[test]
    fn recorded_temperature_comes_from_the_synchronous_read() {
        let (diag, _sink) = diagnostics(FakePlatform::new(), quick_config());
        let run = diag.run_full_diagnostics().expect("run");
        assert_eq!(run.results.cpu_temp, 50.0);
        assert_eq!(run.results.cpu_temp_source, ReadingSource::Measured);
        assert!(!run.temperature_was_simulated());

        let mut platform = FakePlatform::new();
        platform.sensors = Arc::new(FixedSensors::simulated(70.0, 80.0));
        let (diag, sink) = diagnostics(platform, quick_config());
        let run = diag.run_full_diagnostics().expect("run");
        assert!(run.temperature_was_simulated());
        assert!(sink
            .lines()
            .contains(&"[CPU] Temperature: 70.0°C (simulated)".to_string()));
    }

    #[test]
    fn tolerates_fewer_threads_than_cores() {
        let mut platform = FakePlatform::new();
        platform.info.cpu_cores = 8;
        platform.info.cpu_threads = 2;
        let (diag, _sink) = diagnostics(platform, quick_config());
        let run = diag.run_full_diagnostics().expect("run");
        assert!(run.results.cpu_score >= 0.0);
        assert_eq!(diag.system_info().cpu_threads, 2);
    }

    #[test]
    fn core_count_falls_back_to_threads() {
        let mut info = SystemInfo {
            cpu_cores: 0,
            cpu_threads: 6,
            ..SystemInfo::default()
        };
        assert_eq!(effective_cores(&info), 6);
        info.cpu_threads = 0;
        assert_eq!(effective_cores(&info), 1);
        info.cpu_cores = 8;
        info.cpu_threads = 2;
        assert_eq!(effective_cores(&info), 8);
    }

    #[test]
    fn missing_base_frequency_uses_configured_fallback() {
        let mut platform = FakePlatform::new();
        platform.base_mhz = None;
        let mut cfg = quick_config();
        cfg.benchmarks.fallback_base_frequency_mhz = 2400.0;
        let (diag, sink) = diagnostics(platform, cfg);
        diag.run_full_diagnostics().expect("run");
        assert!(sink
            .lines()
            .iter()
            .any(|l| l.starts_with("[CPU] Running") && l.contains("at 2400 MHz")));
    }

    #[test]
    fn zero_iterations_are_flagged_not_fatal() {
        let mut cfg = quick_config();
        cfg.benchmarks.cpu_iterations = 0;
        let (diag, _sink) = diagnostics(FakePlatform::new(), cfg);
        let run = diag.run_full_diagnostics().expect("run");
        assert_eq!(run.results.cpu_score, 0.0);
        assert!(run.results.flags.contains(&ScoreFlag {
            subsystem: Subsystem::Cpu,
            reason: Degeneracy::NoIterations,
        }));
    }

    #[test]
    fn disabled_steps_are_listed_as_skipped() {
        let (diag, _sink) = diagnostics(FakePlatform::new(), quick_config());
        let run = diag.run_full_diagnostics().expect("run");
        assert_eq!(
            run.results.skipped,
            vec![Subsystem::Memory, Subsystem::Disk, Subsystem::Network]
        );
    }

    #[test]
    fn memory_and_disk_steps_fill_their_fields() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut cfg = quick_config();
        cfg.benchmarks.memory.enabled = true;
        cfg.benchmarks.memory.buffer_mb = 2;
        cfg.benchmarks.memory.passes = 1;
        cfg.benchmarks.disk.enabled = true;
        cfg.benchmarks.disk.file_size_mb = 1;
        cfg.benchmarks.disk.directory = Some(dir.path().to_path_buf());
        let (diag, _sink) = diagnostics(FakePlatform::new(), cfg);

        let run = diag.run_full_diagnostics().expect("run");
        assert_eq!(run.results.ram_usage, 37.5);
        assert_eq!(run.results.skipped, vec![Subsystem::Network]);
        assert!(run.results.disk_write >= 0.0);
    }

    #[test]
    fn disk_failure_surfaces_after_the_monitor_is_joined() {
        let mut cfg = quick_config();
        cfg.benchmarks.disk.enabled = true;
        cfg.benchmarks.disk.file_size_mb = 1;
        cfg.benchmarks.disk.directory = Some("/no/such/dir/hwdiag".into());
        let (diag, sink) = diagnostics(FakePlatform::new(), cfg);

        let err = diag.run_full_diagnostics().expect_err("disk must fail");
        assert!(matches!(
            err,
            OrchestratorError::Benchmark {
                subsystem: Subsystem::Disk,
                ..
            }
        ));
        assert_eq!(
            sink.lines().last().map(String::as_str),
            Some("[MONITOR] Temperature monitoring stopped")
        );
    }

    #[test]
    fn unreachable_network_is_recorded_as_not_measured() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let mut cfg = quick_config();
        cfg.benchmarks.network.enabled = true;
        cfg.benchmarks.network.url = format!("http://{addr}/down");
        cfg.benchmarks.network.timeout_ms = 500;
        let (diag, sink) = diagnostics(FakePlatform::new(), cfg);

        let run = diag.run_full_diagnostics().expect("run");
        assert!(!run.results.was_measured(Subsystem::Network));
        assert!(sink
            .lines()
            .iter()
            .any(|l| l.starts_with("ERROR: network benchmark failed")));
    }

    #[test]
    fn empty_download_flags_network_bandwidth() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = std::thread::spawn(move || {
            for stream in listener.incoming().take(2) {
                let Ok(mut stream) = stream else { return };
                let mut request = Vec::new();
                let mut buf = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });

        let mut cfg = quick_config();
        cfg.benchmarks.network.enabled = true;
        cfg.benchmarks.network.url = format!("http://{addr}/down");
        cfg.benchmarks.network.download_bytes = 0;
        cfg.benchmarks.network.timeout_ms = 5000;
        let (diag, _sink) = diagnostics(FakePlatform::new(), cfg);

        let run = diag.run_full_diagnostics().expect("run");
        assert!(run.results.was_measured(Subsystem::Network));
        assert_eq!(run.results.network_bandwidth, 0.0);
        assert!(run.results.flags.contains(&ScoreFlag {
            subsystem: Subsystem::Network,
            reason: Degeneracy::NoIterations,
        }));
        server.join().expect("server thread");
    }

    #[test]
    fn panicking_benchmark_still_joins_the_monitor() {
        let mut platform = FakePlatform::new();
        platform.panic_in_gpu = true;
        let (diag, sink) = diagnostics(platform, quick_config());

        let outcome = catch_unwind(AssertUnwindSafe(|| diag.run_full_diagnostics()));
        assert!(outcome.is_err());
        assert_eq!(
            sink.lines().last().map(String::as_str),
            Some("[MONITOR] Temperature monitoring stopped")
        );
    }

    #[test]
    fn panicking_sensor_fails_the_run() {
        struct BrokenGpuSensor;
        impl SensorReader for BrokenGpuSensor {
            fn read_cpu_temperature(&self) -> TemperatureReading {
                TemperatureReading::measured(45.0)
            }
            fn read_gpu_temperature(&self) -> TemperatureReading {
                panic!("gpu sensor exploded");
            }
        }

        let mut platform = FakePlatform::new();
        platform.sensors = Arc::new(BrokenGpuSensor);
        platform.bench_delay = Duration::from_millis(20);
        let (diag, sink) = diagnostics(platform, quick_config());

        let outcome = diag.run_full_diagnostics();
        assert!(matches!(
            outcome,
            Err(OrchestratorError::Monitor(MonitorError::Panicked))
        ));
        assert!(sink.lines().iter().any(|line| line.starts_with("[CPU] Score:")));
    }

    #[test]
    fn repeated_runs_use_fresh_stop_signals() {
        let (diag, sink) = diagnostics(FakePlatform::new(), quick_config());
        diag.run_full_diagnostics().expect("first run");
        diag.run_full_diagnostics().expect("second run");
        assert_eq!(sink.count_prefixed("[MONITOR] Starting"), 2);
        assert_eq!(sink.count_prefixed("[MONITOR] Temperature monitoring stopped"), 2);
    }
}
