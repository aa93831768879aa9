mod bench;
mod collectors;
mod config;
mod metrics;
mod model;
mod monitor;
mod orchestrator;
mod output;
mod platform;
mod report;

use clap::Parser;
use config::Config;
use metrics::RunMetrics;
use orchestrator::{DiagnosticRun, Diagnostics};
use output::{Console, OutputSink};
use report::ReportError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hwdiag")]
#[command(version, about = "Runs hardware benchmarks under a temperature monitor and writes a report")]
struct Cli {
    /// YAML configuration; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// Monitor sampling interval, e.g. `2s` or `500ms`.
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,
    /// HTML report destination.
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long)]
    json: Option<PathBuf>,
    /// Prometheus text file destination.
    #[arg(long)]
    metrics: Option<PathBuf>,
    #[arg(long)]
    skip_memory: bool,
    #[arg(long)]
    skip_disk: bool,
    /// Also run the network latency/bandwidth test.
    #[arg(long)]
    network: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut Config) {
        if let Some(interval) = self.interval {
            cfg.monitor.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(path) = &self.output {
            cfg.report.html_path = path.clone();
        }
        if let Some(path) = &self.json {
            cfg.report.json_path = Some(path.clone());
        }
        if let Some(path) = &self.metrics {
            cfg.report.metrics_path = Some(path.clone());
        }
        if self.skip_memory {
            cfg.benchmarks.memory.enabled = false;
        }
        if self.skip_disk {
            cfg.benchmarks.disk.enabled = false;
        }
        if self.network {
            cfg.benchmarks.network.enabled = true;
        }
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    cli.apply(&mut cfg);
    if let Err(err) = cfg.validate() {
        error!(error = %err, "invalid configuration after command-line overrides");
        std::process::exit(1);
    }

    let console = Arc::new(Console::new());
    let platform = platform::native();
    info!(platform = platform.name(), "starting diagnostics");
    let diagnostics = match Diagnostics::new(platform, console.clone(), cfg) {
        Ok(diagnostics) => diagnostics,
        Err(err) => {
            error!(error = %err, "failed to set up diagnostics");
            std::process::exit(1);
        }
    };
    print_system_info(&console, &diagnostics);

    let run = match diagnostics.run_full_diagnostics() {
        Ok(run) => run,
        Err(err) => {
            error!(error = %err, "diagnostic run failed");
            console.error(&err.to_string());
            std::process::exit(1);
        }
    };
    if run.temperature_was_simulated() {
        info!("no CPU temperature sensor was readable; the recorded temperature is simulated");
    }

    if let Err(err) = write_outputs(&console, &diagnostics, &run, SystemTime::now()) {
        error!(error = %err, "report step failed; results above are still valid");
        console.error(&err.to_string());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_system_info(console: &Console, diagnostics: &Diagnostics) {
    let info = diagnostics.system_info();
    console.print("=== System Information ===");
    console.print(&format!("[SYSTEM] OS: {}", info.os_name));
    console.print(&format!(
        "[SYSTEM] CPU: {} ({} cores, {} threads)",
        info.cpu_name, info.cpu_cores, info.cpu_threads
    ));
    console.print(&format!("[SYSTEM] Memory: {:.1} GB", info.memory_gib()));
    console.print(&format!(
        "[SYSTEM] GPU: {} ({} MB)",
        info.gpu_name, info.gpu_memory
    ));
    if !info.disk_names.is_empty() {
        console.print(&format!("[SYSTEM] Disks: {}", info.disk_names.join(", ")));
    }
}

fn write_outputs(
    console: &Console,
    diagnostics: &Diagnostics,
    run: &DiagnosticRun,
    finished_at: SystemTime,
) -> Result<(), ReportError> {
    let cfg = &diagnostics.config().report;
    let info = diagnostics.system_info();

    let html = report::render(info, &run.results, cfg, finished_at);
    report::write_to(&cfg.html_path, html.as_bytes())?;
    console.print(&format!("[REPORT] HTML report written to {}", cfg.html_path.display()));

    if let Some(path) = &cfg.json_path {
        let json = report::to_json(info, &run.results, finished_at)?;
        report::write_to(path, json.as_bytes())?;
        console.print(&format!("[REPORT] JSON results written to {}", path.display()));
    }

    if let Some(path) = &cfg.metrics_path {
        let metrics = RunMetrics::new()?;
        metrics.update_from_run(info, run, finished_at);
        report::write_to(path, &metrics.encode_metrics()?)?;
        console.print(&format!("[REPORT] Metrics written to {}", path.display()));
    }
    Ok(())
}
