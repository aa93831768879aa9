use crate::config::ReportConfig;
use crate::model::{Subsystem, SystemInfo, TestResults};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot create report file {path}: {source}")]
    Create {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write report file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot serialize results: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub fn label(score: f64, excellent_threshold: f64) -> &'static str {
    if score > excellent_threshold {
        "excellent"
    } else {
        "adequate"
    }
}

/// `min(100, score / divisor)`, never below 0.
pub fn gauge_percent(score: f64, divisor: f64) -> f64 {
    let raw = score / divisor;
    if raw.is_nan() || raw <= 0.0 {
        0.0
    } else {
        raw.min(100.0)
    }
}

pub fn timestamp(at: SystemTime) -> String {
    humantime::format_rfc3339_seconds(at).to_string()
}

const STYLE: &str = r#"
        body { font-family: -apple-system, "Segoe UI", Ubuntu, Arial, sans-serif; margin: 40px; color: #222; }
        .header { text-align: center; margin-bottom: 30px; }
        .section { margin-bottom: 25px; padding: 15px; border-radius: 8px; background: #f8f9fa; }
        .section-title { font-size: 1.4em; margin-bottom: 15px; color: #3a6ea5; }
        .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); gap: 20px; }
        .metric { background: white; padding: 15px; border-radius: 6px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
        .metric-title { font-weight: bold; margin-bottom: 8px; }
        .gauge { height: 20px; background: #e0e0e0; border-radius: 10px; margin-top: 8px; overflow: hidden; }
        .gauge-fill { height: 100%; background: #3a6ea5; }
        .score { font-size: 1.8em; font-weight: bold; text-align: center; margin: 10px 0; }
        .note { color: #a05a00; font-size: 0.9em; }
        .summary { background: #f2f6fd; padding: 20px; border-radius: 8px; margin-top: 20px; }"#;

pub fn render(
    info: &SystemInfo,
    results: &TestResults,
    cfg: &ReportConfig,
    generated_at: SystemTime,
) -> String {
    let mut out = String::with_capacity(8 * 1024);
    // fmt::Write into a String does not fail.
    let _ = render_into(&mut out, info, results, cfg, generated_at);
    out
}

fn render_into(
    out: &mut String,
    info: &SystemInfo,
    results: &TestResults,
    cfg: &ReportConfig,
    generated_at: SystemTime,
) -> fmt::Result {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>\n<head>\n    <meta charset=\"utf-8\">")?;
    writeln!(out, "    <title>Hardware Diagnostic Report</title>")?;
    writeln!(out, "    <style>{STYLE}\n    </style>\n</head>\n<body>")?;
    writeln!(out, "    <div class=\"header\">")?;
    writeln!(out, "        <h1>Hardware Diagnostic Report</h1>")?;
    writeln!(out, "        <p>Generated on {}</p>", timestamp(generated_at))?;
    writeln!(out, "    </div>")?;

    render_system(out, info)?;

    writeln!(out, "    <div class=\"section\">")?;
    writeln!(out, "        <h2 class=\"section-title\">Performance Metrics</h2>")?;
    writeln!(out, "        <div class=\"grid\">")?;
    render_cpu(out, results, cfg)?;
    render_gpu(out, results, cfg)?;
    render_memory(out, results)?;
    render_disk(out, results)?;
    render_network(out, results)?;
    writeln!(out, "        </div>\n    </div>")?;

    render_summary(out, results, cfg)?;
    writeln!(out, "</body>\n</html>")
}

fn metric(out: &mut String, title: &str, rows: &[String]) -> fmt::Result {
    writeln!(out, "            <div class=\"metric\">")?;
    writeln!(out, "                <div class=\"metric-title\">{}</div>", escape(title))?;
    for row in rows {
        writeln!(out, "                {row}")?;
    }
    writeln!(out, "            </div>")
}

fn render_system(out: &mut String, info: &SystemInfo) -> fmt::Result {
    writeln!(out, "    <div class=\"section\">")?;
    writeln!(out, "        <h2 class=\"section-title\">System Information</h2>")?;
    writeln!(out, "        <div class=\"grid\">")?;
    metric(out, "Operating System", &[div(&or_unknown(&info.os_name))])?;
    metric(
        out,
        "Processor",
        &[
            div(&or_unknown(&info.cpu_name)),
            div(&format!("Cores: {}, Threads: {}", info.cpu_cores, info.cpu_threads)),
        ],
    )?;
    metric(out, "Memory", &[div(&format!("{:.1} GB", info.memory_gib()))])?;
    let vram = if info.gpu_memory > 0 {
        format!("{} MB VRAM", info.gpu_memory)
    } else {
        "VRAM not reported".to_string()
    };
    metric(out, "Graphics", &[div(&or_unknown(&info.gpu_name)), div(&vram)])?;
    let disks = if info.disk_names.is_empty() {
        "none detected".to_string()
    } else {
        info.disk_names.join(", ")
    };
    metric(out, "Storage", &[div(&disks)])?;
    writeln!(out, "        </div>\n    </div>")
}

fn render_cpu(out: &mut String, results: &TestResults, cfg: &ReportConfig) -> fmt::Result {
    let mut rows = score_rows(
        results,
        Subsystem::Cpu,
        results.cpu_score,
        cfg.cpu_excellent_threshold,
    );
    let simulated = if results.cpu_temp_source == crate::model::ReadingSource::Simulated {
        " (simulated)"
    } else {
        ""
    };
    rows.push(div(&format!("Temperature: {:.1}°C{simulated}", results.cpu_temp)));
    rows.push(gauge(gauge_percent(results.cpu_score, cfg.cpu_gauge_divisor)));
    metric(out, "CPU Performance", &rows)
}

fn render_gpu(out: &mut String, results: &TestResults, cfg: &ReportConfig) -> fmt::Result {
    let mut rows = score_rows(
        results,
        Subsystem::Gpu,
        results.gpu_score,
        cfg.gpu_excellent_threshold,
    );
    rows.push(gauge(gauge_percent(results.gpu_score, cfg.gpu_gauge_divisor)));
    metric(out, "GPU Performance (simulated workload)", &rows)
}

fn render_memory(out: &mut String, results: &TestResults) -> fmt::Result {
    if !results.was_measured(Subsystem::Memory) {
        return metric(out, "Memory Throughput", &[not_measured()]);
    }
    let mut rows = vec![format!("<div class=\"score\">{:.1} MB/s</div>", results.ram_score)];
    rows.push(div(&format!("In use: {:.1}%", results.ram_usage)));
    rows.extend(low_confidence(results, Subsystem::Memory));
    metric(out, "Memory Throughput", &rows)
}

fn render_disk(out: &mut String, results: &TestResults) -> fmt::Result {
    if !results.was_measured(Subsystem::Disk) {
        return metric(out, "Disk Throughput", &[not_measured()]);
    }
    let mut rows = vec![
        div(&format!("Write: {:.1} MB/s", results.disk_write)),
        div(&format!("Read: {:.1} MB/s (page cache)", results.disk_read)),
    ];
    rows.extend(low_confidence(results, Subsystem::Disk));
    metric(out, "Disk Throughput", &rows)
}

fn render_network(out: &mut String, results: &TestResults) -> fmt::Result {
    if !results.was_measured(Subsystem::Network) {
        return metric(out, "Network", &[not_measured()]);
    }
    let mut rows = vec![
        div(&format!("Latency: {:.1} ms", results.network_latency)),
        div(&format!("Bandwidth: {:.1} Mbit/s", results.network_bandwidth)),
    ];
    rows.extend(low_confidence(results, Subsystem::Network));
    metric(out, "Network", &rows)
}

fn render_summary(out: &mut String, results: &TestResults, cfg: &ReportConfig) -> fmt::Result {
    writeln!(out, "    <div class=\"summary\">")?;
    writeln!(out, "        <h2>Diagnostic Summary</h2>")?;
    writeln!(out, "        <ul>")?;
    writeln!(
        out,
        "            <li>CPU performance is {}</li>",
        label(results.cpu_score, cfg.cpu_excellent_threshold)
    )?;
    writeln!(
        out,
        "            <li>GPU performance is {}</li>",
        label(results.gpu_score, cfg.gpu_excellent_threshold)
    )?;
    let safe = cfg.safe_cpu_temp_celsius;
    let temp_line = if results.cpu_temp <= safe {
        format!("CPU temperature is within the safe range (up to {safe:.0}°C)")
    } else {
        format!("CPU temperature exceeds {safe:.0}°C; check cooling")
    };
    writeln!(out, "            <li>{temp_line}</li>")?;
    if results.cpu_temp_source == crate::model::ReadingSource::Simulated {
        writeln!(
            out,
            "            <li class=\"note\">No CPU temperature sensor was readable; the temperature shown is simulated</li>"
        )?;
    }
    writeln!(
        out,
        "            <li class=\"note\">Scores are relative to this build and its iteration counts</li>"
    )?;
    writeln!(out, "        </ul>\n    </div>")
}

fn score_rows(
    results: &TestResults,
    subsystem: Subsystem,
    score: f64,
    threshold: f64,
) -> Vec<String> {
    let mut rows = vec![
        format!("<div class=\"score\">{score:.1}</div>"),
        div(&format!("Rating: {}", label(score, threshold))),
    ];
    rows.extend(low_confidence(results, subsystem));
    rows
}

fn low_confidence(results: &TestResults, subsystem: Subsystem) -> Option<String> {
    results
        .flags
        .iter()
        .find(|f| f.subsystem == subsystem)
        .map(|f| {
            format!(
                "<div class=\"note\">low confidence: {}</div>",
                escape(&f.reason.to_string())
            )
        })
}

fn gauge(percent: f64) -> String {
    format!(
        "<div class=\"gauge\"><div class=\"gauge-fill\" style=\"width: {percent:.1}%\"></div></div>"
    )
}

fn not_measured() -> String {
    "<div class=\"note\">not measured</div>".to_string()
}

fn div(text: &str) -> String {
    format!("<div>{}</div>", escape(text))
}

fn or_unknown(text: &str) -> String {
    if text.trim().is_empty() {
        "Unknown".to_string()
    } else {
        text.to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    system: &'a SystemInfo,
    results: &'a TestResults,
}

pub fn to_json(
    info: &SystemInfo,
    results: &TestResults,
    generated_at: SystemTime,
) -> Result<String, ReportError> {
    let doc = JsonReport {
        generated_at: timestamp(generated_at),
        system: info,
        results,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn write_to(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let path_display = path.display().to_string();
    let mut file = File::create(path).map_err(|source| ReportError::Create {
        path: path_display.clone(),
        source,
    })?;
    file.write_all(contents)
        .and_then(|()| file.flush())
        .map_err(|source| ReportError::Write {
            path: path_display,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{sample_results, Degeneracy, ReadingSource, ScoreFlag};
    use std::time::{Duration, UNIX_EPOCH};

    fn info() -> SystemInfo {
        SystemInfo {
            os_name: "Ubuntu 24.04 LTS".to_string(),
            cpu_name: "AMD Ryzen 7 5800X".to_string(),
            cpu_cores: 8,
            cpu_threads: 16,
            memory_size: 32 * 1024 * 1024 * 1024,
            gpu_name: "NVIDIA GeForce RTX 3070".to_string(),
            gpu_memory: 8192,
            disk_names: vec!["nvme0n1".to_string(), "sda".to_string()],
        }
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn labels_on_both_sides_of_thresholds() {
        let cfg = ReportConfig::default();
        let mut results = sample_results();
        let html = render(&info(), &results, &cfg, at(0));
        assert!(html.contains("<li>CPU performance is excellent</li>"));
        assert!(html.contains("<li>GPU performance is excellent</li>"));

        results.cpu_score = 4000.0;
        results.gpu_score = 400.0;
        let html = render(&info(), &results, &cfg, at(0));
        assert!(html.contains("<li>CPU performance is adequate</li>"));
        assert!(html.contains("<li>GPU performance is adequate</li>"));
    }

    #[test]
    fn threshold_itself_is_adequate() {
        assert_eq!(label(5000.0, 5000.0), "adequate");
        assert_eq!(label(5000.1, 5000.0), "excellent");
    }

    #[test]
    fn gauge_is_bounded() {
        assert_eq!(gauge_percent(6000.0, 200.0), 30.0);
        assert_eq!(gauge_percent(125_000_000.0, 200.0), 100.0);
        assert_eq!(gauge_percent(-5.0, 200.0), 0.0);
        assert_eq!(gauge_percent(f64::NAN, 200.0), 0.0);
        assert_eq!(gauge_percent(600.0, 1000.0), 0.6);
    }

    #[test]
    fn rendering_is_deterministic_modulo_timestamp() {
        let cfg = ReportConfig::default();
        let results = sample_results();
        let first = render(&info(), &results, &cfg, at(1_700_000_000));
        let again = render(&info(), &results, &cfg, at(1_700_000_000));
        assert_eq!(first, again);

        let later = render(&info(), &results, &cfg, at(1_800_000_000));
        assert_ne!(first, later);
        let strip = |html: &str, t: SystemTime| html.replace(&timestamp(t), "");
        assert_eq!(
            strip(&first, at(1_700_000_000)),
            strip(&later, at(1_800_000_000))
        );
    }

    #[test]
    fn timestamp_is_rfc3339() {
        assert_eq!(timestamp(at(0)), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn document_is_self_contained_and_escaped() {
        let mut info = info();
        info.cpu_name = "<script>alert('x')</script> & co".to_string();
        let html = render(&info, &sample_results(), &ReportConfig::default(), at(0));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("http://"));
        assert!(!html.contains("https://"));
        assert!(!html.contains("<link"));
        assert!(!html.contains("src="));
    }

    #[test]
    fn marks_simulated_flagged_and_skipped_values() {
        let mut results = sample_results();
        results.cpu_temp_source = ReadingSource::Simulated;
        results.flags.push(ScoreFlag {
            subsystem: Subsystem::Gpu,
            reason: Degeneracy::ElapsedBelowResolution,
        });
        let html = render(&info(), &results, &ReportConfig::default(), at(0));
        assert!(html.contains("Temperature: 55.0°C (simulated)"));
        assert!(html.contains("low confidence: elapsed time below clock resolution"));
        assert!(html.contains("not measured"));
        assert!(html.contains("the temperature shown is simulated"));
    }

    #[test]
    fn degenerate_bandwidth_is_marked_on_the_network_card() {
        let mut results = sample_results();
        results.skipped.clear();
        results.network_latency = 1.3;
        results.network_bandwidth = 0.0;
        results.flags.push(ScoreFlag {
            subsystem: Subsystem::Network,
            reason: Degeneracy::NoIterations,
        });
        let html = render(&info(), &results, &ReportConfig::default(), at(0));
        let card = html
            .split("<div class=\"metric-title\">Network</div>")
            .nth(1)
            .and_then(|rest| rest.split("</div>\n            </div>").next())
            .expect("network card");
        assert!(card.contains("Bandwidth: 0.0 Mbit/s"));
        assert!(card.contains("low confidence: workload executed zero iterations"));
    }

    #[test]
    fn hot_cpu_changes_the_safety_line() {
        let cfg = ReportConfig::default();
        let mut results = sample_results();
        let html = render(&info(), &results, &cfg, at(0));
        assert!(html.contains("within the safe range (up to 85°C)"));
        results.cpu_temp = 92.0;
        let html = render(&info(), &results, &cfg, at(0));
        assert!(html.contains("CPU temperature exceeds 85°C"));
    }

    #[test]
    fn renders_inconsistent_core_counts_and_empty_fields() {
        let info = SystemInfo {
            cpu_cores: 8,
            cpu_threads: 2,
            ..SystemInfo::default()
        };
        let html = render(&info, &sample_results(), &ReportConfig::default(), at(0));
        assert!(html.contains("Cores: 8, Threads: 2"));
        assert!(html.contains("<div>Unknown</div>"));
        assert!(html.contains("VRAM not reported"));
        assert!(html.contains("none detected"));
    }

    #[test]
    fn unwritable_destination_is_a_create_error() {
        let err = write_to(Path::new("/no/such/dir/report.html"), b"x").expect_err("must fail");
        assert!(matches!(err, ReportError::Create { .. }));
        assert!(err.to_string().contains("/no/such/dir/report.html"));
    }

    #[test]
    fn writes_html_and_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let html_path = dir.path().join("report.html");
        let html = render(&info(), &sample_results(), &ReportConfig::default(), at(0));
        write_to(&html_path, html.as_bytes()).expect("write html");
        assert_eq!(std::fs::read_to_string(&html_path).expect("read back"), html);

        let json = to_json(&info(), &sample_results(), at(0)).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["generated_at"], "1970-01-01T00:00:00Z");
        assert_eq!(value["results"]["cpu_score"], 6000.0);
        assert_eq!(value["results"]["skipped"][0], "network");
        assert_eq!(value["system"]["cpu_cores"], 8);
    }
}
