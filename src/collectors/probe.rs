use std::process::{Command, Output};
use tracing::debug;

pub fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(err) => {
            debug!(program, error = %err, "probe command unavailable");
            return None;
        }
    };
    successful_stdout(program, output)
}

fn successful_stdout(program: &str, output: Output) -> Option<String> {
    if !output.status.success() {
        debug!(program, status = %output.status, "probe command failed");
        return None;
    }
    let text = decode_cmd_stdout(&output.stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn nvidia_smi(query: &str) -> Option<String> {
    let query_arg = format!("--query-gpu={query}");
    let args = [query_arg.as_str(), "--format=csv,noheader,nounits"];
    if let Some(out) = command_stdout("nvidia-smi", &args) {
        return Some(out);
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(out) = command_stdout(r"C:\Windows\System32\nvidia-smi.exe", &args) {
            return Some(out);
        }
    }

    None
}

#[cfg(target_os = "windows")]
pub fn powershell(script: &str) -> Option<String> {
    let wrapped_script = format!(
        "[Console]::OutputEncoding=[System.Text.UTF8Encoding]::new($false); {script}"
    );
    let args = ["-NoProfile", "-Command", wrapped_script.as_str()];
    if let Some(out) = command_stdout("powershell", &args) {
        return Some(out);
    }
    command_stdout(
        r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe",
        &args,
    )
}

pub fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    if let Ok(v) = trimmed.replace(',', ".").parse::<f64>() {
        return Some(v);
    }

    let filtered: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | 'e' | 'E' | '-' | '+'))
        .collect();
    if filtered.is_empty() {
        return None;
    }

    filtered.replace(',', ".").parse::<f64>().ok()
}

pub fn parse_u64_loose(input: &str) -> Option<u64> {
    parse_f64_loose(input)
        .filter(|v| v.is_finite())
        .map(|v| if v < 0.0 { 0 } else { v as u64 })
}

/// Windows tools may answer in UTF-16LE depending on the console code page.
pub fn decode_cmd_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let u16buf: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}
