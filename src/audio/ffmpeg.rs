use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, SubvoiceError};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg", "Please install FFmpeg and ensure it's in your PATH")
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe", "Please install FFmpeg (includes FFprobe)")
}

fn check_tool(program: &str, hint: &str) -> Result<()> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| SubvoiceError::Processing(format!("{program} not found. {hint}. Error: {e}")))?;

    if !output.status.success() {
        return Err(SubvoiceError::Processing(format!("{program} check failed")));
    }

    debug!("{} is available", program);
    Ok(())
}

/// Run FFmpeg with the given arguments, failing on a non-zero exit status.
///
/// `-y` and `-v error` are always prepended. The child is killed if the
/// returned future is dropped before it completes.
pub async fn run_ffmpeg(args: Vec<OsString>) -> Result<()> {
    let rendered = args
        .iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    debug!("ffmpeg {}", rendered);

    let output = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-v", "error"])
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SubvoiceError::Processing(format!("Failed to run FFmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SubvoiceError::Processing(format!(
            "ffmpeg {} exited with {}: {}",
            rendered,
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Get audio duration from the container metadata using FFprobe.
pub async fn probe_duration(input: &Path) -> Result<Duration> {
    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SubvoiceError::Processing(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SubvoiceError::Processing(format!(
            "FFprobe failed on {}: {}",
            input.display(),
            stderr.trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(stdout: &str) -> Result<Duration> {
    let trimmed = stdout.trim();
    let secs: f64 = trimmed.parse().map_err(|e| {
        SubvoiceError::Processing(format!("Failed to parse duration '{trimmed}': {e}"))
    })?;

    Duration::try_from_secs_f64(secs)
        .map_err(|e| SubvoiceError::Processing(format!("Invalid duration '{trimmed}': {e}")))
}

/// Convert an audio file to whatever container its output extension implies.
pub async fn convert(input: &Path, output: &Path) -> Result<()> {
    run_ffmpeg(vec!["-i".into(), input.into(), output.into()]).await?;

    if !output.exists() {
        return Err(SubvoiceError::Processing(format!(
            "Conversion produced no output at {}",
            output.display()
        )));
    }
    Ok(())
}

/// Format milliseconds as the seconds argument FFmpeg expects.
pub(crate) fn secs_arg(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// True when both ffmpeg and ffprobe can be run.
pub fn ffmpeg_available() -> bool {
    check_ffmpeg().is_ok() && check_ffprobe().is_ok()
}
