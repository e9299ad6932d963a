// SRT subtitle parsing
use super::Cue;
use crate::error::{Result, SubvoiceError};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,}):(\d{2}):(\d{2})[,.](\d{3})$").expect("valid timestamp regex")
});

const SEPARATOR: &str = "-->";

/// Parse an `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`) timestamp into milliseconds.
pub fn parse_timestamp_ms(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    let caps = TIMESTAMP_RE
        .captures(trimmed)
        .ok_or_else(|| SubvoiceError::Format(format!("Invalid SRT timestamp: {trimmed}")))?;

    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|e| SubvoiceError::Format(format!("Invalid SRT timestamp {trimmed}: {e}")))
    };

    let (hh, mm, ss, ms) = (field(1)?, field(2)?, field(3)?, field(4)?);
    hh.checked_mul(60)
        .and_then(|m| m.checked_add(mm))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(ss))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|t| t.checked_add(ms))
        .ok_or_else(|| SubvoiceError::Format(format!("SRT timestamp out of range: {trimmed}")))
}

/// Format milliseconds as an SRT timestamp.
pub fn format_timestamp_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, ms % 1000)
}

/// Parse SRT content into cues, in file order.
///
/// Blocks with a non-numeric index, no `-->` separator, or no text are skipped.
/// A malformed timestamp is an error, and so is input without a single usable cue.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let mut cues = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                if let Some(cue) = parse_block(&block)? {
                    cues.push(cue);
                }
                block.clear();
            }
        } else {
            block.push(line.trim_end());
        }
    }

    if cues.is_empty() {
        return Err(SubvoiceError::EmptyInput(
            "No valid cues parsed from SRT".to_string(),
        ));
    }

    debug!("Parsed {} cues", cues.len());
    Ok(cues)
}

/// Read and parse an SRT file.
pub fn parse_srt_file(path: &Path) -> Result<Vec<Cue>> {
    if !path.exists() {
        return Err(SubvoiceError::FileNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    parse_srt(&String::from_utf8_lossy(&bytes))
}

fn parse_block(lines: &[&str]) -> Result<Option<Cue>> {
    if lines.len() < 3 {
        return Ok(None);
    }

    let Ok(index) = lines[0].trim().parse::<u32>() else {
        debug!("Skipping block with invalid index: {:?}", lines[0]);
        return Ok(None);
    };

    let Some((start_raw, end_raw)) = lines[1].split_once(SEPARATOR) else {
        debug!("Skipping cue {} without timing separator", index);
        return Ok(None);
    };

    let start_ms = parse_timestamp_ms(start_raw)?;
    let end_ms = parse_timestamp_ms(end_raw)?;

    let text = lines[2..].join("\n").trim().to_string();
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(Cue {
        index,
        start_ms,
        end_ms,
        text,
    }))
}
