use std::ffi::OsString;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SubvoiceError};

use super::ffmpeg::{probe_duration, run_ffmpeg, secs_arg};

/// Smallest factor a single `atempo` stage accepts.
pub const ATEMPO_MIN: f64 = 0.5;

/// Largest factor a single `atempo` stage accepts.
pub const ATEMPO_MAX: f64 = 100.0;

/// How a raw synthesized clip is forced to its cue's exact duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeStrategy {
    /// Pad with silence up to the target, then truncate. For backends that
    /// already aim at the target duration.
    PadTrim,
    /// Time-stretch by the measured/target ratio, then truncate. For backends
    /// that ignore timing.
    TempoChain,
}

impl NormalizeStrategy {
    /// Write `raw` to `output` with a duration of exactly `target_ms`.
    pub async fn normalize(&self, raw: &Path, output: &Path, target_ms: u64) -> Result<()> {
        if target_ms == 0 {
            return Err(SubvoiceError::Processing(
                "Target duration must be positive".to_string(),
            ));
        }

        match self {
            NormalizeStrategy::PadTrim => pad_trim(raw, output, target_ms).await,
            NormalizeStrategy::TempoChain => tempo_stretch(raw, output, target_ms).await,
        }
    }
}

async fn pad_trim(raw: &Path, output: &Path, target_ms: u64) -> Result<()> {
    let secs = secs_arg(target_ms);
    debug!("Pad-trim {} to {}s", raw.display(), secs);

    run_ffmpeg(vec![
        "-i".into(),
        raw.into(),
        "-af".into(),
        format!("apad=pad_dur={secs}").into(),
        "-t".into(),
        secs.into(),
        output.into(),
    ])
    .await
}

async fn tempo_stretch(raw: &Path, output: &Path, target_ms: u64) -> Result<()> {
    let actual_ms = match probe_duration(raw).await {
        Ok(d) => d.as_secs_f64() * 1000.0,
        Err(e) => {
            warn!("Could not measure {}: {}", raw.display(), e);
            0.0
        }
    };

    if actual_ms <= 0.0 {
        debug!("No measurable duration for {}, falling back to pad-trim", raw.display());
        return pad_trim(raw, output, target_ms).await;
    }

    let ratio = actual_ms / target_ms as f64;
    let filter = atempo_filter(&tempo_chain(ratio));
    debug!(
        "Tempo {} from {:.0}ms to {}ms (ratio {:.4}): {}",
        raw.display(),
        actual_ms,
        target_ms,
        ratio,
        filter
    );

    let args: Vec<OsString> = vec![
        "-i".into(),
        raw.into(),
        "-af".into(),
        filter.into(),
        "-t".into(),
        secs_arg(target_ms).into(),
        output.into(),
    ];
    run_ffmpeg(args).await
}

/// Split a stretch ratio into `atempo` stages that each stay within
/// [`ATEMPO_MIN`, `ATEMPO_MAX`]. The stages multiply back to `ratio`.
pub fn tempo_chain(ratio: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    let mut remaining = ratio;

    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    stages.push(remaining);

    stages
}

/// Render tempo stages as an FFmpeg filter chain.
pub fn atempo_filter(stages: &[f64]) -> String {
    stages
        .iter()
        .map(|f| format!("atempo={f:.6}"))
        .collect::<Vec<_>>()
        .join(",")
}
