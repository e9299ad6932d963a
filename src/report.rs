// Render report: the audit record of one timeline render
use crate::audio::NormalizeStrategy;
use crate::config::BackendKind;
use crate::error::Result;
use crate::subtitle::Cue;
use crate::voice_map::SegmentConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the report inside the work directory.
pub const REPORT_FILE_NAME: &str = "render_report.json";

#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub srt: PathBuf,
    pub output: PathBuf,
    pub backend: BackendKind,
    pub total_ms: u64,
    pub segments: Vec<SegmentReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    /// Raw clip duration as reported by the backend, in seconds.
    pub raw_duration_sec: Option<f64>,
    pub backend: BackendKind,
    pub normalizer: NormalizeStrategy,
    /// Text actually sent for synthesis, when it differs from the cue text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesized_text: Option<String>,
    pub config: SegmentConfig,
}

impl SegmentReport {
    pub fn new(
        cue: &Cue,
        backend: BackendKind,
        normalizer: NormalizeStrategy,
        raw_duration_sec: Option<f64>,
        config: SegmentConfig,
    ) -> Self {
        Self {
            index: cue.index,
            start_ms: cue.start_ms,
            end_ms: cue.end_ms,
            duration_ms: cue.duration_ms(),
            raw_duration_sec,
            backend,
            normalizer,
            synthesized_text: None,
            config,
        }
    }
}

impl RenderReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as `render_report.json` in `dir`, returning its path.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        tokio::fs::write(&path, self.to_json()?).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json() {
        let cue = Cue::new(2, 2300, 5000, "World");
        let config = SegmentConfig {
            voice_id: Some("v1".to_string()),
            ..Default::default()
        };
        let report = RenderReport {
            srt: PathBuf::from("in.srt"),
            output: PathBuf::from("out.wav"),
            backend: BackendKind::Noiz,
            total_ms: 5000,
            segments: vec![SegmentReport::new(
                &cue,
                BackendKind::Noiz,
                NormalizeStrategy::PadTrim,
                None,
                config,
            )],
        };

        let json = report.to_json().unwrap();
        assert!(json.contains("\"backend\": \"noiz\""));
        assert!(json.contains("\"total_ms\": 5000"));
        assert!(json.contains("\"start_ms\": 2300"));
        assert!(json.contains("\"duration_ms\": 2700"));
        assert!(json.contains("\"raw_duration_sec\": null"));
        assert!(json.contains("\"normalizer\": \"pad_trim\""));
        assert!(json.contains("\"voice_id\": \"v1\""));
        assert!(!json.contains("synthesized_text"));
    }
}
