pub mod srt;

pub use srt::{format_timestamp_ms, parse_srt, parse_srt_file, parse_timestamp_ms};

use std::time::Duration;

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    pub fn new(index: u32, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// On-screen duration, never shorter than 1 ms.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms).max(1)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }

    /// A copy of this cue carrying different text (e.g. after emotion enhancement).
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// Total span of the timeline: the latest end offset of any cue.
pub fn timeline_span_ms(cues: &[Cue]) -> u64 {
    cues.iter().map(|c| c.end_ms).max().unwrap_or(0)
}
