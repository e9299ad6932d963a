pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod subtitle;
pub mod tts;
pub mod voice_map;

pub use config::{AudioFormat, BackendKind, Config};
pub use error::{Result, SubvoiceError};
pub use pipeline::{
    print_summary, render_cues, render_timeline, RenderRequest, RenderResult, RenderStats,
};
pub use subtitle::Cue;
pub use voice_map::{SegmentConfig, VoiceMap};
