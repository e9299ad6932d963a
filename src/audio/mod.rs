pub mod ffmpeg;
pub mod normalize;
pub mod timeline;

pub use ffmpeg::{check_ffmpeg, check_ffprobe, convert, ffmpeg_available, probe_duration, run_ffmpeg};
pub use normalize::{atempo_filter, tempo_chain, NormalizeStrategy, ATEMPO_MAX, ATEMPO_MIN};
pub use timeline::{delay, mix};
