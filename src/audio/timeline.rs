use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SubvoiceError};

use super::ffmpeg::{run_ffmpeg, secs_arg};

/// Prepend `start_ms` of silence to `clip` so it begins at its timeline offset.
pub async fn delay(clip: &Path, output: &Path, start_ms: u64) -> Result<()> {
    debug!("Delaying {} by {}ms", clip.display(), start_ms);

    run_ffmpeg(vec![
        "-i".into(),
        clip.into(),
        "-af".into(),
        format!("adelay={start_ms}:all=1").into(),
        output.into(),
    ])
    .await
}

/// Mix delayed clips into one track cut to exactly `total_ms`.
pub async fn mix(clips: &[PathBuf], output: &Path, total_ms: u64) -> Result<()> {
    if clips.is_empty() {
        return Err(SubvoiceError::Processing("No segments to mix".to_string()));
    }

    debug!("Mixing {} clips into {}", clips.len(), output.display());
    run_ffmpeg(mix_args(clips, output, total_ms)).await
}

fn mix_args(clips: &[PathBuf], output: &Path, total_ms: u64) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(clips.len() * 2 + 5);
    for clip in clips {
        args.push("-i".into());
        args.push(clip.into());
    }
    args.push("-filter_complex".into());
    args.push(
        format!(
            "amix=inputs={}:duration=longest:dropout_transition=0",
            clips.len()
        )
        .into(),
    );
    args.push("-t".into());
    args.push(secs_arg(total_ms).into());
    args.push(output.into());
    args
}
