use crate::audio::{probe_duration, NormalizeStrategy};
use crate::config::{AudioFormat, BackendKind};
use crate::error::{Result, SubvoiceError};
use crate::subtitle::Cue;
use crate::tts::{Synthesis, Synthesizer};
use crate::voice_map::SegmentConfig;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Local `kokoro-tts` command-line synthesizer.
///
/// Kokoro ignores timing, so its clips are time-stretched afterwards.
pub struct KokoroCli {
    program: PathBuf,
}

impl KokoroCli {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the executable can be spawned.
    pub fn check(&self) -> Result<()> {
        Command::new(&self.program)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                SubvoiceError::Backend(format!(
                    "{} not found. Install kokoro-tts or set KOKORO_BIN. Error: {e}",
                    self.program.display()
                ))
            })?;
        Ok(())
    }
}

/// Arguments after the program name: input text file, output path, then flags.
fn build_args(
    text_file: &Path,
    output: &Path,
    config: &SegmentConfig,
    format: AudioFormat,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![text_file.into(), output.into()];

    if let Some(voice) = config.voice.as_deref().filter(|v| !v.is_empty()) {
        args.push("--voice".into());
        args.push(voice.into());
    }
    if let Some(lang) = config.lang.as_deref().filter(|l| !l.is_empty()) {
        args.push("--lang".into());
        args.push(lang.into());
    }
    if let Some(speed) = config.speed {
        args.push("--speed".into());
        args.push(speed.to_string().into());
    }
    args.push("--format".into());
    args.push(format.extension().into());

    args
}

#[async_trait]
impl Synthesizer for KokoroCli {
    async fn synthesize(
        &self,
        cue: &Cue,
        config: &SegmentConfig,
        format: AudioFormat,
        output: &Path,
    ) -> Result<Synthesis> {
        // Removed when dropped, whichever way this function exits.
        let mut text_file = tempfile::Builder::new()
            .prefix("subvoice_cue_")
            .suffix(".txt")
            .tempfile()?;
        text_file.write_all(cue.text.as_bytes())?;
        text_file.flush()?;

        // A clip left by an earlier run must not pass for this run's output.
        if output.exists() {
            tokio::fs::remove_file(output).await?;
        }

        let args = build_args(text_file.path(), output, config, format);
        debug!("Running {} for cue {}", self.program.display(), cue.index);

        let result = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SubvoiceError::Backend(format!("Failed to run {}: {e}", self.program.display()))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(SubvoiceError::Backend(format!(
                "kokoro-tts failed ({}): {}",
                result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(SubvoiceError::Backend(format!(
                "kokoro-tts produced no output at {}",
                output.display()
            )));
        }

        let duration = probe_duration(output).await?;
        debug!("Cue {}: kokoro clip is {:.3}s", cue.index, duration.as_secs_f64());

        Ok(Synthesis {
            path: output.to_path_buf(),
            reported_duration: Some(duration.as_secs_f64()),
        })
    }

    fn name(&self) -> &'static str {
        "Kokoro"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Kokoro
    }

    fn normalizer(&self) -> NormalizeStrategy {
        NormalizeStrategy::TempoChain
    }
}
