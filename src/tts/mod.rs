pub mod kokoro;
pub mod noiz;

pub use kokoro::KokoroCli;
pub use noiz::NoizClient;

use crate::audio::NormalizeStrategy;
use crate::config::{AudioFormat, BackendKind, Config};
use crate::error::{Result, SubvoiceError};
use crate::subtitle::Cue;
use crate::voice_map::SegmentConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Raw audio produced for one cue.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub path: PathBuf,
    /// Duration in seconds as reported by the backend. Informational only.
    pub reported_duration: Option<f64>,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `cue`'s text into `output` using the resolved configuration.
    async fn synthesize(
        &self,
        cue: &Cue,
        config: &SegmentConfig,
        format: AudioFormat,
        output: &Path,
    ) -> Result<Synthesis>;

    /// Check that `config` carries what this backend needs, without any I/O
    /// beyond local file lookups.
    fn validate(&self, _config: &SegmentConfig) -> Result<()> {
        Ok(())
    }

    /// Rewrite the cue text with emotion markup, if the backend supports it.
    async fn enhance_emotion(&self, cue: &Cue) -> Result<Cue> {
        Ok(cue.clone())
    }

    fn name(&self) -> &'static str;

    fn kind(&self) -> BackendKind;

    /// The duration normalization suited to this backend's output.
    fn normalizer(&self) -> NormalizeStrategy;
}

/// Create a synthesizer for the given backend.
pub fn create_synthesizer(kind: BackendKind, config: &Config) -> Result<Box<dyn Synthesizer>> {
    match kind {
        BackendKind::Noiz => {
            let api_key = config.noiz_api_key.as_ref().ok_or_else(|| {
                SubvoiceError::Config(
                    "Noiz API key not set. Set NOIZ_API_KEY environment variable.".to_string(),
                )
            })?;
            Ok(Box::new(
                NoizClient::new(api_key.clone())
                    .with_base_url(config.noiz_base_url.clone())
                    .with_timeout(config.timeout()),
            ))
        }
        BackendKind::Kokoro => Ok(Box::new(KokoroCli::new(config.kokoro_bin.clone()))),
    }
}
