use crate::error::{Result, SubvoiceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default endpoint of the Noiz cloud TTS API.
pub const DEFAULT_NOIZ_BASE_URL: &str = "https://noiz.ai/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Kokoro,
    Noiz,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Kokoro => write!(f, "kokoro"),
            BackendKind::Noiz => write!(f, "noiz"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kokoro" => Ok(BackendKind::Kokoro),
            "noiz" => Ok(BackendKind::Noiz),
            _ => Err(format!("Unknown backend: {}. Use 'kokoro' or 'noiz'", s)),
        }
    }
}

/// Container format requested from the synthesis backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            _ => Err(format!("Unknown audio format: {}. Use 'wav' or 'mp3'", s)),
        }
    }
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub noiz_api_key: Option<String>,
    pub noiz_base_url: String,
    pub kokoro_bin: PathBuf,
    pub default_backend: BackendKind,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            noiz_api_key: None,
            noiz_base_url: DEFAULT_NOIZ_BASE_URL.to_string(),
            kokoro_bin: PathBuf::from("kokoro-tts"),
            default_backend: BackendKind::default(),
            concurrency: 4,
            timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!("Ignoring malformed {}: {}", config_path.display(), e),
                }
            }
        }

        if let Ok(key) = std::env::var("NOIZ_API_KEY") {
            config.noiz_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("NOIZ_BASE_URL") {
            config.noiz_base_url = url;
        }
        if let Ok(bin) = std::env::var("KOKORO_BIN") {
            config.kokoro_bin = PathBuf::from(bin);
        }
        if let Ok(backend) = std::env::var("SUBVOICE_BACKEND") {
            if let Ok(b) = backend.parse() {
                config.default_backend = b;
            }
        }
        if let Ok(concurrency) = std::env::var("SUBVOICE_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.concurrency = c;
            }
        }
        if let Ok(timeout) = std::env::var("SUBVOICE_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                config.timeout_secs = t;
            }
        }

        Ok(config)
    }

    pub fn validate(&self, backend: BackendKind) -> Result<()> {
        if backend == BackendKind::Noiz && self.noiz_api_key.is_none() {
            return Err(SubvoiceError::Config(
                "Noiz API key not set. Pass --api-key or export NOIZ_API_KEY".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(SubvoiceError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(SubvoiceError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("subvoice").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("kokoro".parse::<BackendKind>().unwrap(), BackendKind::Kokoro);
        assert_eq!("NOIZ".parse::<BackendKind>().unwrap(), BackendKind::Noiz);
        assert!("openai".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("wav".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("ogg".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Mp3.to_string(), "mp3");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_backend, BackendKind::Kokoro);
        assert_eq!(config.noiz_base_url, DEFAULT_NOIZ_BASE_URL);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_validate_missing_api_key() {
        let config = Config::default();
        assert!(config.validate(BackendKind::Noiz).is_err());
        assert!(config.validate(BackendKind::Kokoro).is_ok());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = Config {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(BackendKind::Kokoro),
            Err(SubvoiceError::Config(_))
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("noiz_api_key = \"abc\"\nconcurrency = 2").unwrap();
        assert_eq!(config.noiz_api_key.as_deref(), Some("abc"));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.default_backend, BackendKind::Kokoro);
    }
}
