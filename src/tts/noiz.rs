use crate::audio::NormalizeStrategy;
use crate::config::{AudioFormat, BackendKind, DEFAULT_NOIZ_BASE_URL};
use crate::error::{Result, SubvoiceError};
use crate::subtitle::Cue;
use crate::tts::{Synthesis, Synthesizer};
use crate::voice_map::SegmentConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Response header carrying the synthesized clip's duration in seconds.
const DURATION_HEADER: &str = "X-Audio-Duration";

/// Client for the Noiz cloud TTS API.
pub struct NoizClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl NoizClient {
    /// Create a new Noiz client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_NOIZ_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Build the multipart form for a text-to-speech request.
    async fn build_form(&self, cue: &Cue, config: &SegmentConfig, format: AudioFormat) -> Result<Form> {
        let mut form = form_fields(cue, config, format)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));

        if let Some(ref reference) = config.reference_audio {
            form = form.part("file", reference_part(reference).await?);
        }

        Ok(form)
    }

    async fn error_from(response: reqwest::Response, what: &str) -> SubvoiceError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SubvoiceError::Backend(format!("{what}: status={status}, body={body}"))
    }
}

#[async_trait]
impl Synthesizer for NoizClient {
    async fn synthesize(
        &self,
        cue: &Cue,
        config: &SegmentConfig,
        format: AudioFormat,
        output: &Path,
    ) -> Result<Synthesis> {
        self.validate(config)?;

        let form = self.build_form(cue, config, format).await?;
        debug!("Requesting Noiz synthesis for cue {}", cue.index);

        let response = self
            .client
            .post(self.endpoint("text-to-speech"))
            .header("Authorization", &self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubvoiceError::Backend(format!("/text-to-speech request failed: {e}")))?;

        let status = response.status();
        debug!("Noiz response status for cue {}: {}", cue.index, status);

        if !status.is_success() {
            return Err(Self::error_from(response, "/text-to-speech").await);
        }

        let reported_duration = response
            .headers()
            .get(DURATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SubvoiceError::Backend(format!("Failed to read audio body: {e}")))?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output, &bytes).await?;

        debug!(
            "Cue {}: wrote {} bytes (reported {:?}s)",
            cue.index,
            bytes.len(),
            reported_duration
        );

        Ok(Synthesis {
            path: output.to_path_buf(),
            reported_duration,
        })
    }

    fn validate(&self, config: &SegmentConfig) -> Result<()> {
        require_voice(config)?;
        if let Some(ref reference) = config.reference_audio {
            if !reference.exists() {
                return Err(SubvoiceError::Config(format!(
                    "reference_audio not found: {}",
                    reference.display()
                )));
            }
        }
        Ok(())
    }

    async fn enhance_emotion(&self, cue: &Cue) -> Result<Cue> {
        let response = self
            .client
            .post(self.endpoint("emotion-enhance"))
            .header("Authorization", &self.api_key)
            .timeout(self.timeout)
            .json(&EnhanceRequest { text: &cue.text })
            .send()
            .await
            .map_err(|e| SubvoiceError::Backend(format!("/emotion-enhance request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "/emotion-enhance").await);
        }

        let body = response.text().await?;
        let parsed: EnhanceResponse = serde_json::from_str(&body)?;

        match parsed.data.and_then(|d| d.emotion_enhance) {
            Some(text) if !text.trim().is_empty() => {
                debug!("Cue {}: emotion-enhanced text {:?}", cue.index, text);
                Ok(cue.with_text(text))
            }
            _ => Err(SubvoiceError::Backend(format!(
                "/emotion-enhance returned no data: {body}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "Noiz"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Noiz
    }

    fn normalizer(&self) -> NormalizeStrategy {
        NormalizeStrategy::PadTrim
    }
}

/// Noiz needs either a stored voice or a reference clip to clone.
fn require_voice(config: &SegmentConfig) -> Result<()> {
    let has_voice_id = config.voice_id.as_deref().is_some_and(|v| !v.is_empty());
    if !has_voice_id && config.reference_audio.is_none() {
        return Err(SubvoiceError::Config(
            "either voice_id or reference_audio is required".to_string(),
        ));
    }
    Ok(())
}

/// Text fields of a text-to-speech request, in send order.
fn form_fields(cue: &Cue, config: &SegmentConfig, format: AudioFormat) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("text", cue.text.clone()),
        ("duration", format!("{:.3}", cue.duration_ms() as f64 / 1000.0)),
        ("output_format", format.to_string()),
    ];

    if let Some(ref voice_id) = config.voice_id {
        fields.push(("voice_id", voice_id.clone()));
    }
    if let Some(ref preset) = config.quality_preset {
        fields.push(("quality_preset", value_field(preset)));
    }
    if let Some(speed) = config.speed {
        fields.push(("speed", speed.to_string()));
    }
    if let Some(ref lang) = config.target_lang {
        fields.push(("target_lang", lang.clone()));
    }
    if let Some(similarity) = config.similarity_enh {
        fields.push(("similarity_enh", similarity.to_string()));
    }
    if let Some(save) = config.save_voice {
        fields.push(("save_voice", save.to_string()));
    }
    if let Some(ref emo) = config.emo {
        fields.push(("emo", value_field(emo)));
    }

    fields
}

/// Strings go out verbatim, anything else as compact JSON.
fn value_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read the reference clip into a form part. The file is closed before this returns.
async fn reference_part(path: &Path) -> Result<Part> {
    if !path.exists() {
        return Err(SubvoiceError::Config(format!(
            "reference_audio not found: {}",
            path.display()
        )));
    }

    let file_bytes = fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("reference.wav")
        .to_string();

    let mime_type = match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    };

    Ok(Part::bytes(file_bytes)
        .file_name(file_name)
        .mime_str(mime_type)?)
}

#[derive(Serialize)]
struct EnhanceRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EnhanceResponse {
    data: Option<EnhanceData>,
}

#[derive(Debug, Deserialize)]
struct EnhanceData {
    emotion_enhance: Option<String>,
}
