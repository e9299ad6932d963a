//! Per-cue synthesis parameters.
//!
//! A voice map is a JSON document with a `default` parameter set and a
//! `segments` object keyed by cue ranges:
//!
//! ```json
//! {
//!   "default": { "voice_id": "narrator", "speed": 1.0 },
//!   "segments": {
//!     "1-3": { "emo": "calm" },
//!     "2":   { "voice_id": "guest" }
//!   }
//! }
//! ```
//!
//! Range keys are `"n"` or `"n-m"` (inclusive, 1-based). Every range covering
//! a cue is applied on top of `default` in the order the ranges are written in
//! the document, so a later range wins on any field it shares with an earlier
//! one. List ranges in the precedence order you intend.

use crate::error::{Result, SubvoiceError};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Synthesis parameters for one cue. Every field is optional so the same type
/// serves as a full configuration and as a partial override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Noiz voice identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Local audio file uploaded to Noiz for voice cloning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_audio: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_preset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_enh: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_voice: Option<bool>,
    /// Emotion descriptor: a plain string or an object such as `{"Joy": 0.5}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emo: Option<Value>,
    /// Kokoro voice name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Kokoro language code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Fields not understood by any backend, carried through to the report.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SegmentConfig {
    /// Replace every field that `overlay` sets.
    pub fn apply(&mut self, overlay: &SegmentConfig) {
        fn set<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }

        set(&mut self.voice_id, &overlay.voice_id);
        set(&mut self.reference_audio, &overlay.reference_audio);
        set(&mut self.quality_preset, &overlay.quality_preset);
        set(&mut self.speed, &overlay.speed);
        set(&mut self.target_lang, &overlay.target_lang);
        set(&mut self.similarity_enh, &overlay.similarity_enh);
        set(&mut self.save_voice, &overlay.save_voice);
        set(&mut self.emo, &overlay.emo);
        set(&mut self.voice, &overlay.voice);
        set(&mut self.lang, &overlay.lang);
        self.extra
            .extend(overlay.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// One `segments` entry: the range key as written and its partial configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeOverride {
    pub key: String,
    pub config: SegmentConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VoiceMap {
    #[serde(default)]
    pub default: SegmentConfig,
    #[serde(default, deserialize_with = "ordered_overrides")]
    pub segments: Vec<RangeOverride>,
}

impl VoiceMap {
    pub fn new(default: SegmentConfig) -> Self {
        Self {
            default,
            segments: Vec::new(),
        }
    }

    /// Append a range override; it takes precedence over earlier ones.
    pub fn with_segment(mut self, key: impl Into<String>, config: SegmentConfig) -> Self {
        self.segments.push(RangeOverride {
            key: key.into(),
            config,
        });
        self
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| SubvoiceError::Config(format!("Invalid voice map: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SubvoiceError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Resolve the configuration for the cue with the given index.
    pub fn resolve(&self, index: u32) -> Result<SegmentConfig> {
        let mut merged = self.default.clone();
        for segment in &self.segments {
            let range = parse_range_key(&segment.key)?;
            if range.contains(&index) {
                debug!("Cue {} matches range {}", index, segment.key);
                merged.apply(&segment.config);
            }
        }
        Ok(merged)
    }
}

/// Parse a `"n"` or `"n-m"` range key into an inclusive range.
pub fn parse_range_key(key: &str) -> Result<RangeInclusive<u32>> {
    let bound = |s: &str| -> Result<u32> {
        s.trim()
            .parse::<u32>()
            .map_err(|e| SubvoiceError::Config(format!("Invalid segment range '{key}': {e}")))
    };

    match key.trim().split_once('-') {
        Some((lo, hi)) => Ok(bound(lo)?..=bound(hi)?),
        None => {
            let n = bound(key)?;
            Ok(n..=n)
        }
    }
}

/// Decode the `segments` object into a list that keeps document order.
fn ordered_overrides<'de, D>(deserializer: D) -> std::result::Result<Vec<RangeOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<RangeOverride>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object mapping cue ranges to configurations")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, config)) = map.next_entry::<String, SegmentConfig>()? {
                out.push(RangeOverride { key, config });
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}
