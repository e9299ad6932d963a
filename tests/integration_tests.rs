//! Integration tests for subvoice
//!
//! Parsing and configuration tests run anywhere. Audio tests drive the real
//! FFmpeg binary and are skipped when it is not installed.

use subvoice::audio::{
    delay, ffmpeg_available, mix, probe_duration, tempo_chain, NormalizeStrategy, ATEMPO_MAX,
    ATEMPO_MIN,
};
use subvoice::config::{AudioFormat, BackendKind, Config};
use subvoice::subtitle::{format_timestamp_ms, parse_srt, parse_timestamp_ms, timeline_span_ms};
use subvoice::voice_map::{SegmentConfig, VoiceMap};
use subvoice::SubvoiceError;

use std::path::Path;
use std::time::Duration;

/// Tolerance for measured durations: one encoder frame.
const FRAME_TOLERANCE_MS: f64 = 50.0;

fn write_tone(path: &Path, ms: u64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let samples = 24_000 * ms / 1000;
    for i in 0..samples {
        let t = i as f32 / 24_000.0;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0;
        writer.write_sample(sample as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn assert_duration_ms(measured: Duration, expected_ms: u64) {
    let measured_ms = measured.as_secs_f64() * 1000.0;
    assert!(
        (measured_ms - expected_ms as f64).abs() <= FRAME_TOLERANCE_MS,
        "expected {expected_ms}ms, measured {measured_ms:.1}ms"
    );
}

// ============================================================================
// SRT Parsing Tests
// ============================================================================

mod srt_tests {
    use super::*;

    const SAMPLE: &str = "\
1
00:00:00,000 --> 00:00:02,000
Hello

2
00:00:02,300 --> 00:00:05,000
World

7
00:00:04,000 --> 00:00:04,000
Zero length
";

    #[test]
    fn test_cues_in_file_order_with_positive_duration() {
        let cues = parse_srt(SAMPLE).unwrap();
        let indices: Vec<u32> = cues.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 7]);
        assert!(cues.iter().all(|c| c.duration_ms() >= 1));
        assert_eq!(cues[2].duration_ms(), 1);
    }

    #[test]
    fn test_timeline_span() {
        let cues = parse_srt(SAMPLE).unwrap();
        assert_eq!(timeline_span_ms(&cues), 5000);
    }

    #[test]
    fn test_no_parseable_blocks() {
        let result = parse_srt("WEBVTT\n\nhello there\n");
        assert!(matches!(result, Err(SubvoiceError::EmptyInput(_))));
    }

    #[test]
    fn test_timestamp_round_trip_sweep() {
        let mut ms = 0u64;
        while ms < 400_000_000 {
            assert_eq!(parse_timestamp_ms(&format_timestamp_ms(ms)).unwrap(), ms);
            ms = ms * 3 + 7;
        }
    }

    #[test]
    fn test_dot_separator_accepted() {
        let cues = parse_srt("1\n00:00:01.250 --> 00:00:02.500\nDot\n").unwrap();
        assert_eq!(cues[0].start_ms, 1250);
        assert_eq!(cues[0].end_ms, 2500);
    }
}

// ============================================================================
// Voice Map Resolution Tests
// ============================================================================

mod voice_map_tests {
    use super::*;

    #[test]
    fn test_overlapping_ranges_document_order() {
        let map = VoiceMap::from_json(
            r#"{
                "default": {"a": 1},
                "segments": {"1-3": {"a": 2}, "2-2": {"a": 3}}
            }"#,
        )
        .unwrap();

        assert_eq!(map.resolve(2).unwrap().extra["a"], 3);
        assert_eq!(map.resolve(1).unwrap().extra["a"], 2);
        assert_eq!(map.resolve(3).unwrap().extra["a"], 2);
        assert_eq!(map.resolve(4).unwrap().extra["a"], 1);
    }

    #[test]
    fn test_resolution_idempotent() {
        let map = VoiceMap::from_json(
            r#"{"default": {"voice_id": "v1"}, "segments": {"1-2": {"speed": 1.1}, "2": {"emo": "Joy"}}}"#,
        )
        .unwrap();
        for index in 1..=3 {
            assert_eq!(map.resolve(index).unwrap(), map.resolve(index).unwrap());
        }
    }

    #[test]
    fn test_uncovered_cue_uses_default() {
        let default = SegmentConfig {
            voice: Some("af_sarah".to_string()),
            ..Default::default()
        };
        let map = VoiceMap::new(default.clone()).with_segment(
            "10-20",
            SegmentConfig {
                voice: Some("am_adam".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(map.resolve(3).unwrap(), default);
    }

    #[test]
    fn test_load_voice_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voices.json");
        std::fs::write(
            &path,
            r#"{"default": {"reference_audio": "ref.wav", "similarity_enh": true}}"#,
        )
        .unwrap();

        let cfg = VoiceMap::load(&path).unwrap().resolve(1).unwrap();
        assert_eq!(cfg.reference_audio.as_deref(), Some(Path::new("ref.wav")));
        assert_eq!(cfg.similarity_enh, Some(true));

        assert!(matches!(
            VoiceMap::load(&dir.path().join("missing.json")),
            Err(SubvoiceError::FileNotFound(_))
        ));
    }
}

// ============================================================================
// Config Tests
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate(BackendKind::Kokoro).is_ok());
        assert!(config.validate(BackendKind::Noiz).is_err());

        config.noiz_api_key = Some("key".to_string());
        assert!(config.validate(BackendKind::Noiz).is_ok());
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(AudioFormat::Wav.extension(), "wav");
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
    }
}

// ============================================================================
// Tempo Chain Tests
// ============================================================================

mod tempo_tests {
    use super::*;

    #[test]
    fn test_ratio_250_decomposes_within_bounds() {
        let stages = tempo_chain(250.0);
        assert!(stages.iter().all(|f| (ATEMPO_MIN..=ATEMPO_MAX).contains(f)));
        let product: f64 = stages.iter().product();
        assert!((product - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_chain_product_for_many_ratios() {
        for ratio in [0.001, 0.03, 0.49, 0.5, 1.0, 37.0, 99.99, 100.0, 100.01, 1e6] {
            let stages = tempo_chain(ratio);
            assert!(stages.iter().all(|f| (ATEMPO_MIN..=ATEMPO_MAX).contains(f)));
            let product: f64 = stages.iter().product();
            assert!((product / ratio - 1.0).abs() < 1e-9, "ratio {ratio}");
        }
    }
}

// ============================================================================
// Audio Processing Tests (require FFmpeg)
// ============================================================================

mod audio_tests {
    use super::*;

    #[tokio::test]
    async fn test_normalization_hits_target() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.wav");
        write_tone(&raw, 1500);

        for strategy in [NormalizeStrategy::PadTrim, NormalizeStrategy::TempoChain] {
            for target in [400u64, 1500, 2700, 6000] {
                let out = dir.path().join(format!("{strategy:?}_{target}.wav"));
                strategy.normalize(&raw, &out, target).await.unwrap();
                assert_duration_ms(probe_duration(&out).await.unwrap(), target);
            }
        }
    }

    #[tokio::test]
    async fn test_tempo_chain_multi_stage_stretch() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.wav");
        write_tone(&raw, 400);

        // ratio 0.2 needs three stages
        let out = dir.path().join("stretched.wav");
        NormalizeStrategy::TempoChain
            .normalize(&raw, &out, 2000)
            .await
            .unwrap();
        assert_duration_ms(probe_duration(&out).await.unwrap(), 2000);
    }

    #[tokio::test]
    async fn test_delay_prepends_silence() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        let delayed = dir.path().join("delayed.wav");
        write_tone(&clip, 1000);

        delay(&clip, &delayed, 2300).await.unwrap();
        assert_duration_ms(probe_duration(&delayed).await.unwrap(), 3300);
    }

    #[tokio::test]
    async fn test_mix_truncates_overrun() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let mut delayed = Vec::new();
        for (i, start) in [0u64, 2000].into_iter().enumerate() {
            let clip = dir.path().join(format!("clip_{i}.wav"));
            let shifted = dir.path().join(format!("shifted_{i}.wav"));
            write_tone(&clip, 3000);
            delay(&clip, &shifted, start).await.unwrap();
            delayed.push(shifted);
        }

        let out = dir.path().join("mix.wav");
        mix(&delayed, &out, 4000).await.unwrap();
        assert_duration_ms(probe_duration(&out).await.unwrap(), 4000);
    }

    #[tokio::test]
    async fn test_normalize_missing_input_fails() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let result = NormalizeStrategy::PadTrim
            .normalize(&dir.path().join("absent.wav"), &dir.path().join("out.wav"), 1000)
            .await;
        assert!(matches!(result, Err(SubvoiceError::Processing(_))));
    }
}
