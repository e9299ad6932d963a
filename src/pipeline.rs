use crate::audio::{check_ffmpeg, check_ffprobe, convert, delay, mix};
use crate::config::{AudioFormat, BackendKind, Config};
use crate::error::{Result, SubvoiceError};
use crate::report::{RenderReport, SegmentReport};
use crate::subtitle::{parse_srt_file, timeline_span_ms, Cue};
use crate::tts::{create_synthesizer, KokoroCli, Synthesizer};
use crate::voice_map::VoiceMap;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One timeline render: inputs, output, and how to get there.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Input SRT file.
    pub srt: PathBuf,
    /// Voice-map JSON file.
    pub voice_map: PathBuf,
    /// Final audio file; its extension selects the container.
    pub output: PathBuf,
    /// Synthesis backend.
    pub backend: BackendKind,
    /// Format requested from the backend for raw clips.
    pub format: AudioFormat,
    /// Scratch directory for intermediate clips and the report.
    pub work_dir: PathBuf,
    /// Maximum number of cues processed at once.
    pub concurrency: usize,
    /// Rewrite cue text through the backend's emotion enhancement first.
    pub auto_emotion: bool,
    /// Show a progress bar.
    pub show_progress: bool,
}

impl RenderRequest {
    pub fn new(srt: PathBuf, voice_map: PathBuf, output: PathBuf) -> Self {
        Self {
            srt,
            voice_map,
            output,
            backend: BackendKind::default(),
            format: AudioFormat::default(),
            work_dir: PathBuf::from(".tmp/tts"),
            concurrency: 4,
            auto_emotion: false,
            show_progress: true,
        }
    }
}

/// Statistics from a timeline render.
#[derive(Debug, Clone)]
pub struct RenderStats {
    /// Total time taken for the entire render.
    pub total_time: Duration,
    /// Time spent synthesizing, normalizing and delaying cues.
    pub synthesis_time: Duration,
    /// Time spent mixing and converting the final track.
    pub mix_time: Duration,
    /// Number of cues rendered.
    pub cues: usize,
    /// Length of the rendered timeline.
    pub timeline_duration: Duration,
    /// Backend used for synthesis.
    pub backend: String,
}

/// Result of a timeline render.
#[derive(Debug)]
pub struct RenderResult {
    pub output_path: PathBuf,
    pub report_path: PathBuf,
    pub report: RenderReport,
    pub stats: RenderStats,
}

/// A cue that has been synthesized, normalized and delayed.
struct CueOutcome {
    position: usize,
    delayed: PathBuf,
    report: SegmentReport,
}

/// Render an SRT file into one timeline-aligned speech track.
///
/// Every cue is synthesized, forced to its exact on-screen duration, shifted
/// to its start offset and mixed into a track as long as the latest cue end.
/// The first failing cue aborts the whole render.
pub async fn render_timeline(request: &RenderRequest, config: &Config) -> Result<RenderResult> {
    check_ffmpeg()?;
    check_ffprobe()?;
    if request.backend == BackendKind::Kokoro {
        KokoroCli::new(config.kokoro_bin.clone()).check()?;
    }

    let cues = parse_srt_file(&request.srt)?;
    let voice_map = VoiceMap::load(&request.voice_map)?;
    let synthesizer = create_synthesizer(request.backend, config)?;

    render_cues(&cues, &voice_map, synthesizer.as_ref(), request).await
}

/// Render already-parsed cues with the given synthesizer.
pub async fn render_cues(
    cues: &[Cue],
    voice_map: &VoiceMap,
    synthesizer: &dyn Synthesizer,
    request: &RenderRequest,
) -> Result<RenderResult> {
    if cues.is_empty() {
        return Err(SubvoiceError::EmptyInput("No cues to render".to_string()));
    }
    if request.concurrency == 0 {
        return Err(SubvoiceError::Config(
            "Concurrency must be greater than 0".to_string(),
        ));
    }

    let start_time = Instant::now();
    fs::create_dir_all(&request.work_dir).await?;

    let auto_emotion = request.auto_emotion && synthesizer.kind() == BackendKind::Noiz;
    if request.auto_emotion && !auto_emotion {
        warn!("Emotion enhancement is only available with the noiz backend; ignoring");
    }

    info!(
        "Rendering {} cues with {} (concurrency: {})",
        cues.len(),
        synthesizer.name(),
        request.concurrency
    );

    let progress_bar = if request.show_progress {
        let pb = ProgressBar::new(cues.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let semaphore = Semaphore::new(request.concurrency);
    let mut futures = FuturesUnordered::new();

    for (position, cue) in cues.iter().enumerate() {
        let sem = &semaphore;
        let pb = &progress_bar;

        futures.push(async move {
            let _permit = sem
                .acquire()
                .await
                .map_err(|e| SubvoiceError::Processing(format!("Worker pool closed: {e}")))?;

            let outcome = process_cue(position, cue, voice_map, synthesizer, request, auto_emotion)
                .await
                .map_err(|e| e.for_cue(cue.index))?;

            pb.inc(1);
            Ok::<_, SubvoiceError>(outcome)
        });
    }

    // Barrier: every cue must be delayed before anything is mixed. Returning
    // early drops the remaining futures, which kills their child processes.
    let mut outcomes: Vec<CueOutcome> = Vec::with_capacity(cues.len());
    while let Some(result) = futures.next().await {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                progress_bar.abandon_with_message("Render failed");
                return Err(e);
            }
        }
    }
    drop(futures);
    progress_bar.finish_with_message("Cues rendered");

    outcomes.sort_by_key(|o| o.position);
    let synthesis_time = start_time.elapsed();

    let mix_start = Instant::now();
    let total_ms = timeline_span_ms(cues);
    let delayed: Vec<PathBuf> = outcomes.iter().map(|o| o.delayed.clone()).collect();
    let timeline_path = request.work_dir.join("timeline.wav");

    info!("Mixing {} segments into {}ms timeline", delayed.len(), total_ms);
    mix(&delayed, &timeline_path, total_ms).await?;

    write_output(&timeline_path, &request.output).await?;
    let mix_time = mix_start.elapsed();

    let report = RenderReport {
        srt: request.srt.clone(),
        output: request.output.clone(),
        backend: synthesizer.kind(),
        total_ms,
        segments: outcomes.into_iter().map(|o| o.report).collect(),
    };
    let report_path = report.write_to(&request.work_dir).await?;

    info!("Timeline written to {:?}", request.output);

    Ok(RenderResult {
        output_path: request.output.clone(),
        report_path,
        stats: RenderStats {
            total_time: start_time.elapsed(),
            synthesis_time,
            mix_time,
            cues: report.segments.len(),
            timeline_duration: Duration::from_millis(total_ms),
            backend: synthesizer.kind().to_string(),
        },
        report,
    })
}

/// Take one cue from its resolved configuration through to a delayed clip.
async fn process_cue(
    position: usize,
    cue: &Cue,
    voice_map: &VoiceMap,
    synthesizer: &dyn Synthesizer,
    request: &RenderRequest,
    auto_emotion: bool,
) -> Result<CueOutcome> {
    let config = voice_map.resolve(cue.index)?;
    synthesizer.validate(&config)?;
    debug!("Cue {}: configuration resolved", cue.index);

    let synth_cue = if auto_emotion {
        synthesizer.enhance_emotion(cue).await?
    } else {
        cue.clone()
    };

    let stem = format!("seg_{:04}", position + 1);
    let raw = request
        .work_dir
        .join(format!("{stem}_raw.{}", request.format.extension()));
    let norm = request.work_dir.join(format!("{stem}_norm.wav"));
    let delayed = request.work_dir.join(format!("{stem}_delay.wav"));

    let synthesis = synthesizer
        .synthesize(&synth_cue, &config, request.format, &raw)
        .await?;
    debug!("Cue {}: synthesized {:?}", cue.index, synthesis.path);

    let normalizer = synthesizer.normalizer();
    normalizer
        .normalize(&synthesis.path, &norm, cue.duration_ms())
        .await?;
    debug!("Cue {}: normalized to {}ms", cue.index, cue.duration_ms());

    delay(&norm, &delayed, cue.start_ms).await?;
    debug!("Cue {}: delayed by {}ms", cue.index, cue.start_ms);

    let mut report = SegmentReport::new(
        cue,
        synthesizer.kind(),
        normalizer,
        synthesis.reported_duration,
        config,
    );
    if synth_cue.text != cue.text {
        report.synthesized_text = Some(synth_cue.text);
    }

    Ok(CueOutcome {
        position,
        delayed,
        report,
    })
}

/// Place the mixed track at `output`, converting when it is not a WAV path.
async fn write_output(timeline: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    if same_file(timeline, output).await {
        debug!("Output {} is the mixed timeline itself", output.display());
        return Ok(());
    }

    let is_wav = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if is_wav {
        fs::copy(timeline, output).await?;
    } else {
        info!("Converting timeline to {}", output.display());
        convert(timeline, output).await?;
    }
    Ok(())
}

/// True when both paths exist and resolve to the same file.
async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Print a summary of the render results.
pub fn print_summary(result: &RenderResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Timeline Render Complete                  ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", result.output_path.display());
    println!("  Report:     {}", result.report_path.display());
    println!("  Cues:       {}", result.stats.cues);
    println!("  Backend:    {}", result.stats.backend);
    println!(
        "  Duration:   {:.3}s timeline",
        result.stats.timeline_duration.as_secs_f64()
    );
    println!();
    println!("  Timing:");
    println!(
        "    Synthesize:  {:.2}s",
        result.stats.synthesis_time.as_secs_f64()
    );
    println!("    Mix:         {:.2}s", result.stats.mix_time.as_secs_f64());
    println!(
        "    Total:       {:.2}s",
        result.stats.total_time.as_secs_f64()
    );
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_request_defaults() {
        let request = RenderRequest::new("in.srt".into(), "voices.json".into(), "out.wav".into());
        assert_eq!(request.backend, BackendKind::Kokoro);
        assert_eq!(request.format, AudioFormat::Wav);
        assert_eq!(request.work_dir, PathBuf::from(".tmp/tts"));
        assert_eq!(request.concurrency, 4);
        assert!(!request.auto_emotion);
        assert!(request.show_progress);
    }

    #[tokio::test]
    async fn test_write_output_onto_timeline_keeps_audio() {
        let dir = tempfile::tempdir().unwrap();
        let timeline = dir.path().join("timeline.wav");
        std::fs::write(&timeline, b"RIFF-mixed-audio").unwrap();

        let aliased = dir.path().join(".").join("timeline.wav");
        write_output(&timeline, &aliased).await.unwrap();
        assert_eq!(std::fs::read(&timeline).unwrap(), b"RIFF-mixed-audio");

        let copy = dir.path().join("out").join("final.WAV");
        write_output(&timeline, &copy).await.unwrap();
        assert_eq!(std::fs::read(&copy).unwrap(), b"RIFF-mixed-audio");
    }

    #[tokio::test]
    async fn test_render_cues_rejects_empty() {
        let request = RenderRequest::new("in.srt".into(), "v.json".into(), "out.wav".into());
        let synth = KokoroCli::new(PathBuf::from("kokoro-tts"));
        let result = render_cues(&[], &VoiceMap::default(), &synth, &request).await;
        assert!(matches!(result, Err(SubvoiceError::EmptyInput(_))));
    }

    #[tokio::test]
    async fn test_render_cues_rejects_zero_concurrency() {
        let mut request = RenderRequest::new("in.srt".into(), "v.json".into(), "out.wav".into());
        request.concurrency = 0;
        let synth = KokoroCli::new(PathBuf::from("kokoro-tts"));
        let cues = vec![Cue::new(1, 0, 1000, "Hello")];
        let result = render_cues(&cues, &VoiceMap::default(), &synth, &request).await;
        assert!(matches!(result, Err(SubvoiceError::Config(_))));
    }
}
