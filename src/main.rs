use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use subvoice::config::{AudioFormat, BackendKind, Config};
use subvoice::pipeline::{print_summary, render_timeline, RenderRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "subvoice")]
#[command(version, about = "Render timeline-accurate speech from SRT subtitles")]
#[command(long_about = "Synthesize every SRT cue with Kokoro (local) or Noiz (cloud), fit each clip to its exact on-screen duration, and mix them into one audio track.")]
struct Cli {
    /// Input SRT file
    #[arg(long)]
    srt: PathBuf,

    /// Voice-map JSON file with `default` and `segments` sections
    #[arg(long)]
    voice_map: PathBuf,

    /// Output audio file (the extension selects the container)
    #[arg(short, long)]
    output: PathBuf,

    /// TTS backend: kokoro, noiz
    #[arg(short, long)]
    backend: Option<String>,

    /// Noiz API key (defaults to NOIZ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Noiz API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Directory for intermediate clips and the render report
    #[arg(long, default_value = ".tmp/tts")]
    work_dir: PathBuf,

    /// Rewrite cue text with Noiz emotion enhancement before synthesis
    #[arg(long)]
    auto_emotion: bool,

    /// Format requested from the backend: wav, mp3
    #[arg(long, default_value = "wav")]
    output_format: String,

    /// HTTP timeout in seconds for Noiz requests
    #[arg(long)]
    timeout_sec: Option<u64>,

    /// Number of cues processed concurrently
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Path to the kokoro-tts executable
    #[arg(long)]
    kokoro_bin: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    if let Some(key) = cli.api_key {
        config.noiz_api_key = Some(key);
    }
    if let Some(url) = cli.base_url {
        config.noiz_base_url = url;
    }
    if let Some(timeout) = cli.timeout_sec {
        config.timeout_secs = timeout;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(bin) = cli.kokoro_bin {
        config.kokoro_bin = bin;
    }

    let backend: BackendKind = match cli.backend {
        Some(b) => b.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.default_backend,
    };

    let format: AudioFormat = cli
        .output_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    config
        .validate(backend)
        .context("Configuration validation failed")?;

    info!("SRT:       {}", cli.srt.display());
    info!("Voice map: {}", cli.voice_map.display());
    info!("Output:    {}", cli.output.display());
    info!("Backend:   {}", backend);

    let request = RenderRequest {
        backend,
        format,
        work_dir: cli.work_dir,
        concurrency: config.concurrency,
        auto_emotion: cli.auto_emotion,
        show_progress: !cli.no_progress,
        ..RenderRequest::new(cli.srt, cli.voice_map, cli.output)
    };

    let result = render_timeline(&request, &config).await?;
    print_summary(&result);

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
