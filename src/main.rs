use std::sync::Arc;

use anyhow::{Context, Result};
use audioscribe::audio::{check_ffmpeg, check_ffprobe, FfmpegTranscoder, FfprobeProber};
use audioscribe::config::Config;
use audioscribe::pipeline::TranscriptionPipeline;
use audioscribe::server::{create_router, AppState};
use audioscribe::store::MemoryStore;
use audioscribe::transcribe::WhisperClient;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "audioscribe")]
#[command(version, about = "Audio transcription service")]
#[command(
    long_about = "HTTP service that transcribes uploaded audio via the OpenAI Whisper API, \
                  splitting long recordings into segments transparently."
)]
struct Cli {
    /// Address to listen on (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "audioscribe=debug,tower_http=debug"
    } else {
        "audioscribe=info,tower_http=info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    config.validate().context("invalid configuration")?;

    check_ffmpeg().context("ffmpeg is required for audio conversion")?;
    check_ffprobe().context("ffprobe is required for duration probing")?;

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("failed to create temp dir {}", config.temp_dir.display()))?;

    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY not set")?;

    let transcriber = Arc::new(WhisperClient::new(api_key, config.language.clone()));
    let pipeline = Arc::new(TranscriptionPipeline::new(
        Arc::new(FfprobeProber),
        Arc::new(FfmpegTranscoder),
        transcriber,
        config.limits.clone(),
        config.temp_dir.clone(),
    ));

    let state = AppState {
        pipeline,
        store: Arc::new(MemoryStore::new()),
        config: Arc::new(config.clone()),
    };

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    info!("listening on {}", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
