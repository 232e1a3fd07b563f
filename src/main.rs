use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use speech_pipeline::{
    AudioOutput, AudioStore, AuthGate, DualTransportClient, MemoryStore, PipelineConfig,
    PlaybackQueue, SessionRegistry, SpeakOptions, SpeechPipeline, StaticAuthGate, chunk_text,
};

/// Chunked text-to-speech with streaming synthesis and ordered playback
#[derive(Parser, Debug)]
#[command(name = "speech-pipeline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize and play one or more texts, in order
    Speak {
        /// Ignore cached audio (fresh audio is still cached)
        #[arg(long = "bypass-cache")]
        bypass_cache: bool,

        /// Write the combined WAV of the last multi-segment text to this path
        #[arg(short = 's', long = "save", value_name = "FILE")]
        save: Option<PathBuf>,

        /// User the requests are attributed to
        #[arg(short = 'u', long = "user", default_value = "local")]
        user: String,

        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Print the segments a text would be synthesized as
    Chunk { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        PipelineConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        PipelineConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command {
        Commands::Chunk { text } => {
            for segment in chunk_text(&text, &config.chunker_config()) {
                println!("{:>3}  {}", segment.index, segment.source_text);
            }
            Ok(())
        }
        Commands::Speak {
            bypass_cache,
            save,
            user,
            texts,
        } => speak(&config, user, texts, SpeakOptions { bypass_cache }, save).await,
    }
}

async fn speak(
    config: &PipelineConfig,
    user: String,
    texts: Vec<String>,
    options: SpeakOptions,
    save: Option<PathBuf>,
) -> anyhow::Result<()> {
    let registry = SessionRegistry::new();
    let client = DualTransportClient::new(config.synthesis_config(), registry.clone())
        .map_err(|e| anyhow!(e.to_string()))?;

    let playback = PlaybackQueue::spawn(open_output()?);
    let store = Arc::new(MemoryStore::new(config.store_config()));
    let auth = Arc::new(StaticAuthGate::for_user(user));

    let pipeline = Arc::new(
        SpeechPipeline::new(Arc::new(client), playback.clone(), store.clone(), auth.clone())
            .with_chunker_config(config.chunker_config())
            .with_registry(registry),
    );

    let session_key = auth.authenticate().await?.session_key;

    // First Ctrl-C cancels whatever is in flight, the next one exits
    let cancel_pipeline = Arc::clone(&pipeline);
    let cancel_key = session_key.clone();
    tokio::spawn(async move {
        let mut interrupted = false;
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupted {
                warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            warn!("Interrupted, cancelling synthesis (press Ctrl-C again to exit)");
            cancel_pipeline.cancel(&cancel_key);
            interrupted = true;
        }
    });

    let mut last_combined = None;
    for text in texts {
        let outcome = pipeline.speak(&text, options).await?;
        info!(
            segments = outcome.segment_count,
            source = ?outcome.source,
            "Request accepted"
        );

        if let Some(combination) = outcome.combination {
            match combination.await {
                Ok(Ok(asset)) => last_combined = Some(asset),
                Ok(Err(e)) => warn!("Combination failed: {}", e),
                Err(e) => warn!("Combination task failed: {}", e),
            }
        }

        playback.wait_idle().await;
    }

    if let (Some(path), Some(asset)) = (save, last_combined) {
        tokio::fs::write(&path, &asset.encoded_bytes)
            .await
            .map_err(|e| anyhow!("Failed to write to {}: {}", path.display(), e))?;
        println!(
            "Combined audio ({:.1}s) written to {}",
            asset.duration_secs(),
            path.display()
        );
    }

    for (position, entry) in store.history(&session_key).await.iter().enumerate() {
        println!("{:>3}  {}", position + 1, entry);
    }

    Ok(())
}

#[cfg(feature = "playback")]
fn open_output() -> anyhow::Result<Box<dyn AudioOutput>> {
    let output = speech_pipeline::DeviceOutput::open().map_err(|e| anyhow!(e.to_string()))?;
    Ok(Box::new(output))
}

#[cfg(not(feature = "playback"))]
fn open_output() -> anyhow::Result<Box<dyn AudioOutput>> {
    warn!("Built without the `playback` feature, audio is discarded");
    Ok(Box::new(speech_pipeline::NullOutput))
}
