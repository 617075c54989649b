//! Parley agent binary: loads the knowledge corpus, wires up the pipeline,
//! and runs the call loop until the caller says goodbye or Ctrl-C is pressed.

use parley_agent::{create_chat, AgentConfig, VoiceSession};
use parley_retrieval::{load_corpus, RetrievalIndex};
use parley_voice::{
    create_transcriber, HttpSynthesizer, PlaceholderSynthesizer, SpeechSink, SynthesisBackend,
    TurnSegmenter, VoiceSpeaker,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("note: no .env file loaded ({})", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env();
    print_banner(&config);

    info!(dir = %config.data_dir.display(), "loading knowledge corpus");
    let chunks = load_corpus(&config.data_dir, config.chunk_size)?;
    let index = RetrievalIndex::build(chunks)?;
    info!(chunks = index.len(), "retrieval index ready");

    // Ctrl-C flips the stop flag; the segmenter observes it between frames
    // so the session ends at the next utterance boundary.
    let stop = Arc::new(AtomicBool::new(false));
    spawn_ctrl_c_watcher(stop.clone());

    let source = TurnSegmenter::new(config.audio.clone(), config.segmenter.clone(), stop);
    let transcriber = create_transcriber()?;
    let chat = create_chat();
    let sink = create_speaker()?;

    let mut session = VoiceSession::new(
        config,
        Box::new(source),
        transcriber,
        chat,
        sink,
        index,
    );
    session.run()?;

    info!("session ended");
    Ok(())
}

/// Live speaker when a TTS key is configured, silent placeholder otherwise.
fn create_speaker() -> Result<Box<dyn SpeechSink>, Box<dyn std::error::Error>> {
    let backend: Box<dyn SynthesisBackend> = match HttpSynthesizer::from_env() {
        Ok(http) => Box::new(http),
        Err(e) => {
            warn!(error = %e, "no TTS service configured, replies will not be spoken");
            Box::new(PlaceholderSynthesizer)
        }
    };
    Ok(Box::new(VoiceSpeaker::new(backend)?))
}

/// Watch for Ctrl-C on a dedicated thread with its own small runtime, so the
/// synchronous call loop stays free of async plumbing.
fn spawn_ctrl_c_watcher(stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!(error = %e, "could not start signal watcher");
                return;
            }
        };
        if rt.block_on(tokio::signal::ctrl_c()).is_ok() {
            info!("ctrl-c received, finishing current turn");
            stop.store(true, Ordering::Relaxed);
        }
    });
}

fn print_banner(config: &AgentConfig) {
    info!("parley voice agent starting");
    info!(
        sample_rate = config.audio.sample_rate,
        frame_size = config.audio.frame_size,
        silence_threshold = config.segmenter.silence_threshold,
        silence_secs = config.segmenter.silence_secs,
        max_record_secs = config.segmenter.max_record_secs,
        "audio settings"
    );
    info!(
        chunk_size = config.chunk_size,
        top_k = config.top_k,
        "retrieval settings"
    );
}
