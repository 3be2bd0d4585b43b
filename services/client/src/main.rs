//! Main Entrypoint for the Parley Terminal Client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and CLI flags.
//! 2. Initializing logging.
//! 3. Optionally spawning the backend process.
//! 4. Starting the synchronization engine.
//! 5. Bridging stdin and engine updates to the terminal until shutdown.

mod backend;
mod config;
mod speech;

use anyhow::Context;
use clap::Parser;
use config::Config;
use parley_core::{Command, Engine, Role, SnapshotPoller, SpeechSynthesizer, Update};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Terminal client for a voice assistant backend")]
struct Args {
    /// Base URL of the backend HTTP surface.
    #[arg(long)]
    http_url: Option<String>,
    /// WebSocket URL for live transcription. An empty string disables it.
    #[arg(long)]
    ws_url: Option<String>,
    /// Conversation poll interval in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let args = Args::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = args.http_url {
        config.http_base_url = url;
    }
    if let Some(url) = args.ws_url {
        config.stream_url = if url.is_empty() { None } else { Some(url) };
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval = std::time::Duration::from_millis(ms.max(1));
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Starting client...");

    // --- 3. Optionally Spawn the Backend ---
    let backend = match &config.backend_command {
        Some(command) => Some(backend::BackendProcess::spawn(command)?),
        None => None,
    };

    // --- 4. Start the Engine ---
    let voice: Arc<dyn SpeechSynthesizer> = match &config.speech_command {
        Some(program) => Arc::new(speech::ProcessSpeaker::new(program.clone())),
        None => Arc::new(speech::MutedSpeaker),
    };
    let poller = SnapshotPoller::new(config.http_base_url.clone());
    let (engine, commands, mut updates) = Engine::new(
        poller,
        voice,
        config.stream_url.clone(),
        config.poll_interval,
    );
    let engine_task = tokio::spawn(engine.run());

    info!(
        http_url = %config.http_base_url,
        streaming = config.stream_url.is_some(),
        poll_interval = ?config.poll_interval,
        "Client configured."
    );
    println!("Type a message and press enter. /stop interrupts playback, /quit exits.");

    // --- 5. Bridge the Terminal ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Shutting down gracefully...");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let command = match line {
                        "/quit" => break,
                        "/stop" => Command::StopSpeaking,
                        text => Command::SendMessage(text.to_string()),
                    };
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            },
            update = updates.recv() => match update {
                Some(Update::Conversation(messages)) => {
                    if messages.len() < printed {
                        printed = messages.len();
                    }
                    for message in &messages[printed..] {
                        match message.role {
                            Role::User => println!("you:   {}", message.text),
                            Role::Agent => println!("agent: {}", message.text),
                        }
                    }
                    printed = messages.len();
                }
                Some(Update::LiveTranscript(transcript)) if transcript.is_transcribing => {
                    println!("[mic]  {}", transcript.text);
                }
                Some(Update::LiveTranscript(_)) => {}
                Some(Update::StreamClosed) => {
                    warn!("Live transcription stream closed; no reconnect is attempted.");
                }
                None => break,
            },
        }
    }

    // --- 6. Shut Down ---
    let _ = commands.send(Command::Shutdown).await;
    let _ = engine_task.await;
    if let Some(backend) = backend {
        backend.shutdown().await;
    }
    info!("Client shut down.");
    Ok(())
}
