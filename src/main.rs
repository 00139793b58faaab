//! voice-agent-daemon: Background daemon for a wake-phrase voice assistant
//!
//! This daemon runs as a user service and provides:
//! - Chunking of captured audio for a streaming recognizer
//! - An explicit state machine for wake phrase, command and follow-up turns
//! - Routing of resolved turns to the dialogue backend or to speech playback
//! - IPC server through which the recognizer, playback and backend bridges
//!   exchange messages with the daemon
//!
//! Scope:
//! - NO microphone access, speech synthesis or network authentication; those
//!   live in the collaborators on the other side of the socket

mod audio;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod pattern;
mod pipeline;
mod router;
mod state;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::ipc::{Notification, Server};
use crate::lifecycle::ShutdownSignal;
use crate::pipeline::VoicePipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voice-agent-daemon starting"
    );

    // Load configuration; pattern errors are fatal
    let config = Config::load().context("failed to load configuration")?;
    info!(?config.socket_path, bot_name = %config.bot_name, "configuration loaded");

    let compiled = config
        .compile()
        .context("invalid wake phrase or custom prompt configuration")?;

    // Register signal handlers before anything can block
    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Create channels for inter-component communication
    // IPC server -> voice pipeline
    let (input_tx, input_rx) = mpsc::channel(256);
    // Voice pipeline -> IPC subscribers (and status tracking)
    let (notify_tx, _notify_rx) = broadcast::channel::<Notification>(256);

    let mut pipeline = VoicePipeline::new(
        compiled,
        config.sample_rate,
        input_tx.clone(),
        notify_tx.clone(),
    );

    let server = Server::new(&config.socket_path, input_tx, notify_tx.clone())?;

    // Subscribe to notifications for status tracking
    let mut status_rx = notify_tx.subscribe();
    let server_for_status = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the voice pipeline (processes collaborator input)
        _ = pipeline.run(input_rx) => {
            info!("voice pipeline exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the status snapshot in sync with pipeline output
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(notification) => server_for_status.observe(&notification).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("status tracker exited");
        }

        // Wait for shutdown signal
        reason = shutdown.wait() => {
            info!(%reason, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("voice-agent-daemon stopped");

    Ok(())
}
