//! Unix domain socket server for IPC
//!
//! Provides request-response communication for collaborators and push
//! notifications of pipeline output to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::audio::CaptureState;
use crate::pipeline::PipelineInput;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Queue into the voice pipeline
    input_tx: mpsc::Sender<PipelineInput>,
    /// Source of notifications pushed to subscribed clients
    notify_tx: broadcast::Sender<Notification>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

/// Per-connection context shared by the request loop and the push task
#[derive(Clone)]
struct Connection {
    state: Arc<RwLock<ServerState>>,
    input_tx: mpsc::Sender<PipelineInput>,
    notify_tx: broadcast::Sender<Notification>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        input_tx: mpsc::Sender<PipelineInput>,
        notify_tx: broadcast::Sender<Notification>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            input_tx,
            notify_tx,
        })
    }

    /// Fold a pipeline notification into the status snapshot
    pub async fn observe(&self, notification: &Notification) {
        let mut server_state = self.state.write().await;
        let status = &mut server_state.status;
        match notification {
            Notification::ModeChanged { mode, previous } => {
                info!(from = ?previous, to = ?mode, "IPC server: mode updated");
                status.mode = *mode;
            }
            Notification::Action { action } if action.is_playback() => {
                status.playback_active = true;
            }
            Notification::PlaybackFinished => status.playback_active = false,
            Notification::CaptureRestarted => {
                status.capture = CaptureState::Running;
            }
            Notification::CaptureRestartScheduled { .. } => {
                status.capture = CaptureState::RestartPending;
            }
            Notification::CaptureHalted => {
                status.capture = CaptureState::Halted;
            }
            Notification::Action { .. } | Notification::AudioChunk { .. } => {}
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let (reader, writer) = stream.into_split();
                    let conn = Connection {
                        state: Arc::clone(&self.state),
                        input_tx: self.input_tx.clone(),
                        notify_tx: self.notify_tx.clone(),
                        writer: Arc::new(Mutex::new(writer)),
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(reader, conn) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(mut reader: tokio::net::unix::OwnedReadHalf, conn: Connection) -> Result<()> {
        let mut len_buf = [0u8; 4];
        let mut push_task: Option<tokio::task::JoinHandle<()>> = None;

        let result: Result<()> = loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                break Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut msg_buf).await {
                break Err(e.into());
            }

            let response = match serde_json::from_slice::<Request>(&msg_buf) {
                Ok(request) => {
                    if !matches!(request, Request::Audio { .. }) {
                        debug!(?request, "received request");
                    }
                    let (response, subscribe) = Self::process_request(request, &conn).await;
                    if subscribe && push_task.is_none() {
                        debug!("client subscribed to notifications");
                        push_task = Some(Self::spawn_push(&conn));
                    }
                    response
                }
                Err(e) => {
                    warn!(%e, "failed to parse request");
                    Response::Error {
                        code: "parse_error".to_string(),
                        message: e.to_string(),
                    }
                }
            };

            // Send response
            if let Err(e) = Self::send_message(&conn.writer, &response).await {
                break Err(e);
            }
        };

        if let Some(task) = push_task {
            task.abort();
        }
        result
    }

    /// Forward pipeline notifications to a subscribed client
    fn spawn_push(conn: &Connection) -> tokio::task::JoinHandle<()> {
        let mut notify_rx = conn.notify_tx.subscribe();
        let writer = Arc::clone(&conn.writer);

        tokio::spawn(async move {
            loop {
                match notify_rx.recv().await {
                    Ok(notification) => {
                        if let Err(e) = Self::send_message(&writer, &notification).await {
                            debug!(?e, "subscriber went away");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(writer: &Mutex<OwnedWriteHalf>, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        let mut writer = writer.lock().await;
        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, conn: &Connection) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = conn.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::Subscribe => (Response::Subscribed, true),

            other => match PipelineInput::try_from(other) {
                Ok(input) => match conn.input_tx.send(input).await {
                    Ok(()) => (Response::Accepted, false),
                    Err(_) => (
                        Response::Error {
                            code: "pipeline_closed".to_string(),
                            message: "voice pipeline is not running".to_string(),
                        },
                        false,
                    ),
                },
                Err(e) => (
                    Response::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    },
                    false,
                ),
            },
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
