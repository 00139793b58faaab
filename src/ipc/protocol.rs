//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.
//! External collaborators (recognizer bridge, playback bridge, dialogue
//! backend bridge) talk to the daemon exclusively through these messages.

use serde::{Deserialize, Serialize};

use crate::audio::{CaptureState, StreamErrorKind};
use crate::events::{ConversationContext, TranscriptEvent};
use crate::pipeline::PipelineInput;
use crate::router::{BackendReply, ExternalAction};
use crate::state::ListeningMode;

/// Current listening mode as reported over IPC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Waiting for the wake phrase
    #[default]
    AwaitingWake,
    /// Waiting for the command following the wake phrase
    CapturingCommand,
    /// Waiting for a follow-up answer
    ContinuingConversation,
}

/// One ranked recognition hypothesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Requests from collaborators to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to pushed notifications
    Subscribe,

    /// Captured 16-bit PCM samples
    Audio { pcm: Vec<u8> },

    /// Recognition result, alternatives ordered best first
    Transcript {
        alternatives: Vec<Alternative>,
        #[serde(default)]
        is_final: bool,
    },

    /// The recognition stream failed
    StreamError {
        message: String,
        /// Explicit classification; derived from `message` when absent
        #[serde(default)]
        kind: Option<StreamErrorKind>,
    },

    /// Playback of the last spoken action finished
    PlaybackComplete {
        #[serde(default)]
        context: Option<ConversationContext>,
    },

    /// Reply from the dialogue backend
    BackendReply(BackendReply),
}

/// Responses from daemon to collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Input queued for the voice pipeline
    Accepted,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An action for an external collaborator
    Action { action: ExternalAction },

    /// Audio slice ready for the recognizer
    AudioChunk { pcm: Vec<u8> },

    /// Listening mode has changed
    ModeChanged { mode: Mode, previous: Mode },

    /// The capture stream was restarted; the recognizer should reopen it
    CaptureRestarted,

    /// Capture is stopped until a restart fires after `delay_ms`
    CaptureRestartScheduled { delay_ms: u64 },

    /// Capture is disabled until the daemon is reconfigured
    CaptureHalted,

    /// The in-flight playback completed
    PlaybackFinished,
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current listening mode
    pub mode: Mode,

    /// Capture stream state
    pub capture: CaptureState,

    /// A playback is in flight and capture is suspended
    pub playback_active: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: Mode::default(),
            capture: CaptureState::default(),
            playback_active: false,
            uptime_secs: 0,
        }
    }
}

/// A request that could not be turned into pipeline input
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("transcript has no alternatives")]
    NoAlternatives,

    #[error("{0} is not a pipeline input")]
    NotPipelineInput(&'static str),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::NoAlternatives => "no_alternatives",
            ProtocolError::NotPipelineInput(_) => "invalid_request",
        }
    }
}

/// Convert internal ListeningMode to IPC Mode
impl From<&ListeningMode> for Mode {
    fn from(mode: &ListeningMode) -> Self {
        match mode {
            ListeningMode::AwaitingWake => Mode::AwaitingWake,
            ListeningMode::CapturingCommand { .. } => Mode::CapturingCommand,
            ListeningMode::ContinuingConversation(_) => Mode::ContinuingConversation,
        }
    }
}

impl TryFrom<Request> for PipelineInput {
    type Error = ProtocolError;

    fn try_from(request: Request) -> Result<Self, Self::Error> {
        match request {
            Request::Audio { pcm } => Ok(PipelineInput::Audio(pcm)),
            Request::Transcript {
                mut alternatives,
                is_final,
            } => {
                if alternatives.is_empty() {
                    return Err(ProtocolError::NoAlternatives);
                }
                // Highest-ranked hypothesis with any text; a blank final still
                // has to reach the state machine.
                let rank = alternatives
                    .iter()
                    .position(|a| !a.transcript.trim().is_empty())
                    .unwrap_or(0);
                let best = alternatives.swap_remove(rank);
                Ok(PipelineInput::Transcript(TranscriptEvent {
                    text: best.transcript,
                    is_final,
                    alternative_rank: rank as u32,
                }))
            }
            Request::StreamError { message, kind } => Ok(PipelineInput::StreamError(
                kind.unwrap_or_else(|| StreamErrorKind::classify(&message)),
            )),
            Request::PlaybackComplete { context } => {
                Ok(PipelineInput::PlaybackComplete(context.filter(|c| !c.is_empty())))
            }
            Request::BackendReply(reply) => Ok(PipelineInput::BackendReply(reply)),
            Request::GetStatus => Err(ProtocolError::NotPipelineInput("get_status")),
            Request::Ping => Err(ProtocolError::NotPipelineInput("ping")),
            Request::Subscribe => Err(ProtocolError::NotPipelineInput("subscribe")),
        }
    }
}
