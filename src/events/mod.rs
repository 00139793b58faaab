//! Events flowing through the voice pipeline
//!
//! Transcript events enter the dialogue state machine, outbound events leave it
//! and are handed to the response router.

use serde::{Deserialize, Serialize};

/// A single (possibly partial) transcript produced by the recognizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Best transcript text for this event
    pub text: String,

    /// The recognizer will not revise this transcript any further
    pub is_final: bool,

    /// Rank of the alternative the text was taken from (0 = best). The IPC
    /// boundary keeps only this one hypothesis.
    #[serde(default)]
    pub alternative_rank: u32,
}

impl TranscriptEvent {
    /// A partial (revisable) transcript
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            alternative_rank: 0,
        }
    }

    /// A final transcript
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            alternative_rank: 0,
        }
    }
}

/// Context carried from a spoken response into the next user turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Backend action awaiting a follow-up (e.g. "book_ride")
    #[serde(default)]
    pub action: String,

    /// Resource the action refers to
    #[serde(default)]
    pub resource_id: String,
}

impl ConversationContext {
    pub fn new(action: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_id: resource_id.into(),
        }
    }

    /// A context with neither an action nor a resource carries nothing
    pub fn is_empty(&self) -> bool {
        self.action.trim().is_empty() && self.resource_id.trim().is_empty()
    }
}

/// Result of one transcript turn, emitted by the dialogue state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Wake phrase heard without a command; a command is expected next
    WakeDetected,

    /// A complete command is ready for the dialogue backend
    CommandCaptured { text: String },

    /// Follow-up turn answering a previous spoken response
    ConversationContinued {
        text: String,
        context: ConversationContext,
    },

    /// A custom prompt matched and produced a canned reply
    PromptMatched { response: String },

    /// Nothing to do for this event
    Noop,
}

impl OutboundEvent {
    pub fn is_noop(&self) -> bool {
        matches!(self, OutboundEvent::Noop)
    }
}

impl std::fmt::Display for OutboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundEvent::WakeDetected => write!(f, "WAKE_DETECTED"),
            OutboundEvent::CommandCaptured { text } => write!(f, "COMMAND_CAPTURED ({text:?})"),
            OutboundEvent::ConversationContinued { text, context } => {
                write!(
                    f,
                    "CONVERSATION_CONTINUED ({text:?}, action={}, resource={})",
                    context.action, context.resource_id
                )
            }
            OutboundEvent::PromptMatched { response } => {
                write!(f, "PROMPT_MATCHED ({response:?})")
            }
            OutboundEvent::Noop => write!(f, "NOOP"),
        }
    }
}
