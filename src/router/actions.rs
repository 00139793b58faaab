//! External actions and the payloads exchanged with the dialogue backend

use serde::{Deserialize, Serialize};

use crate::events::ConversationContext;

/// Message forwarded to the dialogue backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentPayload {
    /// Resolved utterance
    pub text: String,

    /// The utterance was spoken rather than typed
    pub with_voice: bool,

    /// Action carried over from the previous turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Resource carried over from the previous turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl IntentPayload {
    pub fn command(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            with_voice: true,
            action: None,
            resource_id: None,
        }
    }

    pub fn continuation(text: impl Into<String>, context: &ConversationContext) -> Self {
        let non_blank = |s: &str| Some(s.to_string()).filter(|s| !s.trim().is_empty());
        Self {
            text: text.into(),
            with_voice: true,
            action: non_blank(&context.action),
            resource_id: non_blank(&context.resource_id),
        }
    }
}

/// Reply pushed by the dialogue backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendReply {
    #[serde(default)]
    pub text: Option<String>,

    /// Pre-recorded audio to play instead of synthesizing `text`
    #[serde(default)]
    pub soundbite_url: Option<String>,

    /// The reply should be spoken aloud
    #[serde(default)]
    pub with_voice: bool,

    /// Follow-up expected after the reply has been spoken
    #[serde(default)]
    pub context: Option<ConversationContext>,
}

/// Action handed to an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalAction {
    /// Play the short attention sound
    PlayAttentionCue,

    /// Synthesize and speak `text`. `context` is echoed back on completion.
    Speak {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ConversationContext>,
    },

    /// Play a pre-recorded clip
    PlaySoundbite {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ConversationContext>,
    },

    /// Forward an intent to the dialogue backend
    SendIntent(IntentPayload),

    /// Nothing to deliver
    None,
}

impl ExternalAction {
    /// Actions that produce audio and suspend capture until completion
    pub fn is_playback(&self) -> bool {
        matches!(
            self,
            ExternalAction::PlayAttentionCue
                | ExternalAction::Speak { .. }
                | ExternalAction::PlaySoundbite { .. }
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ExternalAction::None)
    }
}
