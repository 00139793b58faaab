//! Response router
//!
//! Maps each outbound event (and each backend reply) to exactly one external
//! action, and keeps at most one playback in flight.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::events::OutboundEvent;

use super::actions::{BackendReply, ExternalAction, IntentPayload};

/// How the wake phrase is acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttentionStyle {
    /// Short attention sound
    Cue,
    /// One of several pre-written acknowledgements, spoken aloud
    Spoken(Vec<String>),
}

pub struct ResponseRouter {
    attention: AttentionStyle,
    playback_in_flight: bool,
    rng: StdRng,
}

impl ResponseRouter {
    pub fn new(attention: AttentionStyle) -> Self {
        Self::with_rng(attention, StdRng::from_entropy())
    }

    pub fn with_rng(attention: AttentionStyle, rng: StdRng) -> Self {
        Self {
            attention,
            playback_in_flight: false,
            rng,
        }
    }

    /// A playback has been issued and not yet reported complete
    pub fn is_playing(&self) -> bool {
        self.playback_in_flight
    }

    /// Route a state machine outcome
    pub fn route(&mut self, event: &OutboundEvent) -> ExternalAction {
        let action = match event {
            OutboundEvent::WakeDetected => self.acknowledge(),
            OutboundEvent::CommandCaptured { text } => {
                ExternalAction::SendIntent(IntentPayload::command(text.as_str()))
            }
            OutboundEvent::ConversationContinued { text, context } => {
                ExternalAction::SendIntent(IntentPayload::continuation(text.as_str(), context))
            }
            OutboundEvent::PromptMatched { response } => ExternalAction::Speak {
                text: response.clone(),
                context: None,
            },
            OutboundEvent::Noop => ExternalAction::None,
        };
        self.gate(action)
    }

    /// Route a reply from the dialogue backend.
    ///
    /// A soundbite wins over synthesized speech; text is only spoken when the
    /// reply asks for voice.
    pub fn route_reply(&mut self, reply: BackendReply) -> ExternalAction {
        let action = match reply {
            BackendReply {
                soundbite_url: Some(url),
                context,
                ..
            } if !url.trim().is_empty() => ExternalAction::PlaySoundbite { url, context },
            BackendReply {
                text: Some(text),
                with_voice: true,
                context,
                ..
            } if !text.trim().is_empty() => ExternalAction::Speak { text, context },
            _ => {
                debug!("backend reply has nothing to play");
                ExternalAction::None
            }
        };
        self.gate(action)
    }

    /// Playback completed. Returns whether one was actually in flight.
    pub fn playback_finished(&mut self) -> bool {
        std::mem::replace(&mut self.playback_in_flight, false)
    }

    fn acknowledge(&mut self) -> ExternalAction {
        match &self.attention {
            AttentionStyle::Spoken(responses) => match responses.choose(&mut self.rng) {
                Some(text) => ExternalAction::Speak {
                    text: text.clone(),
                    context: None,
                },
                None => ExternalAction::PlayAttentionCue,
            },
            AttentionStyle::Cue => ExternalAction::PlayAttentionCue,
        }
    }

    /// Drop playback requests while another playback is active
    fn gate(&mut self, action: ExternalAction) -> ExternalAction {
        if !action.is_playback() {
            return action;
        }
        if self.playback_in_flight {
            warn!(?action, "playback already in flight, dropping request");
            return ExternalAction::None;
        }
        info!(?action, "starting playback");
        self.playback_in_flight = true;
        action
    }
}
