//! Listening modes and their pure transition rules
//!
//! Every input is a function of `(mode, input) -> (mode, event)`; nothing here
//! touches shared state.

use rand::Rng;
use tracing::debug;

use crate::events::{ConversationContext, OutboundEvent, TranscriptEvent};
use crate::pattern::{CustomPromptTable, WakePattern};

/// The three listening modes
///
/// The conversation context lives inside `ContinuingConversation`, so it
/// cannot exist in any other mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListeningMode {
    /// Passive listening for the wake phrase or a custom prompt
    #[default]
    AwaitingWake,
    /// Wake phrase heard, the next final transcript is the command.
    ///
    /// When the wake phrase was caught on a partial, the rest of that
    /// utterance is still arriving and its final is not the command.
    CapturingCommand { wake_final_pending: bool },
    /// A spoken response expects a follow-up answer
    ContinuingConversation(ConversationContext),
}

impl std::fmt::Display for ListeningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListeningMode::AwaitingWake => write!(f, "AwaitingWake"),
            ListeningMode::CapturingCommand { .. } => write!(f, "CapturingCommand"),
            ListeningMode::ContinuingConversation(_) => write!(f, "ContinuingConversation"),
        }
    }
}

/// Compiled matching rules consulted while awaiting the wake phrase
#[derive(Debug, Clone)]
pub struct DialogueRules {
    pub wake: WakePattern,
    pub prompts: CustomPromptTable,
}

/// Outcome of feeding one input to a mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ListeningMode,
    pub event: OutboundEvent,
}

impl Transition {
    fn stay(mode: ListeningMode) -> Self {
        Self {
            next: mode,
            event: OutboundEvent::Noop,
        }
    }

    fn to(next: ListeningMode, event: OutboundEvent) -> Self {
        Self { next, event }
    }
}

impl ListeningMode {
    pub fn context(&self) -> Option<&ConversationContext> {
        match self {
            ListeningMode::ContinuingConversation(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// Apply one transcript event.
    ///
    /// Rules are checked by current mode first; wake detection only runs
    /// while awaiting the wake phrase.
    pub fn on_transcript<R: Rng + ?Sized>(
        self,
        event: &TranscriptEvent,
        rules: &DialogueRules,
        rng: &mut R,
    ) -> Transition {
        match self {
            ListeningMode::ContinuingConversation(context) => {
                if !event.is_final {
                    return Transition::stay(ListeningMode::ContinuingConversation(context));
                }
                let text = event.text.trim();
                if text.is_empty() {
                    return Transition::to(ListeningMode::AwaitingWake, OutboundEvent::Noop);
                }
                Transition::to(
                    ListeningMode::AwaitingWake,
                    OutboundEvent::ConversationContinued {
                        text: text.to_string(),
                        context,
                    },
                )
            }

            ListeningMode::AwaitingWake => Self::await_wake(event, rules, rng),

            ListeningMode::CapturingCommand { wake_final_pending } => {
                if !event.is_final {
                    return Transition::stay(ListeningMode::CapturingCommand { wake_final_pending });
                }
                if wake_final_pending {
                    return Self::close_wake_utterance(event, rules);
                }
                let text = event.text.trim();
                if text.is_empty() {
                    return Transition::to(ListeningMode::AwaitingWake, OutboundEvent::Noop);
                }
                Transition::to(
                    ListeningMode::AwaitingWake,
                    OutboundEvent::CommandCaptured {
                        text: text.to_string(),
                    },
                )
            }
        }
    }

    fn await_wake<R: Rng + ?Sized>(
        event: &TranscriptEvent,
        rules: &DialogueRules,
        rng: &mut R,
    ) -> Transition {
        if let Some(wake) = rules.wake.detect(&event.text) {
            debug!(filler = %wake.filler, bot_name = %wake.bot_name, "wake phrase matched");
            return match wake.command() {
                None => Transition::to(
                    ListeningMode::CapturingCommand {
                        wake_final_pending: !event.is_final,
                    },
                    OutboundEvent::WakeDetected,
                ),
                // The command is still being spoken; wait for the final text.
                Some(_) if !event.is_final => Transition::stay(ListeningMode::AwaitingWake),
                Some(command) => Transition::to(
                    ListeningMode::AwaitingWake,
                    OutboundEvent::CommandCaptured {
                        text: command.to_string(),
                    },
                ),
            };
        }

        if !event.is_final {
            return Transition::stay(ListeningMode::AwaitingWake);
        }

        match rules.prompts.lookup(&event.text, rng) {
            Some(matched) => {
                debug!(prompt = matched.index, groups = ?matched.groups, "custom prompt matched");
                Transition::to(
                    ListeningMode::AwaitingWake,
                    OutboundEvent::PromptMatched {
                        response: matched.response,
                    },
                )
            }
            None => Transition::stay(ListeningMode::AwaitingWake),
        }
    }

    /// Final transcript of the utterance whose partial carried the wake
    /// phrase. Only a command trailing the wake phrase is taken from it.
    fn close_wake_utterance(event: &TranscriptEvent, rules: &DialogueRules) -> Transition {
        let command = rules
            .wake
            .detect(&event.text)
            .and_then(|wake| wake.command().map(str::to_string));
        match command {
            Some(text) => Transition::to(
                ListeningMode::AwaitingWake,
                OutboundEvent::CommandCaptured { text },
            ),
            None => Transition::stay(ListeningMode::CapturingCommand {
                wake_final_pending: false,
            }),
        }
    }

    /// Playback finished. A non-empty context arms a follow-up turn,
    /// otherwise the current mode is kept.
    pub fn on_playback_complete(self, context: Option<ConversationContext>) -> ListeningMode {
        match context {
            Some(ctx) if !ctx.is_empty() => ListeningMode::ContinuingConversation(ctx),
            _ => self,
        }
    }

    /// The capture stream restarted; any pending expectation is dropped.
    pub fn on_stream_restart(self) -> ListeningMode {
        ListeningMode::AwaitingWake
    }
}
