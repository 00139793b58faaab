//! Dialogue state machine
//!
//! Owns the listening mode and feeds it transcript, playback-completion and
//! stream-restart inputs one at a time.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::events::{ConversationContext, OutboundEvent, TranscriptEvent};

use super::mode::{DialogueRules, ListeningMode};

/// The state machine that manages listening mode transitions
pub struct DialogueStateMachine {
    /// Current mode
    mode: ListeningMode,
    /// Compiled wake pattern and custom prompts
    rules: DialogueRules,
    /// Source of randomness for response selection
    rng: StdRng,
    /// Time when current non-AwaitingWake mode was entered
    mode_entered_at: Option<Instant>,
}

impl DialogueStateMachine {
    /// Create a new state machine in `AwaitingWake`
    pub fn new(rules: DialogueRules) -> Self {
        Self::with_rng(rules, StdRng::from_entropy())
    }

    /// Create a state machine with a caller-provided RNG
    pub fn with_rng(rules: DialogueRules, rng: StdRng) -> Self {
        Self {
            mode: ListeningMode::AwaitingWake,
            rules,
            rng,
            mode_entered_at: None,
        }
    }

    /// Get the current mode
    pub fn mode(&self) -> &ListeningMode {
        &self.mode
    }

    /// The utterance that carried the wake phrase has not reached its final
    pub fn wake_utterance_open(&self) -> bool {
        matches!(
            self.mode,
            ListeningMode::CapturingCommand {
                wake_final_pending: true
            }
        )
    }

    /// Process one transcript event, returning exactly one outbound event
    pub fn handle_transcript(&mut self, event: &TranscriptEvent) -> OutboundEvent {
        let transition = self
            .mode
            .clone()
            .on_transcript(event, &self.rules, &mut self.rng);

        debug!(
            mode = %self.mode,
            is_final = event.is_final,
            rank = event.alternative_rank,
            text = %event.text,
            outcome = %transition.event,
            "transcript processed"
        );

        self.transition_to(transition.next);
        transition.event
    }

    /// Playback completed; install a follow-up context if one was carried
    pub fn rearm(&mut self, context: Option<ConversationContext>) {
        let next = self.mode.clone().on_playback_complete(context);
        self.transition_to(next);
    }

    /// Capture stream restarted; force back to `AwaitingWake`
    pub fn reset(&mut self) {
        let next = self.mode.clone().on_stream_restart();
        self.transition_to(next);
    }

    /// Perform a mode transition
    fn transition_to(&mut self, new_mode: ListeningMode) {
        if new_mode == self.mode {
            return;
        }
        if std::mem::discriminant(&new_mode) == std::mem::discriminant(&self.mode) {
            debug!(mode = %new_mode, "mode updated in place");
            self.mode = new_mode;
            return;
        }

        let duration_ms = self
            .mode_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %self.mode,
            to = %new_mode,
            duration_ms = duration_ms,
            "mode transition"
        );

        self.mode_entered_at = if new_mode != ListeningMode::AwaitingWake {
            Some(Instant::now())
        } else {
            None
        };
        self.mode = new_mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{CustomPrompt, CustomPromptTable, Placeholders, WakePattern, DEFAULT_WAKE_PATTERN};

    fn create_state_machine() -> DialogueStateMachine {
        let placeholders = Placeholders::new(Some("Jarvis".to_string()), Some("Ben".to_string()));
        let wake = WakePattern::compile(DEFAULT_WAKE_PATTERN, &placeholders).unwrap();
        let prompts = CustomPromptTable::new(vec![CustomPrompt::compile(
            "how are you",
            &["I'm great".to_string(), "Doing well".to_string()],
            &placeholders,
        )
        .unwrap()]);
        DialogueStateMachine::with_rng(DialogueRules { wake, prompts }, StdRng::seed_from_u64(42))
    }

    fn assert_exclusive(mode: &ListeningMode) {
        let capturing = matches!(mode, ListeningMode::CapturingCommand { .. });
        let continuing = matches!(mode, ListeningMode::ContinuingConversation(_));
        assert!(!(capturing && continuing));
        assert_eq!(mode.context().is_some(), continuing);
    }

    #[test]
    fn test_initial_mode() {
        let sm = create_state_machine();
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
    }

    #[test]
    fn test_bare_wake_enters_capture() {
        let mut sm = create_state_machine();
        let event = sm.handle_transcript(&TranscriptEvent::finalized("hey Jarvis"));
        assert_eq!(event, OutboundEvent::WakeDetected);
        assert!(matches!(sm.mode(), ListeningMode::CapturingCommand { .. }));
    }

    #[test]
    fn test_wake_detected_on_partial() {
        let mut sm = create_state_machine();
        let event = sm.handle_transcript(&TranscriptEvent::partial("ok jarvis"));
        assert_eq!(event, OutboundEvent::WakeDetected);
        assert!(matches!(sm.mode(), ListeningMode::CapturingCommand { .. }));
    }

    #[test]
    fn test_wake_utterance_final_yields_trailing_command() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::partial("hey"));
        let event = sm.handle_transcript(&TranscriptEvent::partial("hey jarvis"));
        assert_eq!(event, OutboundEvent::WakeDetected);
        assert!(sm.wake_utterance_open());

        // Remaining partials of the same utterance are not the command
        let event = sm.handle_transcript(&TranscriptEvent::partial("hey jarvis turn off"));
        assert_eq!(event, OutboundEvent::Noop);

        let event = sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis turn off the lights"));
        assert_eq!(
            event,
            OutboundEvent::CommandCaptured {
                text: "turn off the lights".to_string()
            }
        );
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
        assert!(!sm.wake_utterance_open());
    }

    #[test]
    fn test_bare_wake_utterance_final_keeps_capturing() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::partial("hey jarvis"));

        let event = sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        assert_eq!(event, OutboundEvent::Noop);
        assert!(matches!(
            sm.mode(),
            ListeningMode::CapturingCommand {
                wake_final_pending: false
            }
        ));

        // The next utterance is the command
        let event = sm.handle_transcript(&TranscriptEvent::finalized("play some jazz"));
        assert_eq!(
            event,
            OutboundEvent::CommandCaptured {
                text: "play some jazz".to_string()
            }
        );
    }

    #[test]
    fn test_wake_on_final_expects_next_utterance() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        assert!(!sm.wake_utterance_open());
    }

    #[test]
    fn test_inline_command() {
        let mut sm = create_state_machine();
        let event = sm.handle_transcript(&TranscriptEvent::finalized("hey Jarvis, what time is it"));
        assert_eq!(
            event,
            OutboundEvent::CommandCaptured {
                text: "what time is it".to_string()
            }
        );
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
    }

    #[test]
    fn test_inline_command_waits_for_final() {
        let mut sm = create_state_machine();
        let event = sm.handle_transcript(&TranscriptEvent::partial("hey Jarvis, what"));
        assert_eq!(event, OutboundEvent::Noop);
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);

        let event = sm.handle_transcript(&TranscriptEvent::finalized("hey Jarvis, what time is it"));
        assert!(matches!(event, OutboundEvent::CommandCaptured { .. }));
    }

    #[test]
    fn test_capture_command() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));

        // Partial events are ignored while capturing
        let event = sm.handle_transcript(&TranscriptEvent::partial("turn off"));
        assert_eq!(event, OutboundEvent::Noop);
        assert!(matches!(sm.mode(), ListeningMode::CapturingCommand { .. }));

        let event = sm.handle_transcript(&TranscriptEvent::finalized("turn off the lights"));
        assert_eq!(
            event,
            OutboundEvent::CommandCaptured {
                text: "turn off the lights".to_string()
            }
        );
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
    }

    #[test]
    fn test_wake_phrase_during_capture_is_content() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        let event = sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        assert_eq!(
            event,
            OutboundEvent::CommandCaptured {
                text: "hey jarvis".to_string()
            }
        );
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
    }

    #[test]
    fn test_custom_prompt() {
        let mut sm = create_state_machine();
        for _ in 0..20 {
            match sm.handle_transcript(&TranscriptEvent::finalized("how are you")) {
                OutboundEvent::PromptMatched { response } => {
                    assert!(response == "I'm great" || response == "Doing well");
                }
                other => panic!("unexpected event {other:?}"),
            }
            assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
        }
    }

    #[test]
    fn test_custom_prompt_ignores_partials() {
        let mut sm = create_state_machine();
        let event = sm.handle_transcript(&TranscriptEvent::partial("how are you"));
        assert_eq!(event, OutboundEvent::Noop);
    }

    #[test]
    fn test_noop_is_idempotent() {
        let mut sm = create_state_machine();
        for _ in 0..5 {
            let event = sm.handle_transcript(&TranscriptEvent::finalized("nothing to see here"));
            assert_eq!(event, OutboundEvent::Noop);
            assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
            assert!(sm.mode().context().is_none());
        }
    }

    #[test]
    fn test_conversation_round_trip() {
        let mut sm = create_state_machine();
        let ctx = ConversationContext::new("book_ride", "42");
        sm.rearm(Some(ctx.clone()));
        assert_eq!(sm.mode(), &ListeningMode::ContinuingConversation(ctx.clone()));

        let event = sm.handle_transcript(&TranscriptEvent::partial("yes"));
        assert_eq!(event, OutboundEvent::Noop);

        let event = sm.handle_transcript(&TranscriptEvent::finalized("yes please"));
        assert_eq!(
            event,
            OutboundEvent::ConversationContinued {
                text: "yes please".to_string(),
                context: ctx,
            }
        );
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
        assert!(sm.mode().context().is_none());

        // The context is used exactly once
        let event = sm.handle_transcript(&TranscriptEvent::finalized("yes please"));
        assert_eq!(event, OutboundEvent::Noop);
    }

    #[test]
    fn test_rearm_without_context_keeps_mode() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        sm.rearm(None);
        assert!(matches!(sm.mode(), ListeningMode::CapturingCommand { .. }));
        sm.rearm(Some(ConversationContext::default()));
        assert!(matches!(sm.mode(), ListeningMode::CapturingCommand { .. }));
    }

    #[test]
    fn test_rearm_with_context_replaces_capture() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        sm.rearm(Some(ConversationContext::new("confirm", "1")));
        assert!(matches!(sm.mode(), ListeningMode::ContinuingConversation(_)));
        assert_exclusive(sm.mode());
    }

    #[test]
    fn test_reset_on_stream_restart() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        sm.reset();
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);

        sm.rearm(Some(ConversationContext::new("book_ride", "42")));
        sm.reset();
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
        assert!(sm.mode().context().is_none());
    }

    #[test]
    fn test_modes_stay_exclusive() {
        let mut sm = create_state_machine();
        let inputs = [
            TranscriptEvent::partial("hey"),
            TranscriptEvent::partial("hey jarvis"),
            TranscriptEvent::finalized("play music"),
            TranscriptEvent::finalized("how are you"),
            TranscriptEvent::finalized("hey jarvis, stop"),
        ];
        for input in &inputs {
            sm.handle_transcript(input);
            assert_exclusive(sm.mode());
            sm.rearm(Some(ConversationContext::new("a", "b")));
            assert_exclusive(sm.mode());
        }
    }

    #[test]
    fn test_blank_final_ends_capture() {
        let mut sm = create_state_machine();
        sm.handle_transcript(&TranscriptEvent::finalized("hey jarvis"));
        let event = sm.handle_transcript(&TranscriptEvent::finalized("   "));
        assert_eq!(event, OutboundEvent::Noop);
        assert_eq!(sm.mode(), &ListeningMode::AwaitingWake);
    }
}
