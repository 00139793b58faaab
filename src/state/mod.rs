//! State machine module for listening mode management
//!
//! Provides an explicit state machine with three modes:
//! - AwaitingWake: Default mode, listening for the wake phrase or a custom prompt
//! - CapturingCommand: Wake phrase heard, next final transcript is the command
//! - ContinuingConversation: A spoken reply expects a follow-up answer

mod machine;
mod mode;

pub use machine::DialogueStateMachine;
pub use mode::{DialogueRules, ListeningMode};
