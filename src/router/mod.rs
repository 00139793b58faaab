//! Response routing: outbound events become external actions

mod actions;
mod response;

pub use actions::{BackendReply, ExternalAction, IntentPayload};
pub use response::{AttentionStyle, ResponseRouter};
