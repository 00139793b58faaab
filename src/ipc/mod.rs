//! IPC module for daemon-collaborator communication

mod protocol;
mod server;

pub use protocol::{Mode, Notification};
pub use server::Server;
