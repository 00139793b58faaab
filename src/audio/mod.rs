//! Audio module: chunking of captured PCM and capture stream supervision

mod buffer;
mod stream;

pub use buffer::{AudioChunkBuffer, DEFAULT_SAMPLE_RATE};
pub use stream::{CaptureState, CaptureSupervisor, RestartDecision, StreamErrorKind};
