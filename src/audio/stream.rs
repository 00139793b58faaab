//! Capture stream supervision
//!
//! Classifies recognizer stream errors and decides whether the capture cycle
//! is restarted immediately, restarted after a backoff, or halted for good.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Fixed delay before restarting after audio was streamed too fast
pub const TOO_FAST_BACKOFF: Duration = Duration::from_secs(1);

const TOO_SLOW_PREFIX: &str = "audio data is being streamed too slow";
const TOO_FAST_PREFIX: &str = "audio data is being streamed too fast";

/// Stream error classification reported by the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    /// The link cannot sustain real-time streaming
    TooSlow,
    /// Audio arrived faster than real time
    TooFast,
    /// Anything else (timeouts, dropped connections, ...)
    Other,
}

impl StreamErrorKind {
    /// Classify a recognizer error message by its prefix
    pub fn classify(message: &str) -> Self {
        let message = message.trim_start().to_ascii_lowercase();
        if message.starts_with(TOO_SLOW_PREFIX) {
            StreamErrorKind::TooSlow
        } else if message.starts_with(TOO_FAST_PREFIX) {
            StreamErrorKind::TooFast
        } else {
            StreamErrorKind::Other
        }
    }
}

/// Lifecycle of the capture stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Audio is flowing to the recognizer
    #[default]
    Running,
    /// Stopped, waiting for a scheduled restart
    RestartPending,
    /// Stopped permanently; needs operator reconfiguration
    Halted,
}

/// What to do with the capture cycle after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    RestartNow,
    RestartAfter(Duration),
    Halt,
    /// The stream is already stopped; nothing further to do
    Ignore,
}

/// Tracks the capture stream and applies the restart policy
#[derive(Debug, Default)]
pub struct CaptureSupervisor {
    state: CaptureState,
}

impl CaptureSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CaptureState::Running
    }

    /// Apply the restart policy to a stream error
    pub fn on_error(&mut self, kind: StreamErrorKind) -> RestartDecision {
        match (self.state, kind) {
            (CaptureState::Halted, _) => RestartDecision::Ignore,
            (_, StreamErrorKind::TooSlow) => {
                error!("audio streamed too slow for real-time recognition, disabling capture");
                self.state = CaptureState::Halted;
                RestartDecision::Halt
            }
            (CaptureState::RestartPending, _) => {
                warn!(?kind, "stream error while a restart is already scheduled");
                RestartDecision::Ignore
            }
            (CaptureState::Running, StreamErrorKind::TooFast) => {
                warn!(delay_ms = TOO_FAST_BACKOFF.as_millis() as u64, "audio streamed too fast, restart scheduled");
                self.state = CaptureState::RestartPending;
                RestartDecision::RestartAfter(TOO_FAST_BACKOFF)
            }
            (CaptureState::Running, StreamErrorKind::Other) => {
                info!("restarting capture stream");
                RestartDecision::RestartNow
            }
        }
    }

    /// A scheduled restart fired. Returns whether capture resumes.
    pub fn on_restart_due(&mut self) -> bool {
        if self.state == CaptureState::RestartPending {
            info!("restarting capture stream after backoff");
            self.state = CaptureState::Running;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            StreamErrorKind::classify("Audio data is being streamed too slow. Please stream audio data approximately at real time."),
            StreamErrorKind::TooSlow
        );
        assert_eq!(
            StreamErrorKind::classify("Audio data is being streamed too fast"),
            StreamErrorKind::TooFast
        );
        assert_eq!(
            StreamErrorKind::classify("Exceeded maximum allowed stream duration"),
            StreamErrorKind::Other
        );
    }

    #[test]
    fn test_too_slow_halts_permanently() {
        let mut supervisor = CaptureSupervisor::new();
        assert_eq!(supervisor.on_error(StreamErrorKind::TooSlow), RestartDecision::Halt);
        assert_eq!(supervisor.state(), CaptureState::Halted);

        assert_eq!(supervisor.on_error(StreamErrorKind::Other), RestartDecision::Ignore);
        assert_eq!(supervisor.on_error(StreamErrorKind::TooFast), RestartDecision::Ignore);
        assert!(!supervisor.on_restart_due());
        assert!(!supervisor.is_running());
    }

    #[test]
    fn test_too_fast_schedules_single_restart() {
        let mut supervisor = CaptureSupervisor::new();
        assert_eq!(
            supervisor.on_error(StreamErrorKind::TooFast),
            RestartDecision::RestartAfter(TOO_FAST_BACKOFF)
        );
        assert_eq!(supervisor.on_error(StreamErrorKind::TooFast), RestartDecision::Ignore);
        assert_eq!(supervisor.state(), CaptureState::RestartPending);

        assert!(supervisor.on_restart_due());
        assert!(supervisor.is_running());
        assert!(!supervisor.on_restart_due());
    }

    #[test]
    fn test_other_restarts_immediately() {
        let mut supervisor = CaptureSupervisor::new();
        assert_eq!(supervisor.on_error(StreamErrorKind::Other), RestartDecision::RestartNow);
        assert!(supervisor.is_running());
    }

    #[test]
    fn test_too_slow_overrides_pending_restart() {
        let mut supervisor = CaptureSupervisor::new();
        supervisor.on_error(StreamErrorKind::TooFast);
        assert_eq!(supervisor.on_error(StreamErrorKind::TooSlow), RestartDecision::Halt);
        assert!(!supervisor.on_restart_due());
    }
}
