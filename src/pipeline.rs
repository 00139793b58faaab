//! Voice pipeline
//!
//! The single task that consumes collaborator input in arrival order. It owns
//! the audio buffer, the capture supervisor, the dialogue state machine and
//! the response router, and publishes everything it produces as notifications.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::audio::{AudioChunkBuffer, CaptureSupervisor, RestartDecision, StreamErrorKind};
use crate::config::CompiledConfig;
use crate::events::{ConversationContext, TranscriptEvent};
use crate::ipc::{Mode, Notification};
use crate::router::{BackendReply, ExternalAction, ResponseRouter};
use crate::state::DialogueStateMachine;

/// Input accepted by the pipeline
#[derive(Debug, Clone)]
pub enum PipelineInput {
    /// Raw 16-bit PCM from the capture device
    Audio(Vec<u8>),
    /// Recognition result
    Transcript(TranscriptEvent),
    /// The recognition stream failed
    StreamError(StreamErrorKind),
    /// The playback collaborator finished speaking
    PlaybackComplete(Option<ConversationContext>),
    /// Reply from the dialogue backend
    BackendReply(BackendReply),
    /// A backoff restart is due
    RestartDue,
}

pub struct VoicePipeline {
    machine: DialogueStateMachine,
    router: ResponseRouter,
    buffer: AudioChunkBuffer,
    supervisor: CaptureSupervisor,
    /// Used to schedule delayed restarts back into our own queue
    input_tx: mpsc::Sender<PipelineInput>,
    notify_tx: broadcast::Sender<Notification>,
}

impl VoicePipeline {
    pub fn new(
        compiled: CompiledConfig,
        sample_rate: u32,
        input_tx: mpsc::Sender<PipelineInput>,
        notify_tx: broadcast::Sender<Notification>,
    ) -> Self {
        Self::from_parts(
            DialogueStateMachine::new(compiled.rules),
            ResponseRouter::new(compiled.attention),
            sample_rate,
            input_tx,
            notify_tx,
        )
    }

    pub fn from_parts(
        machine: DialogueStateMachine,
        router: ResponseRouter,
        sample_rate: u32,
        input_tx: mpsc::Sender<PipelineInput>,
        notify_tx: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            machine,
            router,
            buffer: AudioChunkBuffer::new(sample_rate),
            supervisor: CaptureSupervisor::new(),
            input_tx,
            notify_tx,
        }
    }

    /// Run the pipeline until the input channel closes
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<PipelineInput>) {
        info!(
            chunk_bytes = self.buffer.threshold(),
            "voice pipeline started in AwaitingWake"
        );

        while let Some(input) = input_rx.recv().await {
            self.handle(input);
        }

        info!("voice pipeline stopped");
    }

    /// Process one input to completion
    pub fn handle(&mut self, input: PipelineInput) {
        match input {
            PipelineInput::Audio(pcm) => self.handle_audio(&pcm),
            PipelineInput::Transcript(event) => self.handle_transcript(event),
            PipelineInput::StreamError(kind) => self.handle_stream_error(kind),
            PipelineInput::RestartDue => {
                if self.supervisor.on_restart_due() {
                    self.buffer.clear();
                    self.emit(Notification::CaptureRestarted);
                }
            }
            PipelineInput::PlaybackComplete(context) => {
                if self.router.playback_finished() {
                    self.emit(Notification::PlaybackFinished);
                } else {
                    debug!("playback completion without a playback in flight");
                }
                let previous = self.mode();
                self.machine.rearm(context);
                self.sync_mode(previous);
            }
            PipelineInput::BackendReply(reply) => {
                let action = self.router.route_reply(reply);
                self.dispatch(action);
            }
        }
    }

    fn handle_audio(&mut self, pcm: &[u8]) {
        if !self.supervisor.is_running() {
            trace!(bytes = pcm.len(), "capture stopped, dropping audio");
            return;
        }
        if self.router.is_playing() {
            trace!(bytes = pcm.len(), "capture suspended during playback, dropping audio");
            return;
        }
        if let Some(chunk) = self.buffer.append(pcm) {
            trace!(bytes = chunk.len(), "audio chunk ready");
            self.emit(Notification::AudioChunk { pcm: chunk });
        }
    }

    fn handle_transcript(&mut self, event: TranscriptEvent) {
        if !self.supervisor.is_running() {
            debug!(text = %event.text, "capture stopped, dropping transcript");
            return;
        }
        // The rest of the wake utterance still arrives while the cue plays
        if self.router.is_playing() && !self.machine.wake_utterance_open() {
            debug!(text = %event.text, "capture suspended during playback, dropping transcript");
            return;
        }

        let previous = self.mode();
        let outbound = self.machine.handle_transcript(&event);
        self.sync_mode(previous);

        if outbound.is_noop() {
            return;
        }
        info!(event = %outbound, "turn resolved");
        let action = self.router.route(&outbound);
        self.dispatch(action);
    }

    fn handle_stream_error(&mut self, kind: StreamErrorKind) {
        let decision = self.supervisor.on_error(kind);
        debug!(?kind, ?decision, capture = ?self.supervisor.state(), "stream error handled");
        if decision == RestartDecision::Ignore {
            return;
        }

        // The current capture cycle is abandoned whatever happens next.
        self.buffer.clear();
        let previous = self.mode();
        self.machine.reset();
        self.sync_mode(previous);

        match decision {
            RestartDecision::RestartNow => self.emit(Notification::CaptureRestarted),
            RestartDecision::RestartAfter(delay) => {
                self.schedule_restart(delay);
                self.emit(Notification::CaptureRestartScheduled {
                    delay_ms: delay.as_millis() as u64,
                });
            }
            RestartDecision::Halt => self.emit(Notification::CaptureHalted),
            RestartDecision::Ignore => {}
        }
    }

    fn schedule_restart(&self, delay: Duration) {
        let input_tx = self.input_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if input_tx.send(PipelineInput::RestartDue).await.is_err() {
                warn!("pipeline closed before scheduled restart");
            }
        });
    }

    fn dispatch(&mut self, action: ExternalAction) {
        if action.is_none() {
            return;
        }
        if action.is_playback() {
            // Playback suspends capture; partial audio would be stale afterwards.
            self.buffer.clear();
        }
        self.emit(Notification::Action { action });
    }

    fn mode(&self) -> Mode {
        Mode::from(self.machine.mode())
    }

    fn sync_mode(&self, previous: Mode) {
        let mode = self.mode();
        if mode != previous {
            self.emit(Notification::ModeChanged { mode, previous });
        }
    }

    fn emit(&self, notification: Notification) {
        // No subscribers is fine; the notification is simply dropped.
        let _ = self.notify_tx.send(notification);
    }
}
