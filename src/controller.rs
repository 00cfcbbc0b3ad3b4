//! Voice input controller - the phase state machine
//!
//! Owns the session lifecycle and coordinates the collaborators: permission
//! gate, audio capture, streaming recognizer, and text injector. All state
//! mutation happens on one task that drains a command queue and the
//! collaborator channels through a single `select!` loop, so the phase is
//! never read and acted upon inconsistently. Observers see state through
//! watch channels; updates flow control path → observers only.
//!
//! Delays (warm-up, settle) are armed as sleeps that post a timer message
//! back into the control queue. Each message carries the session generation
//! it was armed for; messages from a superseded or stopped session are
//! ignored, which makes a stop-then-start sequence immune to stale
//! activations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::capture::{AudioCapture, AudioChunk};
use crate::config::Config;
use crate::delivery::DeliveryPipeline;
use crate::error::{CaptureError, RecognizeError, SessionError};
use crate::inject::TextInjector;
use crate::permissions::{Capabilities, PermissionMonitor};
use crate::phase::Phase;
use crate::recognize::{RecognitionEvent, StreamingRecognizer};
use crate::text::TextTransforms;
use crate::transcript::{TranscriptEntry, TranscriptHistory};

/// Public operations, funneled through the serialized control queue
enum Command {
    Initialize,
    RequestStart,
    RequestStop,
    ClearError,
    Shutdown,
}

/// Completions of armed delays, tagged with their session generation
enum TimerMsg {
    WarmupElapsed { session: u64 },
    SettleElapsed { session: u64 },
}

/// Read-only status published to observers
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub is_initialized: bool,
    pub phase: Phase,
    pub has_audio_permission: bool,
    pub has_accessibility_permission: bool,
    pub is_recording: bool,
    pub last_error: Option<SessionError>,
}

impl StatusSnapshot {
    /// Pure start predicate: ready phase plus both capabilities
    pub fn can_start(&self) -> bool {
        self.phase.is_ready() && self.has_audio_permission && self.has_accessibility_permission
    }
}

/// Transcript history plus the in-flight partial, published to observers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptView {
    pub entries: Vec<TranscriptEntry>,
    pub partial: Option<String>,
}

/// Relays capture buffers toward the recognizer session.
///
/// Counts buffers for diagnostics; drops when no recording is active and
/// queues while the recognizer is still warming up.
struct ForwardPath {
    received: u64,
    forwarded: u64,
    dropped: u64,
    queued: Vec<AudioChunk>,
    log_interval: u64,
}

impl ForwardPath {
    fn new(log_interval: u64) -> Self {
        Self {
            received: 0,
            forwarded: 0,
            dropped: 0,
            queued: Vec::new(),
            log_interval: log_interval.max(1),
        }
    }

    /// Admit one buffer. Returns the chunk when it should be fed to the
    /// recognizer now; queued and dropped buffers return None.
    fn route(
        &mut self,
        chunk: AudioChunk,
        recording: bool,
        recognizer_active: bool,
    ) -> Option<AudioChunk> {
        self.received += 1;
        if self.received % self.log_interval == 0 {
            tracing::debug!(
                received = self.received,
                forwarded = self.forwarded,
                dropped = self.dropped,
                frames = chunk.frames(),
                "audio forward path"
            );
        }

        if !recording {
            self.dropped += 1;
            tracing::trace!("Buffer dropped (no active recording)");
            None
        } else if !recognizer_active {
            self.queued.push(chunk);
            None
        } else {
            Some(chunk)
        }
    }

    fn note_forwarded(&mut self) {
        self.forwarded += 1;
    }

    /// Buffers held back during warm-up, in arrival order
    fn take_queued(&mut self) -> Vec<AudioChunk> {
        std::mem::take(&mut self.queued)
    }

    /// Per-session state; counters are cumulative diagnostics
    fn reset(&mut self) {
        self.queued.clear();
    }
}

/// Consumes recognition events: partial slot, history, delivery hand-off
struct EventSink {
    partial: Option<String>,
    history: TranscriptHistory,
}

impl EventSink {
    fn new(retention: usize) -> Self {
        Self {
            partial: None,
            history: TranscriptHistory::new(retention),
        }
    }

    fn on_partial(&mut self, text: String) {
        self.partial = Some(text);
    }

    /// A final result supersedes any pending partial for the turn
    fn on_final(&mut self, text: &str) {
        self.history.push(TranscriptEntry::new(text, false));
        self.partial = None;
    }

    fn clear_partial(&mut self) {
        self.partial = None;
    }

    fn view(&self) -> TranscriptView {
        TranscriptView {
            entries: self.history.snapshot(),
            partial: self.partial.clone(),
        }
    }
}

/// The voice input controller, before it is spawned.
///
/// Collaborators are injected at construction; swapping one (e.g. a mock
/// recognizer in tests) is substitution of the type behind the trait.
pub struct VoiceController {
    capture: Box<dyn AudioCapture>,
    recognizer: Box<dyn StreamingRecognizer>,
    injector: Arc<dyn TextInjector>,
    permissions: Arc<dyn PermissionMonitor>,
    warm_up: Duration,
    settle: Duration,
    delivery_delay: Duration,
    transforms: TextTransforms,
    transcript_retention: usize,
    buffer_log_interval: u64,
}

impl VoiceController {
    pub fn new(
        config: &Config,
        capture: Box<dyn AudioCapture>,
        recognizer: Box<dyn StreamingRecognizer>,
        injector: Arc<dyn TextInjector>,
        permissions: Arc<dyn PermissionMonitor>,
    ) -> Self {
        Self {
            capture,
            recognizer,
            injector,
            permissions,
            warm_up: config.session.warm_up(),
            settle: config.session.settle(),
            delivery_delay: config.delivery.delay(),
            transforms: TextTransforms::from_config(&config.text),
            transcript_retention: config.transcript.retention,
            buffer_log_interval: config.audio.buffer_log_interval,
        }
    }

    /// Start the control loop task and return the handle observers and
    /// triggers talk to.
    pub fn spawn(self) -> ControllerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (timer_tx, timer_rx) = mpsc::channel(32);
        let (failure_tx, failure_rx) = mpsc::channel(32);

        let caps = self.permissions.current();
        let perm_rx = self.permissions.subscribe();

        let (status_tx, status_rx) = watch::channel(StatusSnapshot {
            is_initialized: false,
            phase: Phase::Idle,
            has_audio_permission: caps.has_microphone,
            has_accessibility_permission: caps.has_accessibility,
            is_recording: false,
            last_error: None,
        });
        let (transcript_tx, transcript_rx) = watch::channel(TranscriptView::default());

        let delivery = DeliveryPipeline::new(
            self.injector.clone(),
            self.transforms,
            self.delivery_delay,
            failure_tx,
        );

        let control = ControlLoop {
            capture: self.capture,
            recognizer: self.recognizer,
            permissions: self.permissions,
            delivery,
            warm_up: self.warm_up,
            settle: self.settle,
            phase: Phase::Idle,
            session: 0,
            initialized: false,
            caps,
            last_error: None,
            forward: ForwardPath::new(self.buffer_log_interval),
            sink: EventSink::new(self.transcript_retention),
            recognizer_active: false,
            capture_rx: None,
            recog_rx: None,
            cmd_rx,
            timer_tx,
            timer_rx,
            failure_rx,
            perm_rx,
            status_tx,
            transcript_tx,
        };

        let task = tokio::spawn(control.run());

        ControllerHandle {
            cmd_tx,
            status_rx,
            transcript_rx,
            task,
        }
    }
}

/// Handle to a running controller
pub struct ControllerHandle {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<StatusSnapshot>,
    transcript_rx: watch::Receiver<TranscriptView>,
    task: tokio::task::JoinHandle<()>,
}

impl ControllerHandle {
    /// Idempotent dependency setup; Idle/Error → Ready on success
    pub async fn initialize(&self) {
        self.send(Command::Initialize).await;
    }

    /// Begin a recording session (gate permitting)
    pub async fn request_start(&self) {
        self.send(Command::RequestStart).await;
    }

    /// End the active recording session
    pub async fn request_stop(&self) {
        self.send(Command::RequestStop).await;
    }

    /// Explicit recovery from the Error phase
    pub async fn clear_error(&self) {
        self.send(Command::ClearError).await;
    }

    async fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).await.is_err() {
            tracing::error!("Controller task is gone, command dropped");
        }
    }

    /// Latest published status
    pub fn status(&self) -> StatusSnapshot {
        self.status_rx.borrow().clone()
    }

    /// Pure start predicate over the latest published status
    pub fn can_start(&self) -> bool {
        self.status().can_start()
    }

    /// Latest published transcript view
    pub fn transcript(&self) -> TranscriptView {
        self.transcript_rx.borrow().clone()
    }

    /// Subscribe to status changes (presentation side)
    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_rx.clone()
    }

    /// Subscribe to transcript changes (presentation side)
    pub fn watch_transcript(&self) -> watch::Receiver<TranscriptView> {
        self.transcript_rx.clone()
    }

    /// Stop the controller and wait for the control loop to finish
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

/// Await the next item of an optional channel; pends forever when there is
/// no channel (or it has closed), so the select loop simply ignores it.
async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> T {
    match rx {
        Some(rx) => match rx.recv().await {
            Some(value) => value,
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

/// State owned by the control task
struct ControlLoop {
    capture: Box<dyn AudioCapture>,
    recognizer: Box<dyn StreamingRecognizer>,
    permissions: Arc<dyn PermissionMonitor>,
    delivery: DeliveryPipeline,
    warm_up: Duration,
    settle: Duration,

    phase: Phase,
    /// Session generation; timer messages from older generations are stale
    session: u64,
    initialized: bool,
    caps: Capabilities,
    last_error: Option<SessionError>,
    forward: ForwardPath,
    sink: EventSink,
    /// True once the recognizer session is accepting buffers
    recognizer_active: bool,

    capture_rx: Option<mpsc::Receiver<Result<AudioChunk, CaptureError>>>,
    recog_rx: Option<mpsc::Receiver<Result<RecognitionEvent, RecognizeError>>>,

    cmd_rx: mpsc::Receiver<Command>,
    timer_tx: mpsc::Sender<TimerMsg>,
    timer_rx: mpsc::Receiver<TimerMsg>,
    failure_rx: mpsc::Receiver<String>,
    perm_rx: watch::Receiver<Capabilities>,

    status_tx: watch::Sender<StatusSnapshot>,
    transcript_tx: watch::Sender<TranscriptView>,
}

impl ControlLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Shutdown) | None => {
                            self.shutdown().await;
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                Some(msg) = self.timer_rx.recv() => {
                    self.handle_timer(msg).await;
                }

                event = recv_or_pending(&mut self.capture_rx) => {
                    self.on_capture_event(event).await;
                }

                event = recv_or_pending(&mut self.recog_rx) => {
                    self.on_recognition_event(event).await;
                }

                Some(detail) = self.failure_rx.recv() => {
                    self.on_delivery_failure(detail);
                }

                Ok(()) = self.perm_rx.changed() => {
                    let caps = *self.perm_rx.borrow_and_update();
                    self.on_capabilities_changed(caps).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Initialize => self.initialize().await,
            Command::RequestStart => self.request_start().await,
            Command::RequestStop => self.request_stop().await,
            Command::ClearError => self.clear_error(),
            Command::Shutdown => {} // handled in run()
        }
    }

    async fn initialize(&mut self) {
        match self.phase {
            Phase::Initializing | Phase::Ready | Phase::Recording { .. } | Phase::Processing => {
                tracing::info!(
                    "Already initialized (phase {}), ignoring initialize request",
                    self.phase
                );
                return;
            }
            Phase::Idle | Phase::Error(_) => {}
        }

        self.set_phase(Phase::Initializing);

        match self.recognizer.initialize().await {
            Ok(()) => {
                self.initialized = true;
                self.last_error = None;
                self.set_phase(Phase::Ready);
                tracing::info!("Voice input ready");
            }
            Err(e) => {
                self.initialized = false;
                self.fail(SessionError::InitializationFailed(e.to_string()));
            }
        }
    }

    async fn request_start(&mut self) {
        match self.phase {
            Phase::Recording { .. } | Phase::Processing => {
                // at most one session; concurrent requests are rejected,
                // never queued
                tracing::warn!("Start requested while a session is active, rejecting");
                return;
            }
            Phase::Ready => {}
            ref other => {
                tracing::warn!(
                    "Start requested in phase {}, ignoring (initialize first)",
                    other
                );
                return;
            }
        }

        // Flags are re-queried at every start request, never cached across
        // transitions
        let caps = self.permissions.current();
        self.caps = caps;
        if !caps.all_granted() {
            self.fail(SessionError::PermissionDenied(caps.missing()));
            return;
        }

        self.session += 1;
        match self.capture.start().await {
            Ok(rx) => {
                self.capture_rx = Some(rx);
                self.recognizer_active = false;
                self.forward.reset();
                self.sink.clear_partial();
                self.publish_transcript();
                self.set_phase(Phase::Recording {
                    started_at: Instant::now(),
                });
                tracing::info!("Recording started");
                self.arm_warm_up();
            }
            Err(e) => {
                self.fail(SessionError::RecordingFailed(e.to_string()));
            }
        }
    }

    async fn request_stop(&mut self) {
        if !self.phase.is_recording() {
            tracing::warn!(
                "Stop requested while not recording (phase {}), ignoring",
                self.phase
            );
            return;
        }

        let duration = self.phase.recording_duration().unwrap_or_default();
        self.set_phase(Phase::Processing);
        tracing::info!("Recording stopped ({:.1}s)", duration.as_secs_f32());

        self.recognizer_active = false;

        if let Err(e) = self.capture.stop().await {
            let _ = self.recognizer.stop_session().await;
            self.recog_rx = None;
            self.fail(SessionError::RecordingFailed(e.to_string()));
            return;
        }

        if let Err(e) = self.recognizer.stop_session().await {
            self.fail(SessionError::RecognitionFailed(e.to_string()));
            return;
        }

        // channels stay open through the settle window so in-flight buffers
        // and the final result can drain
        self.arm_settle();
    }

    fn clear_error(&mut self) {
        if !self.phase.is_error() {
            tracing::debug!("clear_error with no error present, ignoring");
            return;
        }
        self.last_error = None;
        let next = if self.initialized {
            Phase::Ready
        } else {
            Phase::Idle
        };
        tracing::info!("Error cleared");
        self.set_phase(next);
    }

    async fn handle_timer(&mut self, msg: TimerMsg) {
        match msg {
            TimerMsg::WarmupElapsed { session } => {
                if session != self.session || !self.phase.is_recording() {
                    tracing::debug!("Stale warm-up timer, ignoring");
                    return;
                }

                match self.recognizer.start_session().await {
                    Ok(rx) => {
                        self.recog_rx = Some(rx);
                        self.recognizer_active = true;
                        tracing::debug!("Recognizer session active");

                        // flush buffers held back during warm-up, in
                        // arrival order
                        for chunk in self.forward.take_queued() {
                            if let Err(e) = self.recognizer.feed(&chunk).await {
                                self.recognition_failure(e.to_string()).await;
                                return;
                            }
                            self.forward.note_forwarded();
                        }
                    }
                    Err(e) => {
                        self.recognition_failure(e.to_string()).await;
                    }
                }
            }
            TimerMsg::SettleElapsed { session } => {
                if session != self.session || !self.phase.is_processing() {
                    tracing::debug!("Stale settle timer, ignoring");
                    return;
                }
                self.capture_rx = None;
                self.recog_rx = None;
                self.set_phase(Phase::Ready);
                tracing::info!("Session complete, ready");
            }
        }
    }

    async fn on_capture_event(&mut self, event: Result<AudioChunk, CaptureError>) {
        match event {
            Ok(chunk) => {
                let routed =
                    self.forward
                        .route(chunk, self.phase.is_recording(), self.recognizer_active);
                if let Some(chunk) = routed {
                    if let Err(e) = self.recognizer.feed(&chunk).await {
                        self.recognition_failure(e.to_string()).await;
                    } else {
                        self.forward.note_forwarded();
                    }
                }
            }
            Err(e) => {
                if self.phase.session_active() {
                    tracing::error!("Capture error mid-session: {}", e);
                    self.abort_session().await;
                    self.fail(SessionError::RecordingFailed(e.to_string()));
                } else {
                    tracing::warn!("Capture error outside a session: {}", e);
                }
            }
        }
    }

    async fn on_recognition_event(&mut self, event: Result<RecognitionEvent, RecognizeError>) {
        if !self.phase.session_active() {
            tracing::debug!("Recognition event outside an active session, ignoring");
            return;
        }

        match event {
            Ok(RecognitionEvent::Partial(text)) => {
                tracing::debug!("Partial: {:?}", text);
                self.sink.on_partial(text);
                self.publish_transcript();
            }
            Ok(RecognitionEvent::Final(text)) => {
                tracing::info!("Final: {:?}", text);
                self.sink.on_final(&text);
                self.publish_transcript();
                self.delivery.deliver(text);
            }
            Ok(RecognitionEvent::Endpoint) => {
                // informational; end-of-session is driven only by stop
                // requests
                tracing::info!("Utterance endpoint detected");
            }
            Err(e) => {
                tracing::error!("Recognizer error: {}", e);
                self.abort_session().await;
                self.fail(SessionError::RecognitionFailed(e.to_string()));
            }
        }
    }

    async fn on_capabilities_changed(&mut self, caps: Capabilities) {
        self.caps = caps;
        self.publish_status();

        if self.phase.is_recording() && !caps.all_granted() {
            tracing::warn!(
                "Capability revoked mid-session ({}), forcing stop",
                caps.missing()
            );
            self.request_stop().await;
        }
    }

    fn on_delivery_failure(&mut self, detail: String) {
        // delivery is fire-and-forget; failures surface without a phase
        // change since the session has already moved on
        self.last_error = Some(SessionError::TextInputFailed(detail));
        self.publish_status();
    }

    async fn recognition_failure(&mut self, detail: String) {
        self.abort_session().await;
        self.fail(SessionError::RecognitionFailed(detail));
    }

    /// Tear down an active session without the settle window
    async fn abort_session(&mut self) {
        self.capture_rx = None;
        self.recog_rx = None;
        self.recognizer_active = false;
        if let Err(e) = self.capture.stop().await {
            tracing::warn!("Capture stop during abort failed: {}", e);
        }
        if let Err(e) = self.recognizer.stop_session().await {
            tracing::warn!("Recognizer stop during abort failed: {}", e);
        }
    }

    async fn shutdown(&mut self) {
        if self.phase.session_active() {
            self.abort_session().await;
        }
        self.set_phase(Phase::Idle);
        tracing::debug!("Controller stopped");
    }

    fn arm_warm_up(&self) {
        let tx = self.timer_tx.clone();
        let session = self.session;
        let delay = self.warm_up;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerMsg::WarmupElapsed { session }).await;
        });
    }

    fn arm_settle(&self) {
        let tx = self.timer_tx.clone();
        let session = self.session;
        let delay = self.settle;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerMsg::SettleElapsed { session }).await;
        });
    }

    fn fail(&mut self, reason: SessionError) {
        tracing::error!("{}", reason);
        self.last_error = Some(reason.clone());
        self.set_phase(Phase::Error(reason));
    }

    fn set_phase(&mut self, phase: Phase) {
        tracing::debug!("Phase: {} -> {}", self.phase, phase);
        self.phase = phase;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(StatusSnapshot {
            is_initialized: self.initialized,
            phase: self.phase.clone(),
            has_audio_permission: self.caps.has_microphone,
            has_accessibility_permission: self.caps.has_accessibility,
            is_recording: self.phase.is_recording(),
            last_error: self.last_error.clone(),
        });
    }

    fn publish_transcript(&self) {
        self.transcript_tx.send_replace(self.sink.view());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> AudioChunk {
        AudioChunk::mono(vec![0.0; 1600], 16000)
    }

    #[test]
    fn forward_path_drops_when_not_recording() {
        let mut forward = ForwardPath::new(200);
        assert!(forward.route(chunk(), false, false).is_none());
        assert!(forward.route(chunk(), false, true).is_none());
        assert_eq!(forward.dropped, 2);
        assert_eq!(forward.received, 2);
        assert!(forward.take_queued().is_empty());
    }

    #[test]
    fn forward_path_queues_during_warmup() {
        let mut forward = ForwardPath::new(200);
        assert!(forward.route(chunk(), true, false).is_none());
        assert!(forward.route(chunk(), true, false).is_none());
        assert_eq!(forward.dropped, 0);
        assert_eq!(forward.take_queued().len(), 2);
        assert!(forward.take_queued().is_empty());
    }

    #[test]
    fn forward_path_passes_through_when_active() {
        let mut forward = ForwardPath::new(200);
        assert!(forward.route(chunk(), true, true).is_some());
        forward.note_forwarded();
        assert_eq!(forward.forwarded, 1);
        assert_eq!(forward.dropped, 0);
    }

    #[test]
    fn forward_path_reset_clears_queue_only() {
        let mut forward = ForwardPath::new(200);
        forward.route(chunk(), true, false);
        forward.route(chunk(), false, false);
        forward.reset();
        assert!(forward.take_queued().is_empty());
        assert_eq!(forward.received, 2);
    }

    #[test]
    fn event_sink_final_supersedes_partial() {
        let mut sink = EventSink::new(10);
        sink.on_partial("a".to_string());
        sink.on_partial("ab".to_string());
        assert_eq!(sink.view().partial.as_deref(), Some("ab"));
        assert!(sink.view().entries.is_empty());

        sink.on_final("abc");
        let view = sink.view();
        assert_eq!(view.partial, None);
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].text, "abc");
        assert!(!view.entries[0].is_partial);
    }

    #[test]
    fn status_can_start_requires_ready_and_capabilities() {
        let snapshot = StatusSnapshot {
            is_initialized: true,
            phase: Phase::Ready,
            has_audio_permission: true,
            has_accessibility_permission: true,
            is_recording: false,
            last_error: None,
        };
        assert!(snapshot.can_start());

        let denied = StatusSnapshot {
            has_audio_permission: false,
            ..snapshot.clone()
        };
        assert!(!denied.can_start());

        let busy = StatusSnapshot {
            phase: Phase::Processing,
            ..snapshot
        };
        assert!(!busy.can_start());
    }
}
