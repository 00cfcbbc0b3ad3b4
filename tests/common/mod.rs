//! Shared test doubles for driving the controller
//!
//! Each collaborator trait gets a counter-instrumented mock; tests hold the
//! probe halves to feed buffers/events in and observe what the controller
//! did. Time-sensitive assertions run under tokio's paused clock: pure
//! yields keep the clock frozen (for "not yet" checks), sleep-based waits
//! let it auto-advance (for "eventually" checks).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use voxflow::capture::{AudioCapture, AudioChunk};
use voxflow::config::Config;
use voxflow::controller::{ControllerHandle, StatusSnapshot, VoiceController};
use voxflow::error::{CaptureError, InjectError, RecognizeError};
use voxflow::inject::TextInjector;
use voxflow::permissions::{Capabilities, PermissionMonitor};
use voxflow::recognize::{RecognitionEvent, StreamingRecognizer};

// ============================================================================
// Capture mock
// ============================================================================

#[derive(Default)]
pub struct CaptureProbe {
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub fail_start: AtomicBool,
    tx: Mutex<Option<mpsc::Sender<Result<AudioChunk, CaptureError>>>>,
}

impl CaptureProbe {
    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Push one 100ms buffer into the controller, as the capture thread would
    pub fn send_chunk(&self) {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().expect("capture not started");
        tx.try_send(Ok(AudioChunk::mono(vec![0.0; 1600], 16000)))
            .expect("capture channel full");
    }

    /// Surface a stream error, as the capture error callback would
    pub fn send_error(&self, detail: &str) {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().expect("capture not started");
        tx.try_send(Err(CaptureError::Stream(detail.to_string())))
            .expect("capture channel full");
    }
}

pub struct MockCapture(pub Arc<CaptureProbe>);

#[async_trait::async_trait]
impl AudioCapture for MockCapture {
    async fn start(
        &mut self,
    ) -> Result<mpsc::Receiver<Result<AudioChunk, CaptureError>>, CaptureError> {
        self.0.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::Connection("mock start failure".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.0.tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.0.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Recognizer mock
// ============================================================================

#[derive(Default)]
pub struct RecognizerProbe {
    pub init_calls: AtomicUsize,
    pub fail_init: AtomicBool,
    pub session_starts: AtomicUsize,
    pub session_stops: AtomicUsize,
    pub feed_count: AtomicUsize,
    /// Text emitted as a Final event when the session is stopped
    pub final_on_stop: Mutex<Option<String>>,
    tx: Mutex<Option<mpsc::Sender<Result<RecognitionEvent, RecognizeError>>>>,
}

impl RecognizerProbe {
    pub fn session_starts(&self) -> usize {
        self.session_starts.load(Ordering::SeqCst)
    }

    pub fn fed(&self) -> usize {
        self.feed_count.load(Ordering::SeqCst)
    }

    pub fn set_final_on_stop(&self, text: &str) {
        *self.final_on_stop.lock().unwrap() = Some(text.to_string());
    }

    /// Emit a recognition event, as the engine callback would
    pub fn send_event(&self, event: RecognitionEvent) {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().expect("session not started");
        tx.try_send(Ok(event)).expect("event channel full");
    }

    /// Surface a fatal recognizer error
    pub fn send_fatal(&self, detail: &str) {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().expect("session not started");
        tx.try_send(Err(RecognizeError::InferenceFailed(detail.to_string())))
            .expect("event channel full");
    }
}

pub struct MockRecognizer(pub Arc<RecognizerProbe>);

#[async_trait::async_trait]
impl StreamingRecognizer for MockRecognizer {
    async fn initialize(&mut self) -> Result<(), RecognizeError> {
        self.0.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_init.load(Ordering::SeqCst) {
            return Err(RecognizeError::InitFailed("mock init failure".to_string()));
        }
        Ok(())
    }

    async fn start_session(
        &mut self,
    ) -> Result<mpsc::Receiver<Result<RecognitionEvent, RecognizeError>>, RecognizeError> {
        self.0.session_starts.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(32);
        *self.0.tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn feed(&mut self, _chunk: &AudioChunk) -> Result<(), RecognizeError> {
        self.0.feed_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_session(&mut self) -> Result<(), RecognizeError> {
        self.0.session_stops.fetch_add(1, Ordering::SeqCst);
        if let Some(text) = self.0.final_on_stop.lock().unwrap().take() {
            let guard = self.0.tx.lock().unwrap();
            if let Some(tx) = guard.as_ref() {
                let _ = tx.try_send(Ok(RecognitionEvent::Final(text)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Injector mock
// ============================================================================

#[derive(Default)]
pub struct InjectorProbe {
    pub allow: AtomicBool,
    pub fail_inject: AtomicBool,
    injected: Mutex<Vec<String>>,
}

impl InjectorProbe {
    pub fn new() -> Arc<Self> {
        let probe = Self::default();
        probe.allow.store(true, Ordering::SeqCst);
        Arc::new(probe)
    }

    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TextInjector for InjectorProbe {
    fn should_input(&self, text: &str) -> bool {
        self.allow.load(Ordering::SeqCst) && !text.trim().is_empty()
    }

    fn format(&self, text: &str) -> String {
        text.trim().to_string()
    }

    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        if self.fail_inject.load(Ordering::SeqCst) {
            return Err(InjectError::InjectionFailed("mock inject failure".to_string()));
        }
        self.injected.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ============================================================================
// Permission mock
// ============================================================================

pub struct TestPermissions {
    tx: watch::Sender<Capabilities>,
}

impl TestPermissions {
    pub fn granted() -> Arc<Self> {
        Self::with(Capabilities {
            has_microphone: true,
            has_accessibility: true,
        })
    }

    pub fn with(caps: Capabilities) -> Arc<Self> {
        let (tx, _) = watch::channel(caps);
        Arc::new(Self { tx })
    }

    /// Flip the live flags, as the permission subsystem would
    pub fn set(&self, caps: Capabilities) {
        let _ = self.tx.send(caps);
    }
}

impl PermissionMonitor for TestPermissions {
    fn current(&self) -> Capabilities {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Capabilities> {
        self.tx.subscribe()
    }
}

// ============================================================================
// Rig
// ============================================================================

pub struct Rig {
    pub controller: ControllerHandle,
    pub capture: Arc<CaptureProbe>,
    pub recognizer: Arc<RecognizerProbe>,
    pub injector: Arc<InjectorProbe>,
    pub permissions: Arc<TestPermissions>,
}

pub fn spawn_rig() -> Rig {
    spawn_rig_with(Config::default(), TestPermissions::granted())
}

pub fn spawn_rig_with(config: Config, permissions: Arc<TestPermissions>) -> Rig {
    let capture = Arc::new(CaptureProbe::default());
    let recognizer = Arc::new(RecognizerProbe::default());
    let injector = InjectorProbe::new();

    let controller = VoiceController::new(
        &config,
        Box::new(MockCapture(capture.clone())),
        Box::new(MockRecognizer(recognizer.clone())),
        injector.clone(),
        permissions.clone(),
    )
    .spawn();

    Rig {
        controller,
        capture,
        recognizer,
        injector,
        permissions,
    }
}

// ============================================================================
// Waiting helpers (paused-clock aware)
// ============================================================================

/// Let the controller drain its queues without advancing the clock
pub async fn drain() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Wait for a status the controller will publish; never advances the clock
/// past unrelated timers unless the controller itself is waiting on one.
pub async fn wait_status(
    rx: &mut watch::Receiver<StatusSnapshot>,
    mut pred: impl FnMut(&StatusSnapshot) -> bool,
    what: &str,
) -> StatusSnapshot {
    {
        let snap = rx.borrow_and_update().clone();
        if pred(&snap) {
            return snap;
        }
    }
    loop {
        tokio::select! {
            res = rx.changed() => {
                assert!(res.is_ok(), "controller gone while waiting for {}", what);
                let snap = rx.borrow_and_update().clone();
                if pred(&snap) {
                    return snap;
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(60)) => {
                panic!("timeout waiting for {}", what);
            }
        }
    }
}

/// Poll a condition, letting the paused clock advance between checks
pub async fn wait_for(mut cond: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timeout waiting for {}", what);
}
