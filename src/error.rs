//! Error types for voxflow
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the voxflow application
#[derive(Error, Debug)]
pub enum VoxflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("Audio capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recognition error: {0}")]
    Recognize(#[from] RecognizeError),

    #[error("Text injection error: {0}")]
    Inject(#[from] InjectError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to keyboard trigger detection
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest or wev to find valid key names.")]
    UnknownKey(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'. List devices with: pactl list sources short")]
    DeviceNotFound(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Capture did not acknowledge stop within {0} seconds")]
    StopTimeout(u32),
}

/// Errors related to streaming speech recognition
#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("Model not found: {0}\n  Place a ggml model under the models directory or set an absolute path in the config.")]
    ModelNotFound(String),

    #[error("Recognizer initialization failed: {0}")]
    InitFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("No active recognition session")]
    SessionNotActive,
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("ydotool daemon not running.\n  Start with: systemctl --user start ydotool")]
    YdotoolNotRunning,

    #[error("wtype not found in PATH. Install via your package manager.")]
    WtypeNotFound,

    #[error("wl-copy not found in PATH. Install wl-clipboard via your package manager.")]
    WlCopyNotFound,

    #[error("Text injection failed: {0}")]
    InjectionFailed(String),

    #[error("All injection backends failed. Ensure wtype, ydotool, or wl-copy is available.")]
    AllBackendsFailed,
}

/// Structured reason carried by the `Error` phase and `last_error`.
///
/// Every failure surfaced by a collaborator is wrapped into one of these
/// variants at the point of origin; the variant decides how the controller
/// reacts (`TextInputFailed` is the only one that leaves the phase alone).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("recording failed: {0}")]
    RecordingFailed(String),

    #[error("recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("text input failed: {0}")]
    TextInputFailed(String),
}

/// Result type alias using VoxflowError
pub type Result<T> = std::result::Result<T, VoxflowError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for TriggerError {
    fn from(e: evdev::Error) -> Self {
        TriggerError::Evdev(e.to_string())
    }
}
