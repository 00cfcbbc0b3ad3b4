//! Configuration loading and types for voxflow
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voxflow/config.toml)
//! 3. CLI arguments (highest priority)

use crate::error::VoxflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voxflow Configuration
#
# Location: ~/.config/voxflow/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for default location ($XDG_RUNTIME_DIR/voxflow/state),
# a custom path, or "disabled" to turn off. The daemon writes the current
# phase ("idle", "ready", "recording", "processing", "error") to this file
# whenever it changes. Required for `voxflow record toggle` and
# `voxflow status`.
state_file = "auto"

[trigger]
# Key to hold for dictation
# Common choices: SCROLLLOCK, PAUSE, RIGHTALT, F13-F24
# Use `evtest` to find key names for your keyboard
key = "SCROLLLOCK"

# Optional modifier keys that must also be held
# Example: modifiers = ["LEFTCTRL", "LEFTALT"]
modifiers = []

# Activation mode: "push_to_talk" or "toggle"
# - push_to_talk: hold to dictate, release to stop (default)
# - toggle: press once to start, press again to stop
# mode = "push_to_talk"

# Enable built-in trigger detection (default: true)
# Set to false when using compositor keybindings with `voxflow record`
# enabled = true

[audio]
# Audio input device ("default" uses system default)
# List devices with: pactl list sources short
device = "default"

# Sample rate in Hz (whisper expects 16000)
sample_rate = 16000

# Size of each forwarded audio buffer in milliseconds
chunk_ms = 100

# Emit a forward-path diagnostic every N buffers
buffer_log_interval = 200

[recognizer]
# Model to use for streaming transcription
# Options: tiny, tiny.en, base, base.en, small, small.en, medium, large-v3-turbo
# Or provide an absolute path to a custom .bin model file
model = "base.en"

# Language for transcription ("auto" for auto-detection)
language = "en"

# Translate non-English speech to English
translate = false

# Number of CPU threads for inference (omit for auto-detection)
# threads = 4

# How often accumulated audio is re-decoded for partial results
partial_interval_ms = 750

# Trailing silence that counts as an utterance endpoint
endpoint_silence_ms = 800

# Endpoint energy sensitivity (0.0 = detect whispers, 1.0 = loud speech only)
endpoint_sensitivity = 0.5

[session]
# Pause between capture start and recognizer activation, so early
# buffers are not fed to a cold recognizer
warm_up_ms = 1000

# Pause between stop and readiness for a new session, so in-flight
# buffers and events can drain
settle_ms = 500

[delivery]
# Injection mode: "type" (simulate keystrokes) or "clipboard"
mode = "type"

# Fall back to clipboard if typing fails
fallback_to_clipboard = true

# Delay between typed characters in milliseconds (ydotool only)
type_delay_ms = 0

# Delay between a finalized result and its injection, to avoid racing
# the focus change after the trigger key is released
delay_ms = 500

[text]
# Convert spoken punctuation (e.g. "period" -> ".") and clean up spacing
spoken_punctuation = false

# Hot-word substitutions (case-insensitive, whole words)
# hot_words = { "vox flow" = "voxflow" }

[transcript]
# Number of transcript entries retained for the observability surface
retention = 100

[permissions]
# How often microphone/injection availability is re-probed, in ms
refresh_ms = 2000
"#;

/// Trigger activation mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Hold key to dictate, release to stop (default)
    #[default]
    PushToTalk,
    /// Press once to start, press again to stop
    Toggle,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub trigger: TriggerConfig,
    pub audio: AudioConfig,
    pub recognizer: RecognizerConfig,
    pub session: SessionConfig,
    pub delivery: DeliveryConfig,
    pub text: TextConfig,
    pub transcript: TranscriptConfig,
    pub permissions: PermissionsConfig,

    /// Optional path to state file for external integrations (e.g. Waybar).
    /// "auto" resolves under $XDG_RUNTIME_DIR/voxflow, "disabled" turns it off.
    pub state_file: Option<String>,
}

/// Keyboard trigger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Key name (evdev KEY_* constant name, without the KEY_ prefix)
    pub key: String,

    /// Optional modifier keys that must also be held
    pub modifiers: Vec<String>,

    /// Activation mode: push_to_talk (hold) or toggle (press twice)
    pub mode: ActivationMode,

    /// Enable built-in trigger detection
    pub enabled: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            key: "SCROLLLOCK".to_string(),
            modifiers: vec![],
            mode: ActivationMode::default(),
            enabled: true,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// PipeWire/PulseAudio device name, or "default"
    pub device: String,

    /// Sample rate in Hz (whisper expects 16000)
    pub sample_rate: u32,

    /// Size of each forwarded buffer in milliseconds
    pub chunk_ms: u32,

    /// Emit a forward-path diagnostic every N buffers
    pub buffer_log_interval: u64,
}

impl AudioConfig {
    /// Frames per forwarded buffer at the configured sample rate
    pub fn chunk_frames(&self) -> usize {
        (self.sample_rate as u64 * self.chunk_ms as u64 / 1000) as usize
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: 16000,
            chunk_ms: 100,
            buffer_log_interval: 200,
        }
    }
}

/// Streaming recognizer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Model name (tiny, base.en, ...) or absolute path to a .bin file
    pub model: String,

    /// Language code (en, es, fr, auto, ...)
    pub language: String,

    /// Translate to English if source language is not English
    pub translate: bool,

    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,

    /// Interval between partial-result decodes of the accumulated audio
    pub partial_interval_ms: u64,

    /// Trailing silence counted as an utterance endpoint
    pub endpoint_silence_ms: u64,

    /// Endpoint energy sensitivity (0.0 - 1.0)
    pub endpoint_sensitivity: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model: "base.en".to_string(),
            language: "en".to_string(),
            translate: false,
            threads: None,
            partial_interval_ms: 750,
            endpoint_silence_ms: 800,
            endpoint_sensitivity: 0.5,
        }
    }
}

/// Session timing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pause between capture start and recognizer activation
    pub warm_up_ms: u64,

    /// Pause between stop and return to Ready
    pub settle_ms: u64,
}

impl SessionConfig {
    pub fn warm_up(&self) -> Duration {
        Duration::from_millis(self.warm_up_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warm_up_ms: 1000,
            settle_ms: 500,
        }
    }
}

/// Injection mode selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Simulate keyboard input (wtype/ydotool)
    #[default]
    Type,
    /// Copy to clipboard (wl-copy)
    Clipboard,
}

/// Text delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Primary injection mode
    pub mode: DeliveryMode,

    /// Fall back to clipboard if typing fails
    pub fallback_to_clipboard: bool,

    /// Delay between typed characters (ms), 0 for fastest
    pub type_delay_ms: u32,

    /// Delay between a finalized result and its injection
    pub delay_ms: u64,
}

impl DeliveryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Type,
            fallback_to_clipboard: true,
            type_delay_ms: 0,
            delay_ms: 500,
        }
    }
}

/// Text transform configuration (hot words, spoken punctuation)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TextConfig {
    /// Enable spoken punctuation conversion (e.g. "period" -> ".")
    pub spoken_punctuation: bool,

    /// Hot-word substitutions (case-insensitive, whole words)
    pub hot_words: HashMap<String, String>,
}

/// Transcript history configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Number of entries retained, oldest evicted first
    pub retention: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self { retention: 100 }
    }
}

/// Permission probing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Probe interval in milliseconds
    pub refresh_ms: u64,
}

impl PermissionsConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { refresh_ms: 2000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger: TriggerConfig::default(),
            audio: AudioConfig::default(),
            recognizer: RecognizerConfig::default(),
            session: SessionConfig::default(),
            delivery: DeliveryConfig::default(),
            text: TextConfig::default(),
            transcript: TranscriptConfig::default(),
            permissions: PermissionsConfig::default(),
            state_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voxflow")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state, pid)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("voxflow")
    }

    /// Resolve the state file path from config.
    /// Returns None if disabled, the default location for "auto",
    /// or the explicit path otherwise.
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .as_ref()
            .and_then(|path| match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            })
    }

    /// Get the data directory path (for models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "voxflow")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VoxflowError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => Config::default_path().filter(|p| p.exists()),
    };

    let config = match config_path {
        Some(ref p) => {
            tracing::debug!("Loading config from {:?}", p);
            let content = std::fs::read_to_string(p).map_err(|e| {
                VoxflowError::Config(format!("Failed to read {:?}: {}", p, e))
            })?;
            toml::from_str(&content).map_err(|e| {
                VoxflowError::Config(format!("Failed to parse {:?}: {}", p, e))
            })?
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).expect("default config must parse");
        assert_eq!(config.trigger.key, "SCROLLLOCK");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.recognizer.model, "base.en");
    }

    #[test]
    fn default_timing_values() {
        let config = Config::default();
        assert_eq!(config.session.warm_up(), Duration::from_millis(1000));
        assert_eq!(config.session.settle(), Duration::from_millis(500));
        assert_eq!(config.delivery.delay(), Duration::from_millis(500));
        assert_eq!(config.transcript.retention, 100);
        assert_eq!(config.audio.buffer_log_interval, 200);
    }

    #[test]
    fn chunk_frames_from_rate_and_ms() {
        let audio = AudioConfig::default();
        assert_eq!(audio.chunk_frames(), 1600);

        let audio = AudioConfig {
            sample_rate: 48000,
            chunk_ms: 20,
            ..AudioConfig::default()
        };
        assert_eq!(audio.chunk_frames(), 960);
    }

    #[test]
    fn state_file_resolution() {
        let mut config = Config {
            state_file: Some("disabled".to_string()),
            ..Config::default()
        };
        assert!(config.resolve_state_file().is_none());

        config.state_file = Some("auto".to_string());
        let resolved = config.resolve_state_file().unwrap();
        assert!(resolved.ends_with("voxflow/state"));

        config.state_file = Some("/tmp/custom-state".to_string());
        assert_eq!(
            config.resolve_state_file().unwrap(),
            PathBuf::from("/tmp/custom-state")
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = toml::from_str("[trigger]\nkey = \"F13\"\n").unwrap();
        assert_eq!(config.trigger.key, "F13");
        assert_eq!(config.session.warm_up_ms, 1000);
        assert_eq!(config.delivery.delay_ms, 500);
    }
}
