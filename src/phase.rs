//! Phase state machine types for the voice input lifecycle
//!
//! Idle → Initializing → Ready → Recording → Processing → Ready,
//! with Error(reason) reachable from every state.

use std::time::Instant;

use crate::error::SessionError;

/// The single current state of the voice-input session lifecycle.
///
/// Exactly one value is current at any instant; only the controller
/// writes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Not yet initialized
    Idle,

    /// Dependency setup in progress
    Initializing,

    /// Initialized, waiting for a start request
    Ready,

    /// Recording session active, audio flowing
    Recording {
        /// When the session entered Recording
        started_at: Instant,
    },

    /// Stop requested, in-flight buffers and events draining
    Processing,

    /// A dependency failed; requires explicit recovery
    Error(SessionError),
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Phase::Ready)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Phase::Recording { .. })
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Phase::Processing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Phase::Error(_))
    }

    /// A session is active between entering Recording and returning to Ready.
    pub fn session_active(&self) -> bool {
        matches!(self, Phase::Recording { .. } | Phase::Processing)
    }

    /// Session duration if currently recording
    pub fn recording_duration(&self) -> Option<std::time::Duration> {
        match self {
            Phase::Recording { started_at } => Some(started_at.elapsed()),
            _ => None,
        }
    }

    /// Short lowercase name, written to the state file for bar integrations
    pub fn state_name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Initializing => "initializing",
            Phase::Ready => "ready",
            Phase::Recording { .. } => "recording",
            Phase::Processing => "processing",
            Phase::Error(_) => "error",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Recording { started_at } => {
                write!(f, "Recording ({:.1}s)", started_at.elapsed().as_secs_f32())
            }
            Phase::Error(reason) => write!(f, "Error: {}", reason),
            other => write!(f, "{}", capitalized(other.state_name())),
        }
    }
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phase_is_idle() {
        assert!(Phase::default().is_idle());
    }

    #[test]
    fn recording_predicates() {
        let phase = Phase::Recording {
            started_at: Instant::now(),
        };
        assert!(phase.is_recording());
        assert!(phase.session_active());
        assert!(!phase.is_ready());
        assert!(phase.recording_duration().is_some());
    }

    #[test]
    fn processing_is_session_active() {
        assert!(Phase::Processing.session_active());
        assert!(!Phase::Ready.session_active());
        assert!(Phase::Processing.recording_duration().is_none());
    }

    #[test]
    fn error_from_any_state_carries_reason() {
        let phase = Phase::Error(SessionError::PermissionDenied("microphone".into()));
        assert!(phase.is_error());
        assert_eq!(phase.state_name(), "error");
        assert!(format!("{}", phase).contains("permission denied"));
    }

    #[test]
    fn state_names() {
        assert_eq!(Phase::Idle.state_name(), "idle");
        assert_eq!(Phase::Ready.state_name(), "ready");
        assert_eq!(
            Phase::Recording {
                started_at: Instant::now()
            }
            .state_name(),
            "recording"
        );
        assert_eq!(Phase::Processing.state_name(), "processing");
    }

    #[test]
    fn display_capitalizes() {
        assert_eq!(format!("{}", Phase::Idle), "Idle");
        assert_eq!(format!("{}", Phase::Processing), "Processing");
        assert!(format!(
            "{}",
            Phase::Recording {
                started_at: Instant::now()
            }
        )
        .starts_with("Recording"));
    }
}
