//! Keyboard trigger module
//!
//! Detects the dictation gesture at the kernel level via evdev, which
//! works on all Wayland compositors because it bypasses the display
//! server. Requires membership in the 'input' group.
//!
//! The listener translates raw key activity into session requests: the
//! consumer only ever sees "start requested" / "stop requested",
//! regardless of the configured activation mode.

#[cfg(target_os = "linux")]
pub mod evdev_listener;

use crate::config::TriggerConfig;
use crate::error::TriggerError;
use tokio::sync::mpsc;

/// Session requests produced by the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Begin a recording session
    StartRequested,
    /// End the active recording session
    StopRequested,
}

/// Trait for trigger detection implementations
#[async_trait::async_trait]
pub trait Trigger: Send + Sync {
    /// Start listening for trigger gestures.
    /// Returns a channel receiver for session requests.
    async fn start(&mut self) -> Result<mpsc::Receiver<TriggerEvent>, TriggerError>;

    /// Stop listening and clean up
    async fn stop(&mut self) -> Result<(), TriggerError>;
}

/// Factory function to create the platform trigger listener
#[cfg(target_os = "linux")]
pub fn create_trigger(config: &TriggerConfig) -> Result<Box<dyn Trigger>, TriggerError> {
    Ok(Box::new(evdev_listener::EvdevListener::new(config)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_trigger(_config: &TriggerConfig) -> Result<Box<dyn Trigger>, TriggerError> {
    Err(TriggerError::Evdev(
        "Built-in trigger detection is only supported on Linux. \
         Use 'voxflow record start/stop' from a keybinding instead."
            .to_string(),
    ))
}
