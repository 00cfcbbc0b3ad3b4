//! Daemon module - wires collaborators to the controller
//!
//! Builds the capture, recognizer, injector, and permission services,
//! spawns the voice controller, and routes trigger gestures and Unix
//! signals into it. Also maintains the state file and pid file for
//! external integrations.

use crate::capture;
use crate::config::Config;
use crate::controller::{ControllerHandle, VoiceController};
use crate::error::{Result, VoxflowError};
use crate::inject;
use crate::permissions::SystemPermissions;
use crate::phase::Phase;
use crate::recognize;
use crate::trigger::{self, TriggerEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

/// Write the current phase to the state file for external integrations
/// (e.g. Waybar)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated: {}", state);
    }
}

fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// Write PID file for external control via signals
fn write_pid_file() -> Option<PathBuf> {
    let pid_path = Config::runtime_dir().join("pid");

    if let Some(parent) = pid_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create PID file directory: {}", e);
            return None;
        }
    }

    let pid = std::process::id();
    if let Err(e) = std::fs::write(&pid_path, pid.to_string()) {
        tracing::warn!("Failed to write PID file: {}", e);
        return None;
    }

    tracing::debug!("PID file written: {:?} (pid={})", pid_path, pid);
    Some(pid_path)
}

fn cleanup_pid_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove PID file: {}", e);
        }
    }
}

/// Main daemon that owns the controller and its collaborators
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
    pid_file_path: Option<PathBuf>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let state_file_path = config.resolve_state_file();
        Self {
            config,
            state_file_path,
            pid_file_path: None,
        }
    }

    fn update_state(&self, state_name: &str) {
        if let Some(ref path) = self.state_file_path {
            write_state_file(path, state_name);
        }
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting voxflow daemon");

        self.pid_file_path = write_pid_file();

        // External control via signals (compositor keybindings, scripts)
        let mut sigusr1 = signal(SignalKind::user_defined1()).map_err(|e| {
            VoxflowError::Config(format!("Failed to set up SIGUSR1 handler: {}", e))
        })?;
        let mut sigusr2 = signal(SignalKind::user_defined2()).map_err(|e| {
            VoxflowError::Config(format!("Failed to set up SIGUSR2 handler: {}", e))
        })?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            VoxflowError::Config(format!("Failed to set up SIGTERM handler: {}", e))
        })?;

        // Build collaborators
        let permissions = SystemPermissions::start(self.config.permissions.refresh());
        let capture = capture::create_capture(&self.config.audio)?;
        let recognizer = recognize::create_recognizer(&self.config.recognizer);
        let injector = Arc::new(inject::create_injector(&self.config.delivery));
        tracing::debug!("Injection chain: {}", injector.backend_names().join(" -> "));

        let controller = VoiceController::new(
            &self.config,
            capture,
            recognizer,
            injector,
            permissions,
        )
        .spawn();

        // Initialize and wait for the outcome before listening for triggers
        controller.initialize().await;
        wait_for_initialized(&controller).await?;

        // Trigger listener (if enabled)
        let mut trigger_listener = if self.config.trigger.enabled {
            tracing::info!(
                "Trigger: {} ({})",
                self.config.trigger.key,
                match self.config.trigger.mode {
                    crate::config::ActivationMode::PushToTalk => "hold to dictate",
                    crate::config::ActivationMode::Toggle => "press to start/stop",
                }
            );
            Some(trigger::create_trigger(&self.config.trigger)?)
        } else {
            tracing::info!(
                "Built-in trigger disabled, use 'voxflow record' or compositor keybindings"
            );
            None
        };

        let mut trigger_rx = match trigger_listener.as_mut() {
            Some(listener) => Some(listener.start().await?),
            None => None,
        };

        let mut status_rx = controller.watch_status();
        self.update_state(status_rx.borrow().phase.state_name());

        loop {
            tokio::select! {
                Some(event) = async {
                    match &mut trigger_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match event {
                        TriggerEvent::StartRequested => controller.request_start().await,
                        TriggerEvent::StopRequested => controller.request_stop().await,
                    }
                }

                Ok(()) = status_rx.changed() => {
                    let snapshot = status_rx.borrow_and_update().clone();
                    self.update_state(snapshot.phase.state_name());
                    if let Phase::Error(ref reason) = snapshot.phase {
                        tracing::warn!("Controller error: {}", reason);
                    }
                }

                _ = sigusr1.recv() => {
                    tracing::debug!("Received SIGUSR1 (start recording)");
                    controller.request_start().await;
                }

                _ = sigusr2.recv() => {
                    tracing::debug!("Received SIGUSR2 (stop recording)");
                    controller.request_stop().await;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        // Cleanup
        if let Some(mut listener) = trigger_listener {
            listener.stop().await?;
        }

        controller.shutdown().await;

        if let Some(ref path) = self.state_file_path {
            cleanup_state_file(path);
        }
        if let Some(ref path) = self.pid_file_path {
            cleanup_pid_file(path);
        }

        tracing::info!("Daemon stopped");
        Ok(())
    }
}

/// Block until the controller reports Ready, or surface the init error
async fn wait_for_initialized(controller: &ControllerHandle) -> Result<()> {
    let mut status_rx = controller.watch_status();
    loop {
        {
            let snapshot = status_rx.borrow_and_update().clone();
            match snapshot.phase {
                Phase::Ready => return Ok(()),
                Phase::Error(reason) => {
                    return Err(VoxflowError::Config(format!(
                        "Initialization failed: {}",
                        reason
                    )))
                }
                _ => {}
            }
        }
        if status_rx.changed().await.is_err() {
            return Err(VoxflowError::Config(
                "Controller exited during initialization".to_string(),
            ));
        }
    }
}
