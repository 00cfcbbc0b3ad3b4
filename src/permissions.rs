//! Capability flags and permission monitoring
//!
//! The controller never owns these flags: it re-queries `current()` at the
//! moment of each start request and watches `subscribe()` for revocation
//! while a session is active.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Live capability flags supplied by the permission subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// An audio input device is available
    pub has_microphone: bool,
    /// A text injection path is available
    pub has_accessibility: bool,
}

impl Capabilities {
    pub fn all_granted(&self) -> bool {
        self.has_microphone && self.has_accessibility
    }

    /// Human-readable list of missing capabilities, for error details
    pub fn missing(&self) -> String {
        match (self.has_microphone, self.has_accessibility) {
            (false, false) => "microphone and accessibility".to_string(),
            (false, true) => "microphone".to_string(),
            (true, false) => "accessibility".to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Source of live capability flags.
pub trait PermissionMonitor: Send + Sync {
    /// Current flags; callers must not cache this across phase transitions
    fn current(&self) -> Capabilities;

    /// Change notifications
    fn subscribe(&self) -> watch::Receiver<Capabilities>;
}

/// Probes the system for microphone and injection availability on a
/// refresh interval.
pub struct SystemPermissions {
    tx: watch::Sender<Capabilities>,
}

impl SystemPermissions {
    /// Probe once, then keep re-probing on the given interval for as long
    /// as the returned handle is alive.
    pub fn start(refresh: Duration) -> Arc<Self> {
        let (tx, _) = watch::channel(probe());
        let this = Arc::new(Self { tx });

        let weak = Arc::downgrade(&this);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                if let Ok(caps) = tokio::task::spawn_blocking(probe).await {
                    monitor.tx.send_if_modified(|current| {
                        if *current != caps {
                            tracing::info!(
                                microphone = caps.has_microphone,
                                accessibility = caps.has_accessibility,
                                "capabilities changed"
                            );
                            *current = caps;
                            true
                        } else {
                            false
                        }
                    });
                }
            }
        });

        this
    }
}

impl PermissionMonitor for SystemPermissions {
    fn current(&self) -> Capabilities {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Capabilities> {
        self.tx.subscribe()
    }
}

/// One blocking probe of both capabilities.
fn probe() -> Capabilities {
    Capabilities {
        has_microphone: microphone_present(),
        has_accessibility: injector_present(),
    }
}

/// A default input device counts as microphone permission.
fn microphone_present() -> bool {
    use cpal::traits::HostTrait;
    cpal::default_host().default_input_device().is_some()
}

/// Any injection tool on PATH counts as accessibility permission.
fn injector_present() -> bool {
    which::which("wtype").is_ok()
        || which::which("ydotool").is_ok()
        || which::which("wl-copy").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_granted_requires_both() {
        let caps = Capabilities {
            has_microphone: true,
            has_accessibility: true,
        };
        assert!(caps.all_granted());

        let caps = Capabilities {
            has_microphone: true,
            has_accessibility: false,
        };
        assert!(!caps.all_granted());
        assert_eq!(caps.missing(), "accessibility");
    }

    #[test]
    fn missing_lists_both() {
        let caps = Capabilities::default();
        assert_eq!(caps.missing(), "microphone and accessibility");
    }
}
