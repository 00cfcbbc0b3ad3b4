//! Text injection module
//!
//! The controller hands finalized text to a `TextInjector`, which decides
//! whether the text should be input at all (`should_input`), applies its
//! formatting rules, and performs the injection.
//!
//! The shipped injector is a fallback chain of backends:
//! 1. wtype - Wayland-native, best Unicode/CJK support, no daemon needed
//! 2. ydotool - works on X11/Wayland/TTY, requires daemon
//! 3. clipboard - universal fallback via wl-copy

pub mod clipboard;
pub mod wtype;
pub mod ydotool;

use crate::config::{DeliveryConfig, DeliveryMode};
use crate::error::InjectError;

/// Injector collaborator consumed by the controller.
#[async_trait::async_trait]
pub trait TextInjector: Send + Sync {
    /// Whether this text should be input at all. Rejected text is
    /// discarded, never queued.
    fn should_input(&self, text: &str) -> bool;

    /// Final formatting applied just before injection
    fn format(&self, text: &str) -> String;

    /// Deliver the text into the focused application
    async fn inject(&self, text: &str) -> Result<(), InjectError>;
}

/// One concrete injection mechanism in the fallback chain.
#[async_trait::async_trait]
pub trait InjectBackend: Send + Sync {
    /// Inject text (type it or copy to clipboard)
    async fn inject(&self, text: &str) -> Result<(), InjectError>;

    /// Check if this backend is usable right now
    async fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Fallback chain of injection backends.
pub struct InjectorChain {
    backends: Vec<Box<dyn InjectBackend>>,
}

impl InjectorChain {
    pub fn new(backends: Vec<Box<dyn InjectBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }
}

#[async_trait::async_trait]
impl TextInjector for InjectorChain {
    fn should_input(&self, text: &str) -> bool {
        !text.trim().is_empty()
    }

    fn format(&self, text: &str) -> String {
        text.trim().to_string()
    }

    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        for backend in &self.backends {
            if !backend.is_available().await {
                tracing::debug!("{} not available, trying next", backend.name());
                continue;
            }

            match backend.inject(text).await {
                Ok(()) => {
                    tracing::debug!("Text injected via {}", backend.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next", backend.name(), e);
                }
            }
        }

        Err(InjectError::AllBackendsFailed)
    }
}

/// Factory function that builds the configured fallback chain
pub fn create_injector(config: &DeliveryConfig) -> InjectorChain {
    let mut backends: Vec<Box<dyn InjectBackend>> = Vec::new();

    match config.mode {
        DeliveryMode::Type => {
            // Primary: wtype (no daemon, best Unicode support)
            backends.push(Box::new(wtype::WtypeBackend::new()));

            // Fallback: ydotool (works on X11/TTY, requires daemon)
            backends.push(Box::new(ydotool::YdotoolBackend::new(config.type_delay_ms)));

            // Last resort: clipboard
            if config.fallback_to_clipboard {
                backends.push(Box::new(clipboard::ClipboardBackend::new()));
            }
        }
        DeliveryMode::Clipboard => {
            backends.push(Box::new(clipboard::ClipboardBackend::new()));
        }
    }

    InjectorChain::new(backends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryConfig;

    #[test]
    fn chain_rejects_blank_text() {
        let chain = create_injector(&DeliveryConfig::default());
        assert!(!chain.should_input(""));
        assert!(!chain.should_input("   \n\t"));
        assert!(chain.should_input("hello"));
    }

    #[test]
    fn chain_format_trims() {
        let chain = create_injector(&DeliveryConfig::default());
        assert_eq!(chain.format("  hello world \n"), "hello world");
    }

    #[test]
    fn type_mode_builds_full_chain() {
        let chain = create_injector(&DeliveryConfig::default());
        assert_eq!(chain.backend_names(), vec!["wtype", "ydotool", "clipboard (wl-copy)"]);
    }

    #[test]
    fn clipboard_mode_builds_single_backend() {
        let config = DeliveryConfig {
            mode: DeliveryMode::Clipboard,
            ..DeliveryConfig::default()
        };
        let chain = create_injector(&config);
        assert_eq!(chain.backend_names(), vec!["clipboard (wl-copy)"]);
    }
}
