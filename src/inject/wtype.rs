//! wtype-based injection backend
//!
//! Simulates keyboard input on Wayland. Preferred because it needs no
//! daemon and has the best Unicode/CJK support.

use super::InjectBackend;
use crate::error::InjectError;
use std::process::Stdio;
use tokio::process::Command;

pub struct WtypeBackend;

impl WtypeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WtypeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InjectBackend for WtypeBackend {
    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Ok(());
        }

        // The -- ensures text starting with - isn't treated as an option
        let output = Command::new("wtype")
            .arg("--")
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectError::WtypeNotFound
                } else {
                    InjectError::InjectionFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectError::InjectionFailed(format!(
                "wtype failed: {}",
                stderr
            )));
        }

        Ok(())
    }

    async fn is_available(&self) -> bool {
        // Don't check WAYLAND_DISPLAY - systemd services may not have it;
        // wtype fails naturally if Wayland isn't available
        which::which("wtype").is_ok()
    }

    fn name(&self) -> &'static str {
        "wtype"
    }
}
