//! Clipboard-based injection backend
//!
//! Copies text to the Wayland clipboard via wl-copy. The most reliable
//! fallback because it works on every compositor.

use super::InjectBackend;
use crate::error::InjectError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct ClipboardBackend;

impl ClipboardBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClipboardBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InjectBackend for ClipboardBackend {
    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Ok(());
        }

        let mut child = Command::new("wl-copy")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectError::WlCopyNotFound
                } else {
                    InjectError::InjectionFailed(e.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| InjectError::InjectionFailed(e.to_string()))?;
            drop(stdin); // EOF
        }

        let status = child
            .wait()
            .await
            .map_err(|e| InjectError::InjectionFailed(e.to_string()))?;

        if !status.success() {
            return Err(InjectError::InjectionFailed(
                "wl-copy exited with error".to_string(),
            ));
        }

        tracing::info!("Text copied to clipboard ({} chars)", text.chars().count());
        Ok(())
    }

    async fn is_available(&self) -> bool {
        which::which("wl-copy").is_ok()
    }

    fn name(&self) -> &'static str {
        "clipboard (wl-copy)"
    }
}
