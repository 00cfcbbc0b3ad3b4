//! ydotool-based injection backend
//!
//! Works on all compositors via the uinput kernel interface.
//! Requires the ydotoold daemon and membership in the 'input' group.

use super::InjectBackend;
use crate::error::InjectError;
use std::process::Stdio;
use tokio::process::Command;

pub struct YdotoolBackend {
    /// Delay between keypresses in milliseconds
    delay_ms: u32,
}

impl YdotoolBackend {
    pub fn new(delay_ms: u32) -> Self {
        Self { delay_ms }
    }
}

#[async_trait::async_trait]
impl InjectBackend for YdotoolBackend {
    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        if text.is_empty() {
            return Ok(());
        }

        let mut cmd = Command::new("ydotool");
        cmd.arg("type");

        if self.delay_ms > 0 {
            cmd.arg("--key-delay").arg(self.delay_ms.to_string());
            cmd.arg("--key-hold").arg(self.delay_ms.to_string());
        }

        cmd.arg("--").arg(text);

        let output = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| InjectError::InjectionFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            if stderr.contains("socket") || stderr.contains("connect") || stderr.contains("daemon")
            {
                return Err(InjectError::YdotoolNotRunning);
            }

            return Err(InjectError::InjectionFailed(stderr.to_string()));
        }

        Ok(())
    }

    async fn is_available(&self) -> bool {
        if which::which("ydotool").is_err() {
            return false;
        }

        // A no-op type succeeds quickly only when ydotoold is running
        Command::new("ydotool")
            .args(["type", ""])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "ydotool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let backend = YdotoolBackend::new(10);
        assert_eq!(backend.delay_ms, 10);
    }
}
