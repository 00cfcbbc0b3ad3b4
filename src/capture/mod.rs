//! Audio capture module
//!
//! Push-model capture: the capture service produces fixed-size audio
//! buffers through a channel; stream errors travel the same channel so the
//! consumer sees them in order.

pub mod cpal_capture;

use crate::config::AudioConfig;
use crate::error::CaptureError;
use tokio::sync::mpsc;

/// A fixed-format block of mono f32 samples.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio.
    /// Returns a channel of fixed-size buffers; stream errors are delivered
    /// in-band as `Err` items.
    async fn start(&mut self) -> Result<mpsc::Receiver<Result<AudioChunk, CaptureError>>, CaptureError>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Factory function to create audio capture
pub fn create_capture(config: &AudioConfig) -> Result<Box<dyn AudioCapture>, CaptureError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_metadata() {
        let chunk = AudioChunk::mono(vec![0.0; 1600], 16000);
        assert_eq!(chunk.frames(), 1600);
        assert_eq!(chunk.channels, 1);
        assert!((chunk.duration_secs() - 0.1).abs() < 1e-6);
    }
}
