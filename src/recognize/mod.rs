//! Streaming speech recognition module
//!
//! The core consumes a recognizer as a streaming session: feed it audio
//! buffers, receive partial/final/endpoint events through a channel. The
//! shipped implementation adapts whisper.cpp by periodically re-decoding
//! the accumulated audio.

pub mod endpoint;
pub mod whisper_stream;

use crate::capture::AudioChunk;
use crate::config::RecognizerConfig;
use crate::error::RecognizeError;
use tokio::sync::mpsc;

/// Recognition output for one session.
///
/// `Partial` and `Final` are mutually exclusive per recognition turn; a
/// `Final` supersedes any pending `Partial` text. `Endpoint` marks
/// recognizer-detected end of speech and is informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Partial(String),
    Final(String),
    Endpoint,
}

/// Trait for streaming speech-to-text implementations
#[async_trait::async_trait]
pub trait StreamingRecognizer: Send + Sync {
    /// One-time setup (model loading). Must be called before any session.
    async fn initialize(&mut self) -> Result<(), RecognizeError>;

    /// Start a recognition session.
    /// Returns a channel of events; fatal errors are delivered in-band as
    /// `Err` items and end the session.
    async fn start_session(
        &mut self,
    ) -> Result<mpsc::Receiver<Result<RecognitionEvent, RecognizeError>>, RecognizeError>;

    /// Feed one audio buffer into the active session
    async fn feed(&mut self, chunk: &AudioChunk) -> Result<(), RecognizeError>;

    /// Finalize the active session. Emits the final result on the event
    /// channel before closing it.
    async fn stop_session(&mut self) -> Result<(), RecognizeError>;
}

/// Factory function to create the streaming recognizer
pub fn create_recognizer(config: &RecognizerConfig) -> Box<dyn StreamingRecognizer> {
    Box::new(whisper_stream::WhisperStream::new(config))
}
