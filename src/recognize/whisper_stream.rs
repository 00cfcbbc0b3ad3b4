//! Whisper-based streaming recognition
//!
//! whisper.cpp decodes whole clips, so streaming is adapted on top: fed
//! audio accumulates in a session buffer, a background task re-decodes the
//! accumulated audio on an interval to emit `Partial` events, and
//! `stop_session` runs one last decode for the `Final` result. An energy
//! detector watches the fed audio for utterance endpoints.
//!
//! Input is expected as f32 samples, mono, 16kHz.

use super::endpoint::EndpointDetector;
use super::{RecognitionEvent, StreamingRecognizer};
use crate::capture::AudioChunk;
use crate::config::{Config, RecognizerConfig};
use crate::error::RecognizeError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Sample rate whisper expects
const SAMPLE_RATE: u32 = 16_000;

/// Do not decode less than this much audio (0.5s)
const MIN_DECODE_SAMPLES: usize = SAMPLE_RATE as usize / 2;

/// Decode parameters captured per session
#[derive(Clone)]
struct DecodeOpts {
    language: String,
    translate: bool,
    threads: i32,
}

/// One active recognition session
struct Session {
    audio: Arc<Mutex<Vec<f32>>>,
    events: mpsc::Sender<Result<RecognitionEvent, RecognizeError>>,
    partial_task: tokio::task::JoinHandle<()>,
    endpoint: EndpointDetector,
}

/// Streaming adapter over whisper.cpp
pub struct WhisperStream {
    config: RecognizerConfig,
    ctx: Option<Arc<WhisperContext>>,
    session: Option<Session>,
}

impl WhisperStream {
    pub fn new(config: &RecognizerConfig) -> Self {
        Self {
            config: config.clone(),
            ctx: None,
            session: None,
        }
    }

    fn decode_opts(&self) -> DecodeOpts {
        DecodeOpts {
            language: self.config.language.clone(),
            translate: self.config.translate,
            threads: self.config.threads.unwrap_or_else(|| num_cpus::get().min(4)) as i32,
        }
    }
}

#[async_trait::async_trait]
impl StreamingRecognizer for WhisperStream {
    async fn initialize(&mut self) -> Result<(), RecognizeError> {
        if self.ctx.is_some() {
            tracing::debug!("Recognizer already initialized");
            return Ok(());
        }

        let model_path = resolve_model_path(&self.config.model)?;
        let path_str = model_path
            .to_str()
            .ok_or_else(|| RecognizeError::ModelNotFound("Invalid path".to_string()))?
            .to_string();

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let ctx = tokio::task::spawn_blocking(move || {
            WhisperContext::new_with_params(&path_str, WhisperContextParameters::default())
        })
        .await
        .map_err(|e| RecognizeError::InitFailed(e.to_string()))?
        .map_err(|e| RecognizeError::InitFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());
        self.ctx = Some(Arc::new(ctx));
        Ok(())
    }

    async fn start_session(
        &mut self,
    ) -> Result<mpsc::Receiver<Result<RecognitionEvent, RecognizeError>>, RecognizeError> {
        let ctx = self.ctx.clone().ok_or_else(|| {
            RecognizeError::InitFailed("model not loaded; initialize first".to_string())
        })?;

        if let Some(stale) = self.session.take() {
            tracing::warn!("Previous recognition session was not finalized, discarding");
            stale.partial_task.abort();
        }

        let (tx, rx) = mpsc::channel(32);
        let audio = Arc::new(Mutex::new(Vec::<f32>::new()));

        let partial_task = tokio::spawn(partial_loop(
            ctx,
            audio.clone(),
            tx.clone(),
            self.decode_opts(),
            Duration::from_millis(self.config.partial_interval_ms),
        ));

        self.session = Some(Session {
            audio,
            events: tx,
            partial_task,
            endpoint: EndpointDetector::new(
                self.config.endpoint_sensitivity,
                self.config.endpoint_silence_ms,
                SAMPLE_RATE,
            ),
        });

        tracing::debug!("Recognition session started");
        Ok(rx)
    }

    async fn feed(&mut self, chunk: &AudioChunk) -> Result<(), RecognizeError> {
        let session = self
            .session
            .as_mut()
            .ok_or(RecognizeError::SessionNotActive)?;

        if let Ok(mut guard) = session.audio.lock() {
            guard.extend_from_slice(&chunk.samples);
        }

        if session.endpoint.feed(&chunk.samples) {
            tracing::debug!("Endpoint detected in fed audio");
            // try_send: never block the control path on a slow consumer
            let _ = session.events.try_send(Ok(RecognitionEvent::Endpoint));
        }

        Ok(())
    }

    async fn stop_session(&mut self) -> Result<(), RecognizeError> {
        let Some(session) = self.session.take() else {
            tracing::warn!("stop_session called without an active session");
            return Ok(());
        };

        session.partial_task.abort();

        let snapshot = match session.audio.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        };

        let duration_secs = snapshot.len() as f32 / SAMPLE_RATE as f32;
        if snapshot.len() < MIN_DECODE_SAMPLES {
            tracing::debug!("Session too short ({:.2}s), no final result", duration_secs);
            return Ok(());
        }

        let ctx = self.ctx.clone().ok_or_else(|| {
            RecognizeError::InitFailed("model not loaded".to_string())
        })?;
        let opts = self.decode_opts();

        tracing::info!("Finalizing {:.1}s of audio", duration_secs);
        let text = tokio::task::spawn_blocking(move || decode(&ctx, &opts, &snapshot))
            .await
            .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))??;

        if text.is_empty() {
            tracing::debug!("Final decode produced no text");
        } else if session
            .events
            .send(Ok(RecognitionEvent::Final(text)))
            .await
            .is_err()
        {
            tracing::debug!("Event channel closed before final result");
        }

        Ok(())
    }
}

/// Re-decode the accumulated audio on an interval, emitting a `Partial`
/// whenever the text changes. Lives until aborted or a decode fails.
async fn partial_loop(
    ctx: Arc<WhisperContext>,
    audio: Arc<Mutex<Vec<f32>>>,
    events: mpsc::Sender<Result<RecognitionEvent, RecognizeError>>,
    opts: DecodeOpts,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // immediate first tick carries no audio

    let mut last_len = 0usize;
    let mut last_text = String::new();

    loop {
        ticker.tick().await;

        let snapshot = match audio.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => break,
        };

        if snapshot.len() < MIN_DECODE_SAMPLES || snapshot.len() == last_len {
            continue;
        }
        last_len = snapshot.len();

        let ctx = ctx.clone();
        let opts = opts.clone();
        let decoded = tokio::task::spawn_blocking(move || decode(&ctx, &opts, &snapshot)).await;

        match decoded {
            Ok(Ok(text)) => {
                if !text.is_empty() && text != last_text {
                    last_text = text.clone();
                    if events.send(Ok(RecognitionEvent::Partial(text))).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Partial decode failed: {}", e);
                let _ = events.send(Err(e)).await;
                break;
            }
            Err(_) => break,
        }
    }
}

/// One whisper decode of a full audio snapshot
fn decode(
    ctx: &WhisperContext,
    opts: &DecodeOpts,
    samples: &[f32],
) -> Result<String, RecognizeError> {
    if samples.is_empty() {
        return Ok(String::new());
    }

    let duration_secs = samples.len() as f32 / SAMPLE_RATE as f32;

    let mut state = ctx
        .create_state()
        .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

    if opts.language == "auto" {
        params.set_language(None);
    } else {
        params.set_language(Some(&opts.language));
    }

    params.set_translate(opts.translate);
    params.set_n_threads(opts.threads);

    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params.set_suppress_blank(true);
    params.set_suppress_nst(true);

    // Short clips decode faster and cleaner as a single segment
    if duration_secs < 30.0 {
        params.set_single_segment(true);
    }

    state
        .full(params, samples)
        .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))?;

    let mut text = String::new();
    for segment in state.as_iter() {
        text.push_str(
            segment
                .to_str()
                .map_err(|e| RecognizeError::InferenceFailed(e.to_string()))?,
        );
    }

    Ok(text.trim().to_string())
}

/// Resolve a model name or path to an on-disk model file
fn resolve_model_path(model: &str) -> Result<PathBuf, RecognizeError> {
    let path = if model.contains('/') {
        PathBuf::from(model)
    } else {
        Config::models_dir().join(format!("ggml-{}.bin", model))
    };

    if path.exists() {
        Ok(path)
    } else {
        Err(RecognizeError::ModelNotFound(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_model_path_used_verbatim() {
        let err = resolve_model_path("/nonexistent/model.bin").unwrap_err();
        assert!(matches!(err, RecognizeError::ModelNotFound(ref p) if p.contains("/nonexistent/model.bin")));
    }

    #[test]
    fn model_name_resolves_under_models_dir() {
        let err = resolve_model_path("definitely-not-downloaded").unwrap_err();
        assert!(
            matches!(err, RecognizeError::ModelNotFound(ref p) if p.contains("ggml-definitely-not-downloaded.bin"))
        );
    }
}
