//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input.
//! Works with PipeWire, PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so the stream lives on a dedicated
//! thread and communicates via channels.

use super::{AudioCapture, AudioChunk};
use crate::config::AudioConfig;
use crate::error::CaptureError;
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<()>),
}

/// Parameters for building an audio input stream
struct StreamBuildParams {
    tx: mpsc::Sender<Result<AudioChunk, CaptureError>>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
    chunk_frames: usize,
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    config: AudioConfig,
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
        }
    }
}

/// Find an audio input device by name.
///
/// Tries an exact match first, then a case-insensitive substring match,
/// so both full cpal names and PipeWire short names work.
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::Connection(e.to_string()))?
        .collect();

    let search_lower = device_name.to_lowercase();

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_name || name.to_lowercase().contains(&search_lower) {
                tracing::debug!("Found audio device: {}", name);
                return Ok(device);
            }
        }
    }

    Err(CaptureError::DeviceNotFound(device_name.to_string()))
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(
        &mut self,
    ) -> Result<mpsc::Receiver<Result<AudioChunk, CaptureError>>, CaptureError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();

        let device = if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| CaptureError::DeviceNotFound("default".to_string()))?
        } else {
            find_audio_device(&host, &self.config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| CaptureError::Connection(e.to_string()))?;

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_sample_rate,
            source_channels,
            sample_format
        );

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();

        let target_rate = self.config.sample_rate;
        let chunk_frames = self.config.chunk_frames();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_tx = chunk_tx.clone();
            let err_fn = move |err: cpal::StreamError| {
                tracing::error!("Audio stream error: {}", err);
                let _ = err_tx.try_send(Err(CaptureError::Stream(err.to_string())));
            };

            let params = StreamBuildParams {
                tx: chunk_tx,
                source_rate: source_sample_rate,
                target_rate,
                source_channels,
                chunk_frames,
            };

            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, params, err_fn),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, params, err_fn),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, params, err_fn),
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    return;
                }
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build audio stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                return;
            }

            tracing::debug!("Audio capture thread started");

            if let Ok(CaptureCommand::Stop(ack)) = cmd_rx.recv() {
                drop(stream);
                let _ = ack.send(());
            }

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(chunk_rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let (ack_tx, ack_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(ack_tx)).is_ok() {
                match tokio::time::timeout(std::time::Duration::from_secs(2), ack_rx).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        return Err(CaptureError::Stream("capture thread exited".to_string()))
                    }
                    Err(_) => return Err(CaptureError::StopTimeout(2)),
                }
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        tracing::debug!("Audio capture stopped");
        Ok(())
    }
}

/// Build an input stream for a specific sample type.
///
/// The callback mixes to mono, resamples to the target rate, and slices
/// the result into fixed-size chunks before pushing them downstream.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        tx,
        source_rate,
        target_rate,
        source_channels,
        chunk_frames,
    } = params;

    let mut pending: Vec<f32> = Vec::with_capacity(chunk_frames * 2);

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Mix to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                pending.extend_from_slice(&resampled);

                // Emit fixed-size chunks; drop on a full channel rather than
                // block the audio callback
                while pending.len() >= chunk_frames {
                    let samples: Vec<f32> = pending.drain(..chunk_frames).collect();
                    let _ = tx.try_send(Ok(AudioChunk::mono(samples, target_rate)));
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let result = resample(&samples, 16000, 16000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let result = resample(&samples, 48000, 16000);
        assert!(result.len() >= 2 && result.len() <= 4);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = vec![1.0, 2.0];
        let result = resample(&samples, 8000, 16000);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_resample_empty() {
        let samples: Vec<f32> = vec![];
        let result = resample(&samples, 48000, 16000);
        assert!(result.is_empty());
    }
}
