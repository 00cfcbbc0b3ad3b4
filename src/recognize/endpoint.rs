//! Energy-based endpoint detection
//!
//! Tracks frame RMS energy across fed audio and reports an endpoint once
//! speech has been followed by a configured span of trailing silence.
//! Re-arms when speech resumes, so each speech burst yields at most one
//! endpoint.

/// Detects end-of-utterance from trailing silence after speech.
pub struct EndpointDetector {
    /// RMS energy above this counts as speech
    threshold: f32,
    /// Silence span that constitutes an endpoint, in frames
    silence_frames_needed: u32,
    sample_rate: u32,
    consecutive_silent: u32,
    heard_speech: bool,
}

/// Analysis frame length in milliseconds
const FRAME_MS: u32 = 20;

impl EndpointDetector {
    /// `sensitivity` is 0.0 (detect whispers) to 1.0 (loud speech only).
    pub fn new(sensitivity: f32, silence_ms: u64, sample_rate: u32) -> Self {
        Self {
            threshold: map_sensitivity_to_energy(sensitivity),
            silence_frames_needed: (silence_ms as u32 / FRAME_MS).max(1),
            sample_rate,
            consecutive_silent: 0,
            heard_speech: false,
        }
    }

    /// Feed samples; returns true once when an endpoint is detected.
    pub fn feed(&mut self, samples: &[f32]) -> bool {
        let frame_size = (self.sample_rate * FRAME_MS / 1000) as usize;
        if frame_size == 0 {
            return false;
        }

        let mut fired = false;
        for frame in samples.chunks(frame_size) {
            let energy = rms(frame);
            if energy >= self.threshold {
                self.heard_speech = true;
                self.consecutive_silent = 0;
            } else if self.heard_speech {
                self.consecutive_silent += 1;
                if self.consecutive_silent >= self.silence_frames_needed {
                    fired = true;
                    // re-arm for the next speech burst
                    self.heard_speech = false;
                    self.consecutive_silent = 0;
                }
            }
        }
        fired
    }

    /// Reset for a new session
    pub fn reset(&mut self) {
        self.consecutive_silent = 0;
        self.heard_speech = false;
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Map sensitivity (0.0-1.0) to an RMS energy threshold.
///
/// Exponential: 0.0 -> ~0.001 (whispers), 0.5 -> ~0.01, 1.0 -> ~0.1.
fn map_sensitivity_to_energy(sensitivity: f32) -> f32 {
    let t = sensitivity.clamp(0.0, 1.0);
    0.001 * (100.0_f32).powf(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn speech(ms: u32) -> Vec<f32> {
        // loud square-ish signal, RMS well above any threshold
        vec![0.5; (RATE * ms / 1000) as usize]
    }

    fn silence(ms: u32) -> Vec<f32> {
        vec![0.0; (RATE * ms / 1000) as usize]
    }

    #[test]
    fn silence_alone_never_fires() {
        let mut detector = EndpointDetector::new(0.5, 400, RATE);
        assert!(!detector.feed(&silence(2000)));
    }

    #[test]
    fn speech_then_silence_fires_once() {
        let mut detector = EndpointDetector::new(0.5, 400, RATE);
        assert!(!detector.feed(&speech(500)));
        assert!(detector.feed(&silence(600)));
        // already fired, stays quiet until speech resumes
        assert!(!detector.feed(&silence(2000)));
    }

    #[test]
    fn short_pause_does_not_fire() {
        let mut detector = EndpointDetector::new(0.5, 800, RATE);
        assert!(!detector.feed(&speech(300)));
        assert!(!detector.feed(&silence(200)));
        assert!(!detector.feed(&speech(300)));
    }

    #[test]
    fn rearms_after_new_speech() {
        let mut detector = EndpointDetector::new(0.5, 400, RATE);
        detector.feed(&speech(300));
        assert!(detector.feed(&silence(600)));
        detector.feed(&speech(300));
        assert!(detector.feed(&silence(600)));
    }

    #[test]
    fn reset_clears_state() {
        let mut detector = EndpointDetector::new(0.5, 400, RATE);
        detector.feed(&speech(300));
        detector.reset();
        assert!(!detector.feed(&silence(1000)));
    }

    #[test]
    fn sensitivity_mapping_is_monotonic() {
        assert!(map_sensitivity_to_energy(0.0) < map_sensitivity_to_energy(0.5));
        assert!(map_sensitivity_to_energy(0.5) < map_sensitivity_to_energy(1.0));
    }
}
