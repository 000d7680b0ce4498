//! Energy-based end-of-utterance detection for capture sessions

use super::capture::SAMPLE_RATE;

/// RMS level above which a chunk counts as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Shortest utterance worth transcribing (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.8s)
const END_SILENCE_SAMPLES: usize = 12800;

/// Silence allowed before any speech is heard (8s)
const NO_SPEECH_TIMEOUT_SAMPLES: usize = SAMPLE_RATE as usize * 8;

/// Longest utterance kept (30s)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// Result of feeding a chunk to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Keep feeding audio
    Pending,
    /// Speech followed by enough silence; take the utterance
    Complete,
    /// Nothing was said before the timeout
    NoSpeech,
}

/// Accumulates one utterance and reports when it is finished
#[derive(Debug, Default)]
pub struct UtteranceDetector {
    speech: Vec<f32>,
    heard_speech: bool,
    silence: usize,
    waited: usize,
}

impl UtteranceDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed captured samples
    pub fn push(&mut self, samples: &[f32]) -> Endpoint {
        if samples.is_empty() {
            return Endpoint::Pending;
        }

        let is_speech = rms(samples) > ENERGY_THRESHOLD;

        if !self.heard_speech {
            if !is_speech {
                self.waited += samples.len();
                return if self.waited > NO_SPEECH_TIMEOUT_SAMPLES {
                    Endpoint::NoSpeech
                } else {
                    Endpoint::Pending
                };
            }
            self.heard_speech = true;
            tracing::trace!("speech onset");
        }

        self.speech.extend_from_slice(samples);
        if is_speech {
            self.silence = 0;
        } else {
            self.silence += samples.len();
        }

        if self.speech.len() >= MAX_UTTERANCE_SAMPLES {
            return Endpoint::Complete;
        }

        if self.silence > END_SILENCE_SAMPLES {
            if self.speech.len() > MIN_SPEECH_SAMPLES + self.silence {
                tracing::debug!(samples = self.speech.len(), "utterance complete");
                return Endpoint::Complete;
            }
            // Too short to be an utterance; keep waiting for real speech
            self.waited += self.speech.len();
            self.reset_speech();
        }

        Endpoint::Pending
    }

    /// Take the accumulated utterance
    pub fn take(&mut self) -> Vec<f32> {
        let speech = std::mem::take(&mut self.speech);
        self.reset_speech();
        speech
    }

    /// Samples accumulated so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.speech.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.speech.is_empty()
    }

    fn reset_speech(&mut self) {
        self.speech.clear();
        self.heard_speech = false;
        self.silence = 0;
    }
}

/// RMS energy of a chunk
#[allow(clippy::cast_precision_loss)]
fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
