//! Energy-based utterance segmentation
//!
//! Splits the microphone stream into single utterances: speech starts when a
//! chunk's RMS energy crosses the threshold and ends after a run of quiet
//! samples. Segments too short to hold a word are discarded.

/// Minimum RMS energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Shortest segment worth transcribing (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that closes a segment (0.5s at 16kHz)
const SILENCE_SAMPLES: usize = 8000;

/// Longest segment before it is force-closed (15s at 16kHz)
const MAX_SPEECH_SAMPLES: usize = 240_000;

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// No speech yet
    Quiet,
    /// Inside an utterance
    Speaking,
}

/// Accumulates one utterance at a time
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmenterState,
    speech: Vec<f32>,
    silence: usize,
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmenterState::Quiet,
            speech: Vec::new(),
            silence: 0,
        }
    }

    /// Feed a chunk of samples
    ///
    /// Returns the finished utterance once trailing silence closes it.
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let energy = rms_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Quiet => {
                if is_speech {
                    tracing::trace!(energy, "speech started");
                    self.state = SegmenterState::Speaking;
                    self.speech.clear();
                    self.speech.extend_from_slice(samples);
                    self.silence = 0;
                }
                None
            }
            SegmenterState::Speaking => {
                self.speech.extend_from_slice(samples);
                if is_speech {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                let closed = self.silence > SILENCE_SAMPLES;
                if (closed || self.speech.len() >= MAX_SPEECH_SAMPLES)
                    && self.speech.len() > MIN_SPEECH_SAMPLES + self.silence
                {
                    tracing::debug!(samples = self.speech.len(), "utterance complete");
                    let utterance = std::mem::take(&mut self.speech);
                    self.reset();
                    return Some(utterance);
                }

                if closed {
                    tracing::trace!("segment too short, discarded");
                    self.reset();
                }
                None
            }
        }
    }

    /// Whether an utterance is in progress
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == SegmenterState::Speaking
    }

    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Drop any partial utterance
    pub fn reset(&mut self) {
        self.state = SegmenterState::Quiet;
        self.speech.clear();
        self.silence = 0;
    }
}

/// RMS energy of a chunk
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
