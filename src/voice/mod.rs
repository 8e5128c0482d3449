//! Voice input and output
//!
//! The controller talks to the patient through two capabilities:
//! a [`Listener`] that yields at most one recognized [`Utterance`] per call,
//! and a [`Speaker`] that reads a prompt aloud and returns once it has been
//! played. [`Microphone`] and [`VoiceOutput`] are the hardware-backed
//! implementations; the console pair stands in when voice is disabled.

mod capture;
mod console;
mod playback;
mod segmenter;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use console::{ConsoleListener, ConsoleSpeaker};
pub use playback::AudioPlayback;
pub use segmenter::{SegmenterState, UtteranceSegmenter, rms_energy};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

/// How often the microphone buffer is drained into the segmenter
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A recognized phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub at: DateTime<Local>,
}

impl Utterance {
    /// Utterance stamped with the current local time
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            at: Local::now(),
        }
    }

    /// Case-insensitive substring test
    #[must_use]
    pub fn mentions(&self, word: &str) -> bool {
        self.text.to_lowercase().contains(&word.to_lowercase())
    }
}

/// Speech recognition capability
///
/// The controller owns the listener exclusively and brackets every
/// recognition attempt with `resume` and `pause`.
#[async_trait(?Send)]
pub trait Listener {
    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be started
    fn resume(&mut self) -> Result<()>;

    /// Stop capturing audio
    fn pause(&mut self);

    /// Wait for one utterance
    ///
    /// `Ok(None)` means nothing was recognized in the sampling window.
    ///
    /// # Errors
    ///
    /// Returns error if capture or transcription fails
    async fn listen(&mut self) -> Result<Option<Utterance>>;
}

/// Speech synthesis capability
#[async_trait(?Send)]
pub trait Speaker {
    /// Say `text`, returning after playback completes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn say(&mut self, text: &str) -> Result<()>;
}

/// Microphone listener: capture, segment, transcribe
pub struct Microphone {
    capture: AudioCapture,
    segmenter: UtteranceSegmenter,
    stt: SpeechToText,
    listen_window: Duration,
}

impl Microphone {
    /// Open the default microphone and the configured STT backend
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the STT key is missing
    pub fn new(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let stt = SpeechToText::from_model(
            &voice.stt_model,
            &voice.language,
            keys.openai.as_deref(),
            keys.deepgram.as_deref(),
        )?;
        Ok(Self {
            capture: AudioCapture::new()?,
            segmenter: UtteranceSegmenter::new(),
            stt,
            listen_window: Duration::from_millis(voice.listen_window_ms),
        })
    }
}

#[async_trait(?Send)]
impl Listener for Microphone {
    fn resume(&mut self) -> Result<()> {
        self.segmenter.reset();
        self.capture.resume()
    }

    fn pause(&mut self) {
        self.capture.pause();
        self.segmenter.reset();
    }

    async fn listen(&mut self) -> Result<Option<Utterance>> {
        if !self.capture.is_recording() {
            return Err(Error::Audio("listen called while microphone is paused".to_string()));
        }

        let started = Instant::now();
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let chunk = self.capture.drain();
            if let Some(speech) = self.segmenter.push(&chunk) {
                let wav = samples_to_wav(&speech, SAMPLE_RATE)?;
                let text = self.stt.transcribe(&wav).await?;
                if text.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Utterance::new(text)));
            }

            // Once speech has started, wait for it to finish
            if !self.segmenter.is_speaking() && started.elapsed() >= self.listen_window {
                return Ok(None);
            }
        }
    }
}

/// Speaker backed by TTS and the default output device
pub struct VoiceOutput {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl VoiceOutput {
    /// Open the default output device and the configured TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the TTS key is missing
    pub fn new(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let tts = TextToSpeech::from_model(
            &voice.tts_model,
            &voice.tts_voice,
            voice.tts_speed,
            keys.openai.as_deref(),
            keys.elevenlabs.as_deref(),
        )?;
        Ok(Self {
            tts,
            playback: AudioPlayback::new()?,
        })
    }
}

#[async_trait(?Send)]
impl Speaker for VoiceOutput {
    async fn say(&mut self, text: &str) -> Result<()> {
        tracing::info!(text, "speaking");
        let mp3 = self.tts.synthesize(text).await?;
        self.playback.play_mp3(&mp3)
    }
}
