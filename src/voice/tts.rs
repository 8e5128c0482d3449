//! Text-to-speech over OpenAI or ElevenLabs

use serde::Serialize;

use crate::{Error, Result};

/// Model used when an ElevenLabs voice is configured without a model
const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    OpenAi,
    ElevenLabs,
}

/// Synthesizes Italian prompts to MP3
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    backend: Backend,
}

impl TextToSpeech {
    /// Pick a backend from the model name
    ///
    /// `elevenlabs` or `elevenlabs/<model>` selects ElevenLabs (where `voice`
    /// is a voice id), anything else is an `OpenAI` speech model.
    ///
    /// # Errors
    ///
    /// Returns error if the chosen backend's API key is missing
    pub fn from_model(
        model: &str,
        voice: &str,
        speed: f32,
        openai_key: Option<&str>,
        elevenlabs_key: Option<&str>,
    ) -> Result<Self> {
        let (backend, model, key, who) = if model == "elevenlabs" {
            (
                Backend::ElevenLabs,
                DEFAULT_ELEVENLABS_MODEL,
                elevenlabs_key,
                "ElevenLabs",
            )
        } else if let Some(m) = model.strip_prefix("elevenlabs/") {
            (Backend::ElevenLabs, m, elevenlabs_key, "ElevenLabs")
        } else {
            (Backend::OpenAi, model, openai_key, "OpenAI")
        };

        let api_key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("{who} API key required for TTS")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            voice: voice.to_string(),
            speed: speed.clamp(0.25, 4.0),
            model: model.to_string(),
            backend,
        })
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.chars().count(), backend = ?self.backend, "synthesizing");
        match self.backend {
            Backend::OpenAi => self.openai(text).await,
            Backend::ElevenLabs => self.elevenlabs(text).await,
        }
    }

    async fn openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: self.speed,
                response_format: "mp3",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let response = self
            .client
            .post(format!(
                "https://api.elevenlabs.io/v1/text-to-speech/{}",
                self.voice
            ))
            .header("xi-api-key", &self.api_key)
            .json(&ElevenLabsRequest {
                text,
                model_id: &self.model,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
