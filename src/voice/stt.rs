//! Speech-to-text over Whisper or Deepgram

use serde::Deserialize;

use crate::{Error, Result};

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    Whisper,
    Deepgram,
}

/// Transcribes WAV audio with a language hint
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
    backend: Backend,
}

impl SpeechToText {
    /// Pick a backend from the model name
    ///
    /// `deepgram/<model>` selects Deepgram, anything else is sent to Whisper.
    ///
    /// # Errors
    ///
    /// Returns error if the chosen backend's API key is missing
    pub fn from_model(
        model: &str,
        language: &str,
        openai_key: Option<&str>,
        deepgram_key: Option<&str>,
    ) -> Result<Self> {
        let (backend, model, key, who) = match model.strip_prefix("deepgram/") {
            Some(m) => (Backend::Deepgram, m, deepgram_key, "Deepgram"),
            None => (Backend::Whisper, model, openai_key, "OpenAI"),
        };

        let api_key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("{who} API key required for STT")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            language: language.to_string(),
            backend,
        })
    }

    /// Transcribe WAV bytes
    ///
    /// An empty string means nothing intelligible was said.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), backend = ?self.backend, "transcribing");
        let text = match self.backend {
            Backend::Whisper => self.whisper(wav).await?,
            Backend::Deepgram => self.deepgram(wav).await?,
        };
        let text = text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }

    async fn whisper(&self, wav: &[u8]) -> Result<String> {
        let file = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }

    async fn deepgram(&self, wav: &[u8]) -> Result<String> {
        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&language={}&punctuate=true",
            self.model, self.language
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(wav.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;
        Ok(result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_prefix_selects_backend() {
        let stt = SpeechToText::from_model("deepgram/nova-2", "it", None, Some("dg")).unwrap();
        assert_eq!(stt.backend, Backend::Deepgram);
        assert_eq!(stt.model, "nova-2");

        let stt = SpeechToText::from_model("whisper-1", "it", Some("sk"), None).unwrap();
        assert_eq!(stt.backend, Backend::Whisper);
    }

    #[test]
    fn missing_key_is_config_error() {
        assert!(matches!(
            SpeechToText::from_model("whisper-1", "it", None, Some("dg")),
            Err(Error::Config(_))
        ));
        assert!(SpeechToText::from_model("deepgram/nova-2", "it", Some("sk"), Some("")).is_err());
    }

    #[test]
    fn deepgram_payload_parses() {
        let body = r#"{"results":{"channels":[{"alternatives":[{"transcript":"foto"}]}]}}"#;
        let parsed: DeepgramResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.channels[0].alternatives[0].transcript, "foto");
    }
}
