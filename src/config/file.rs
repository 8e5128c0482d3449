//! TOML configuration file loading
//!
//! Supports `~/.config/care-companion/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CareConfigFile {
    /// Data file locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Camera configuration
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Text recognition configuration
    #[serde(default)]
    pub ocr: OcrFileConfig,

    /// Dialogue keywords and retry bounds
    #[serde(default)]
    pub dialogue: DialogueFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Telegram gateway settings
    #[serde(default)]
    pub telegram: TelegramFileConfig,
}

/// Where the registry, plans and photos live
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    /// Base directory for everything below
    pub data_dir: Option<String>,

    /// Patient registry file
    pub registry: Option<String>,

    /// Directory holding one `<day>.toml` plan per weekday
    pub therapy_plan_dir: Option<String>,

    /// Directory for box photos, one subdirectory per weekday
    pub photo_dir: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone and speaker
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1", "deepgram/nova-2")
    pub stt_model: Option<String>,

    /// ISO-639-1 language hint for STT
    pub language: Option<String>,

    /// TTS model (e.g. "tts-1", "elevenlabs/eleven_multilingual_v2")
    pub tts_model: Option<String>,

    /// TTS voice identifier
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// How long one poll may wait for speech to start, in milliseconds
    pub listen_window_ms: Option<u64>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Video device index
    pub device: Option<u32>,

    /// Capture program
    pub command: Option<String>,

    /// Capture arguments, `{device}` and `{output}` are substituted
    pub args: Option<Vec<String>>,
}

/// Text recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct OcrFileConfig {
    /// "tesseract" or "vision"
    pub backend: Option<String>,

    /// Tesseract language pack
    pub language: Option<String>,

    /// Minimum partial-similarity score (0-100) for a box to match
    pub threshold: Option<u8>,
}

/// Dialogue configuration
#[derive(Debug, Default, Deserialize)]
pub struct DialogueFileConfig {
    pub help_keyword: Option<String>,
    pub photo_cue: Option<String>,
    pub next_cue: Option<String>,

    /// Re-prompts allowed for feeling and yes/no answers (absent = unbounded)
    pub max_clarifications: Option<u32>,

    /// Captures allowed per medication box (absent = unbounded)
    pub max_verification_attempts: Option<u32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
    pub telegram: Option<String>,
}

/// Telegram gateway configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelegramFileConfig {
    /// Relay polling interval in seconds
    pub poll_interval_secs: Option<u64>,

    /// Attach the day's box photos to recap messages
    pub send_photos: Option<bool>,
}

/// Load the TOML config file
///
/// Reads `explicit` when given, otherwise the standard path. Returns
/// `CareConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(explicit: Option<&Path>) -> CareConfigFile {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config_file_path) else {
        return CareConfigFile::default();
    };

    if !path.exists() {
        if explicit.is_some() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
        return CareConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            CareConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CareConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> crate::Result<CareConfigFile> {
    let config: CareConfigFile = toml::from_str(content)?;
    tracing::info!("loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/care-companion/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("care-companion").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let fc = parse_config("").unwrap();
        assert!(fc.voice.enabled.is_none());
        assert!(fc.dialogue.max_clarifications.is_none());
    }

    #[test]
    fn partial_sections_parse() {
        let fc = parse_config(
            r#"
            [paths]
            data_dir = "/srv/care"

            [camera]
            device = 2
            args = ["-d", "/dev/video{device}", "{output}"]

            [dialogue]
            max_verification_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(fc.paths.data_dir.as_deref(), Some("/srv/care"));
        assert_eq!(fc.camera.device, Some(2));
        assert_eq!(fc.camera.args.unwrap().len(), 3);
        assert_eq!(fc.dialogue.max_verification_attempts, Some(5));
        assert!(fc.ocr.backend.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_config("[voice\nenabled = true").is_err());
    }
}
