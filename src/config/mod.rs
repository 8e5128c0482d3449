//! Configuration management for the care companion

pub mod file;

use std::path::{Path, PathBuf};

use crate::controller::DialogueSettings;
use crate::{Error, Result};

/// Care companion configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (registry, plans, photos)
    pub data_dir: PathBuf,

    /// Patient registry file
    pub registry_path: PathBuf,

    /// Directory with one therapy plan file per weekday
    pub plan_dir: PathBuf,

    /// Directory where captured box photos are archived
    pub photo_dir: PathBuf,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Camera configuration
    pub camera: CameraConfig,

    /// Text recognition configuration
    pub ocr: OcrConfig,

    /// Dialogue keywords and retry bounds
    pub dialogue: DialogueSettings,

    /// API keys
    pub api_keys: ApiKeys,

    /// Telegram gateway configuration
    pub telegram: TelegramConfig,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone and speaker
    pub enabled: bool,

    /// STT model (e.g. "whisper-1", "deepgram/nova-2")
    pub stt_model: String,

    /// Language hint passed to STT
    pub language: String,

    /// TTS model (e.g. "tts-1", "elevenlabs/eleven_multilingual_v2")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// How long one idle poll waits for speech to start, in milliseconds
    pub listen_window_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_model: "whisper-1".to_string(),
            language: "it".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 0.9,
            listen_window_ms: 3000,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Video device index
    pub device: u32,

    /// Capture program
    pub command: String,

    /// Capture arguments, `{device}` and `{output}` are substituted
    pub args: Vec<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            command: "fswebcam".to_string(),
            args: [
                "-q",
                "--no-banner",
                "-d",
                "/dev/video{device}",
                "-r",
                "1280x720",
                "--jpeg",
                "90",
                "{output}",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// Which engine reads text off medication boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrBackend {
    /// Local `tesseract` binary
    #[default]
    Tesseract,
    /// Anthropic vision API
    Vision,
}

impl std::str::FromStr for OcrBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "vision" | "anthropic" => Ok(Self::Vision),
            other => Err(Error::Config(format!("unknown OCR backend: {other}"))),
        }
    }
}

/// Text recognition configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Recognition engine
    pub backend: OcrBackend,

    /// Tesseract language pack
    pub language: String,

    /// Minimum partial-similarity score (0-100)
    pub threshold: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Tesseract,
            language: "ita".to_string(),
            threshold: crate::vision::DEFAULT_THRESHOLD,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `Anthropic` API key (vision OCR)
    pub anthropic: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// Telegram bot token
    pub telegram: Option<String>,
}

/// Telegram gateway configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Relay polling interval in seconds
    pub poll_interval_secs: u64,

    /// Attach the day's box photos to recap messages
    pub send_photos: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1,
            send_photos: true,
        }
    }
}

/// Default data directory: `~/.local/share/care-companion` on Linux
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "care", "care-companion")
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().to_path_buf())
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_options(config_path, false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load_with_options(config_path: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file(config_path);

        let data_dir = std::env::var("CARE_DATA_DIR")
            .ok()
            .or(fc.paths.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let registry_path = fc
            .paths
            .registry
            .map_or_else(|| data_dir.join("patient.toml"), PathBuf::from);
        let plan_dir = fc
            .paths
            .therapy_plan_dir
            .map_or_else(|| data_dir.join("therapy_plan"), PathBuf::from);
        let photo_dir = fc
            .paths
            .photo_dir
            .map_or_else(|| data_dir.join("medications"), PathBuf::from);

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            anthropic: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .or(fc.api_keys.anthropic),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            telegram: std::env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .or(fc.api_keys.telegram),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_model: std::env::var("CARE_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or(voice_defaults.stt_model),
            language: fc.voice.language.unwrap_or(voice_defaults.language),
            tts_model: std::env::var("CARE_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or(voice_defaults.tts_model),
            tts_voice: fc.voice.tts_voice.unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(voice_defaults.tts_speed),
            listen_window_ms: fc
                .voice
                .listen_window_ms
                .unwrap_or(voice_defaults.listen_window_ms),
        };

        let camera_defaults = CameraConfig::default();
        let camera = CameraConfig {
            device: std::env::var("CARE_CAMERA_DEVICE")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.camera.device)
                .unwrap_or(camera_defaults.device),
            command: fc.camera.command.unwrap_or(camera_defaults.command),
            args: fc.camera.args.unwrap_or(camera_defaults.args),
        };

        let ocr_defaults = OcrConfig::default();
        let ocr = OcrConfig {
            backend: fc
                .ocr
                .backend
                .as_deref()
                .map(str::parse)
                .transpose()?
                .unwrap_or(ocr_defaults.backend),
            language: fc.ocr.language.unwrap_or(ocr_defaults.language),
            threshold: fc.ocr.threshold.unwrap_or(ocr_defaults.threshold),
        };
        if ocr.threshold > 100 {
            return Err(Error::Config(format!(
                "OCR threshold must be within 0-100, got {}",
                ocr.threshold
            )));
        }

        let mut dialogue = DialogueSettings::default();
        if let Some(word) = fc.dialogue.help_keyword {
            dialogue.help_keyword = word.to_lowercase();
        }
        if let Some(word) = fc.dialogue.photo_cue {
            dialogue.photo_cue = word.to_lowercase();
        }
        if let Some(word) = fc.dialogue.next_cue {
            dialogue.next_cue = word.to_lowercase();
        }
        dialogue.max_clarifications = fc.dialogue.max_clarifications;
        dialogue.max_verification_attempts = fc.dialogue.max_verification_attempts;

        let telegram_defaults = TelegramConfig::default();
        let telegram = TelegramConfig {
            poll_interval_secs: fc
                .telegram
                .poll_interval_secs
                .unwrap_or(telegram_defaults.poll_interval_secs),
            send_photos: fc
                .telegram
                .send_photos
                .unwrap_or(telegram_defaults.send_photos),
        };

        Ok(Self {
            data_dir,
            registry_path,
            plan_dir,
            photo_dir,
            voice,
            camera,
            ocr,
            dialogue,
            api_keys,
            telegram,
        })
    }
}
