//! Error types for the care companion

use thiserror::Error;

/// Result type alias for care companion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the care companion
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Patient registry could not be loaded
    #[error("registry error: {0}")]
    Registry(String),

    /// No therapy plan could be produced for the day. Fatal for the controller
    #[error("schedule unavailable for {day}: {reason}")]
    ScheduleUnavailable {
        /// Lowercase English weekday
        day: String,
        /// Why the provider failed
        reason: String,
    },

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Camera could not be opened or a frame could not be read
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Text recognition error
    #[error("vision error: {0}")]
    Vision(String),

    /// Channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// A caregiver message could not be delivered
    #[error("notification to {chat_id} failed: {reason}")]
    NotificationDeliveryFailed {
        /// Destination chat
        chat_id: String,
        /// Underlying failure
        reason: String,
    },

    /// Malformed caregiver command
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
