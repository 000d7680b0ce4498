//! Error types for datachat

use thiserror::Error;

/// Result type alias for datachat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in datachat
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Platform lacks a speech capability (recognition or synthesis)
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Speech capture or recognition failed
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis or playback failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Dataset summary could not be fetched
    #[error("summary unavailable: {0}")]
    SummaryUnavailable(String),

    /// Dataset upload was rejected or failed
    #[error("upload failed: {0}")]
    UploadFailed(String),

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
