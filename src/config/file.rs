//! TOML configuration file loading
//!
//! Supports `~/.config/datachat/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DatachatConfigFile {
    /// Dataset backend configuration
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Generation endpoint configuration
    #[serde(default)]
    pub generation: GenerationFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Dataset backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Backend base URL (e.g. "http://localhost:5000")
    pub url: Option<String>,
}

/// Generation endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    /// Endpoint base URL
    pub url: Option<String>,

    /// Model identifier (e.g. "gemini-2.5-flash-preview-05-20")
    pub model: Option<String>,

    /// Attempts per request, including the first
    pub max_attempts: Option<u32>,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Voices to prefer, in order
    pub voices: Option<Vec<String>>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub gemini: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `DatachatConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> DatachatConfigFile {
    config_file_path().map_or_else(DatachatConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> DatachatConfigFile {
    if !path.exists() {
        return DatachatConfigFile::default();
    }

    match parse_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            DatachatConfigFile::default()
        }
    }
}

/// Read and parse a TOML config file
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the file cannot be read, or [`crate::Error::Toml`] if
/// it is not valid config TOML
pub fn parse_config_file(path: &Path) -> Result<DatachatConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/datachat/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("datachat").join("config.toml"))
}
