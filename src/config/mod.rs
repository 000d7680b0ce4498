//! Configuration management for datachat

pub mod file;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::generation::RetryPolicy;
use crate::{Error, Result};

use file::DatachatConfigFile;

/// Default dataset backend
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Default generation endpoint base
pub const DEFAULT_GENERATION_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default generation model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// datachat configuration
#[derive(Debug)]
pub struct Config {
    /// Dataset backend base URL
    pub backend_url: Url,

    /// Generation endpoint configuration
    pub generation: GenerationConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys for the speech services
    pub api_keys: ApiKeys,
}

/// Generation endpoint configuration
#[derive(Debug)]
pub struct GenerationConfig {
    /// Endpoint base URL (models are addressed below it)
    pub base_url: Url,

    /// Model identifier
    pub model: String,

    /// Gemini API key, sent as the `key` query parameter
    pub api_key: Option<SecretString>,

    /// Attempt budget and backoff
    pub retry: RetryPolicy,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// Speech-to-text provider
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// Text-to-speech provider
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS speed multiplier
    pub tts_speed: f64,

    /// Voices to prefer, in order, when the platform offers them
    pub preferred_voices: Vec<String>,
}

/// API keys for speech services
#[derive(Debug, Default)]
pub struct ApiKeys {
    pub openai: Option<SecretString>,
    pub deepgram: Option<SecretString>,
    pub elevenlabs: Option<SecretString>,
}

/// Speech-to-text provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    #[default]
    Whisper,
    /// Deepgram
    Deepgram,
}

impl SttProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl fmt::Display for SttProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whisper => write!(f, "whisper"),
            Self::Deepgram => write!(f, "deepgram"),
        }
    }
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    /// `OpenAI` speech
    #[default]
    OpenAi,
    /// `ElevenLabs`
    ElevenLabs,
}

impl TtsProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "tts-1",
            Self::ElevenLabs => "eleven_turbo_v2",
        }
    }
}

impl fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::ElevenLabs => write!(f, "elevenlabs"),
        }
    }
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" | "eleven_labs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

fn parse_url(value: &str, what: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::Config(format!("invalid {what} URL {value:?}: {e}")))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn secret(value: Option<String>) -> Option<SecretString> {
    value.filter(|v| !v.is_empty()).map(SecretString::from)
}

impl Config {
    /// Load configuration from the config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a URL or provider name is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(None, false)
    }

    /// Load configuration with command-line overrides applied last
    ///
    /// # Errors
    ///
    /// Returns error if a URL or provider name is invalid
    pub fn load_with_options(backend_url: Option<&str>, disable_voice: bool) -> Result<Self> {
        // env > toml > default
        let fc = file::load_config_file();
        let mut config = Self::resolve(fc, |key| std::env::var(key).ok())?;

        if let Some(url) = backend_url {
            config.backend_url = parse_url(url, "backend")?;
        }
        if disable_voice {
            config.voice.enabled = false;
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        Ok(config)
    }

    /// Combine a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if a URL or provider name is invalid
    pub fn resolve(fc: DatachatConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend_url = env("DATACHAT_BACKEND_URL")
            .or(fc.backend.url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let generation_url = env("DATACHAT_GENERATION_URL")
            .or(fc.generation.url)
            .unwrap_or_else(|| DEFAULT_GENERATION_URL.to_string());

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: fc.generation.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_delay: fc
                .generation
                .initial_delay_ms
                .map_or(defaults.initial_delay, Duration::from_millis),
        };

        let generation = GenerationConfig {
            base_url: parse_url(&generation_url, "generation")?,
            model: env("DATACHAT_MODEL")
                .or(fc.generation.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: secret(env("GEMINI_API_KEY").or(fc.api_keys.gemini)),
            retry,
        };

        let api_keys = ApiKeys {
            openai: secret(env("OPENAI_API_KEY").or(fc.api_keys.openai)),
            deepgram: secret(env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram)),
            elevenlabs: secret(env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs)),
        };

        let stt_provider: SttProvider = env("DATACHAT_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map(|p| p.parse())
            .transpose()?
            .unwrap_or_default();
        let tts_provider: TtsProvider = env("DATACHAT_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map(|p| p.parse())
            .transpose()?
            .unwrap_or_default();

        let preferred_voices = env("DATACHAT_TTS_VOICES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
                    .collect()
            })
            .or(fc.voice.voices)
            .unwrap_or_default();

        let disabled = env("DATACHAT_DISABLE_VOICE").is_some_and(|v| parse_flag(&v));
        let voice = VoiceConfig {
            enabled: !disabled && fc.voice.enabled.unwrap_or(true),
            stt_provider,
            stt_model: fc
                .voice
                .stt_model
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            tts_provider,
            tts_model: fc
                .voice
                .tts_model
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            preferred_voices,
        };

        Ok(Self {
            backend_url: parse_url(&backend_url, "backend")?,
            generation,
            voice,
            api_keys,
        })
    }

    /// Key for the configured STT provider, if any
    #[must_use]
    pub fn stt_api_key(&self) -> Option<&SecretString> {
        match self.voice.stt_provider {
            SttProvider::Whisper => self.api_keys.openai.as_ref(),
            SttProvider::Deepgram => self.api_keys.deepgram.as_ref(),
        }
    }

    /// Key for the configured TTS provider, if any
    #[must_use]
    pub fn tts_api_key(&self) -> Option<&SecretString> {
        match self.voice.tts_provider {
            TtsProvider::OpenAi => self.api_keys.openai.as_ref(),
            TtsProvider::ElevenLabs => self.api_keys.elevenlabs.as_ref(),
        }
    }
}
