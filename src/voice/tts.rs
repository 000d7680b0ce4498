//! Cloud text-to-speech used behind speaker playback

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::config::TtsProvider;
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Voices offered by the `OpenAI` speech endpoint
pub const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Turns assistant text into MP3 audio
pub struct SpeechSynthesis {
    client: reqwest::Client,
    provider: TtsProvider,
    api_key: SecretString,
    model: String,
    speed: f64,
    voices: Vec<String>,
    base_url: String,
}

impl std::fmt::Debug for SpeechSynthesis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechSynthesis")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("voices", &self.voices)
            .finish_non_exhaustive()
    }
}

impl SpeechSynthesis {
    /// Create a synthesizer for `provider`
    ///
    /// `voices` lists extra voice identifiers the account offers (`ElevenLabs`
    /// voice ids); `OpenAI` voices are always available.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty, or `ElevenLabs` has no voice
    pub fn new(
        provider: TtsProvider,
        api_key: SecretString,
        model: String,
        speed: f64,
        voices: Vec<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider} API key required for TTS")));
        }

        let (base_url, voices) = match provider {
            TtsProvider::OpenAi => {
                let mut all: Vec<String> = OPENAI_VOICES.iter().map(ToString::to_string).collect();
                all.extend(voices.into_iter().filter(|v| !OPENAI_VOICES.contains(&v.as_str())));
                (OPENAI_BASE_URL, all)
            }
            TtsProvider::ElevenLabs => {
                if voices.is_empty() {
                    return Err(Error::Config(
                        "ElevenLabs requires at least one voice id".to_string(),
                    ));
                }
                (ELEVENLABS_BASE_URL, voices)
            }
        };

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
            speed,
            voices,
            base_url: base_url.to_string(),
        })
    }

    /// Point requests at a different host (used against mock servers)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Voices this synthesizer can speak with
    #[must_use]
    pub fn voices(&self) -> &[String] {
        &self.voices
    }

    /// Voice used when no preference matched
    #[must_use]
    pub fn default_voice(&self) -> &str {
        self.voices.first().map_or("alloy", String::as_str)
    }

    /// Synthesize `text` with `voice` (or the default voice)
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct OpenAiRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let voice = voice.unwrap_or_else(|| self.default_voice());
        tracing::debug!(
            provider = %self.provider,
            voice,
            chars = text.len(),
            "synthesizing speech"
        );

        let request = match self.provider {
            TtsProvider::OpenAi => self
                .client
                .post(format!("{}/v1/audio/speech", self.base_url))
                .bearer_auth(self.api_key.expose_secret())
                .json(&OpenAiRequest {
                    model: &self.model,
                    input: text,
                    voice,
                    speed: self.speed,
                }),
            TtsProvider::ElevenLabs => self
                .client
                .post(format!("{}/v1/text-to-speech/{voice}", self.base_url))
                .header("xi-api-key", self.api_key.expose_secret())
                .json(&ElevenLabsRequest {
                    text,
                    model_id: &self.model,
                }),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("{} error {status}: {body}", self.provider)));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
