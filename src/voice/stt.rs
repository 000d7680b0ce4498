//! Cloud speech-to-text used behind microphone capture

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::SttProvider;
use crate::{Error, Result};

const WHISPER_BASE_URL: &str = "https://api.openai.com";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

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

/// Turns a recorded WAV utterance into text
pub struct Transcriber {
    client: reqwest::Client,
    provider: SttProvider,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcriber")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Transcriber {
    /// Create a transcriber for `provider`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(provider: SttProvider, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider} API key required for STT")));
        }

        let base_url = match provider {
            SttProvider::Whisper => WHISPER_BASE_URL,
            SttProvider::Deepgram => DEEPGRAM_BASE_URL,
        }
        .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
            base_url,
        })
    }

    /// Point requests at a different host (used against mock servers)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Transcribe WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(
            provider = %self.provider,
            audio_bytes = wav.len(),
            "starting transcription"
        );

        let request = match self.provider {
            SttProvider::Whisper => {
                let part = reqwest::multipart::Part::bytes(wav)
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("model", self.model.clone());

                self.client
                    .post(format!("{}/v1/audio/transcriptions", self.base_url))
                    .bearer_auth(self.api_key.expose_secret())
                    .multipart(form)
            }
            SttProvider::Deepgram => self
                .client
                .post(format!("{}/v1/listen", self.base_url))
                .query(&[("model", self.model.as_str()), ("punctuate", "true")])
                .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
                .header("Content-Type", "audio/wav")
                .body(wav),
        };

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("{} error {status}: {body}", self.provider)));
        }

        let transcript = match self.provider {
            SttProvider::Whisper => response.json::<WhisperResponse>().await?.text,
            SttProvider::Deepgram => response
                .json::<DeepgramResponse>()
                .await?
                .results
                .channels
                .into_iter()
                .next()
                .and_then(|c| c.alternatives.into_iter().next())
                .map(|a| a.transcript)
                .unwrap_or_default(),
        };

        let transcript = transcript.trim().to_string();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}
