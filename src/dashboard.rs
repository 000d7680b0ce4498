//! Terminal dashboard
//!
//! Wires typed lines, microphone toggles and recognizer events to the
//! [`TurnOrchestrator`], and renders transcript appends and voice notices.
//! Turns run as spawned tasks so the loop keeps rendering while a request
//! is backing off.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::Result;
use crate::config::Config;
use crate::conversation::{
    DatasetSummary, InputDraft, LISTENING_PLACEHOLDER, RejectReason, Speaker, TranscriptEntry,
    TurnOrchestrator, TurnOutcome, TurnSlot,
};
use crate::dataset::SummaryProvider;
use crate::generation::{GeminiTransport, ResilientGenerationClient, TextGenerator};
use crate::voice::platform::{MicRecognizer, SpeakerSynthesizer};
use crate::voice::{
    Notice, Recognizer, SessionEvent, SpeechInputChannel, SpeechOutputChannel, SpeechSynthesis,
    Synthesizer, Transcriber,
};

/// Pause between a recognized utterance and its submission
pub const SUBMIT_DELAY: Duration = Duration::from_millis(100);

/// One line of dashboard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the orchestrator
    Submit(String),
    /// Toggle listening
    Mic,
    /// Stop speaking
    Stop,
    /// Ask for starter analyses
    Suggest,
    /// Print the dataset summary
    Summary,
    /// Leave the dashboard
    Quit,
    /// Unknown slash-command
    Unknown(String),
}

/// Parse one input line; blank lines yield `None`
#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(name) = line.strip_prefix('/') else {
        return Some(Command::Submit(line.to_string()));
    };

    let command = match name.trim().to_lowercase().as_str() {
        "mic" | "listen" => Command::Mic,
        "stop" => Command::Stop,
        "suggest" => Command::Suggest,
        "summary" => Command::Summary,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

/// Render a transcript entry as one terminal line
#[must_use]
pub fn render_entry(entry: &TranscriptEntry) -> String {
    let who = match entry.speaker {
        Speaker::User => "you",
        Speaker::Assistant => "assistant",
    };
    format!("[{}] {who}: {}", entry.at.format("%H:%M:%S"), entry.text)
}

/// Render the dataset summary, one field per line
#[must_use]
pub fn render_summary(summary: Option<&DatasetSummary>) -> String {
    let Some(summary) = summary else {
        return "No dataset summary loaded.".to_string();
    };

    let mut lines = vec![format!("Dataset summary ({} fields):", summary.len())];
    for (name, value) in summary.fields() {
        lines.push(format!("  {name}: {value}"));
    }
    lines.join("\n")
}

const HELP: &str = "Type a message and press enter. Commands: /mic /stop /suggest /summary /quit";

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Build the cloud STT client for the configured provider, if a key exists
///
/// # Errors
///
/// Returns error if the client cannot be constructed
pub fn build_transcriber(config: &Config) -> Result<Option<Transcriber>> {
    let Some(key) = config.stt_api_key() else {
        return Ok(None);
    };
    Transcriber::new(
        config.voice.stt_provider,
        copy_secret(key),
        config.voice.stt_model.clone(),
    )
    .map(Some)
}

/// Build the cloud TTS client for the configured provider, if a key exists
///
/// # Errors
///
/// Returns error if the client cannot be constructed
pub fn build_synthesis(config: &Config) -> Result<Option<SpeechSynthesis>> {
    let Some(key) = config.tts_api_key() else {
        return Ok(None);
    };
    SpeechSynthesis::new(
        config.voice.tts_provider,
        copy_secret(key),
        config.voice.tts_model.clone(),
        config.voice.tts_speed,
        config.voice.preferred_voices.clone(),
    )
    .map(Some)
}

/// Interactive conversation surface
pub struct Dashboard {
    orchestrator: TurnOrchestrator,
    input: SpeechInputChannel,
    output: SpeechOutputChannel,
    draft: InputDraft,
    recognition: mpsc::UnboundedReceiver<SessionEvent>,
    transcript: mpsc::UnboundedReceiver<TranscriptEntry>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl Dashboard {
    /// Build a dashboard backed by the real generation endpoint and, when
    /// enabled and available, the audio devices
    ///
    /// # Errors
    ///
    /// Returns error if the generation transport or a speech client cannot
    /// be constructed
    pub fn new(config: &Config) -> Result<Self> {
        let transport = GeminiTransport::new(
            &config.generation.base_url,
            &config.generation.model,
            config.generation.api_key.as_ref().map(copy_secret),
        )?;
        let generator: Arc<dyn TextGenerator> = Arc::new(ResilientGenerationClient::new(
            Arc::new(transport),
            config.generation.retry,
        ));

        let (recognizer, synthesizer) = if config.voice.enabled {
            let recognizer = MicRecognizer::detect(build_transcriber(config)?)?
                .map(|r| Arc::new(r) as Arc<dyn Recognizer>);
            let synthesizer = SpeakerSynthesizer::detect(build_synthesis(config)?)?
                .map(|s| Arc::new(s) as Arc<dyn Synthesizer>);
            (recognizer, synthesizer)
        } else {
            tracing::info!("voice disabled, running text-only");
            (None, None)
        };

        Ok(Self::with_backends(
            generator,
            recognizer,
            synthesizer,
            config.voice.preferred_voices.clone(),
        ))
    }

    /// Build a dashboard from explicit backends
    #[must_use]
    pub fn with_backends(
        generator: Arc<dyn TextGenerator>,
        recognizer: Option<Arc<dyn Recognizer>>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        preferred_voices: Vec<String>,
    ) -> Self {
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let (transcript_tx, transcript) = mpsc::unbounded_channel();

        let slot = TurnSlot::new();
        let draft = InputDraft::new();
        let output =
            SpeechOutputChannel::with_notices(synthesizer, preferred_voices, notice_tx.clone());
        let (input, recognition) = SpeechInputChannel::new(
            recognizer,
            output.clone(),
            slot.clone(),
            draft.clone(),
            notice_tx,
        );
        let orchestrator = TurnOrchestrator::with_listener(
            generator,
            output.clone(),
            slot,
            draft.clone(),
            transcript_tx,
        );

        Self {
            orchestrator,
            input,
            output,
            draft,
            recognition,
            transcript,
            notices,
        }
    }

    /// Shared orchestrator handle
    #[must_use]
    pub const fn orchestrator(&self) -> &TurnOrchestrator {
        &self.orchestrator
    }

    /// Load the summary, then process `lines` until `/quit` or end of input
    ///
    /// In-flight turns are allowed to finish before returning; capture and
    /// playback are stopped on the way out.
    ///
    /// # Errors
    ///
    /// Returns error if reading input or writing output fails
    pub async fn run<R, W>(
        mut self,
        provider: &dyn SummaryProvider,
        input: R,
        mut out: W,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let session = uuid::Uuid::new_v4();
        tracing::info!(
            %session,
            voice_in = self.input.is_supported(),
            voice_out = self.output.is_supported(),
            "dashboard started"
        );

        writeln!(out, "{HELP}")?;
        self.orchestrator.load_summary(provider).await;
        self.flush_transcript(&mut out)?;

        let mut lines = input.lines();
        let mut draft_rx: watch::Receiver<String> = self.draft.subscribe();
        let mut turns: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        tracing::debug!("input closed");
                        break;
                    };
                    let Some(command) = parse_command(&line) else {
                        continue;
                    };
                    if !self.handle_command(command, &mut turns, &mut out).await? {
                        break;
                    }
                }
                Some((session, event)) = self.recognition.recv() => {
                    if let Some(text) = self.input.handle_event(session, event) {
                        let orchestrator = self.orchestrator.clone();
                        turns.spawn(async move {
                            tokio::time::sleep(SUBMIT_DELAY).await;
                            log_outcome(&orchestrator.submit(&text).await);
                        });
                    }
                }
                Some(entry) = self.transcript.recv() => {
                    writeln!(out, "{}", render_entry(&entry))?;
                }
                Some(notice) = self.notices.recv() => {
                    writeln!(out, "! {notice}")?;
                }
                Ok(()) = draft_rx.changed() => {
                    let draft = draft_rx.borrow_and_update().clone();
                    if draft == LISTENING_PLACEHOLDER {
                        writeln!(out, "({LISTENING_PLACEHOLDER})")?;
                    }
                }
                Some(joined) = turns.join_next(), if !turns.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "turn task failed");
                    }
                }
            }
        }

        self.input.stop();
        self.output.stop();

        while let Some(joined) = turns.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "turn task failed");
            }
        }
        // Turns that finished during the drain may have started playback
        self.input.stop();
        self.output.stop();
        self.flush_transcript(&mut out)?;
        while let Ok(notice) = self.notices.try_recv() {
            writeln!(out, "! {notice}")?;
        }

        tracing::info!(%session, "dashboard closed");
        Ok(())
    }

    /// Apply one command; returns false when the dashboard should close
    async fn handle_command<W: Write>(
        &mut self,
        command: Command,
        turns: &mut JoinSet<()>,
        out: &mut W,
    ) -> Result<bool> {
        match command {
            Command::Submit(text) => {
                if self.input.is_active() {
                    tracing::debug!("listening, ignoring typed input");
                    writeln!(out, "(listening, use /mic to stop)")?;
                    return Ok(true);
                }
                let orchestrator = self.orchestrator.clone();
                turns.spawn(async move {
                    log_outcome(&orchestrator.submit(&text).await);
                });
            }
            Command::Mic => {
                if let Err(e) = self.input.toggle() {
                    tracing::debug!(error = %e, "could not toggle listening");
                    if self.input.is_supported() {
                        writeln!(out, "! {e}")?;
                    }
                }
            }
            Command::Stop => self.output.stop(),
            Command::Suggest => {
                let orchestrator = self.orchestrator.clone();
                turns.spawn(async move {
                    log_outcome(&orchestrator.suggest_analyses().await);
                });
            }
            Command::Summary => {
                let state = self.orchestrator.snapshot().await;
                writeln!(out, "{}", render_summary(state.summary()))?;
            }
            Command::Quit => return Ok(false),
            Command::Unknown(name) => writeln!(out, "unknown command {name}. {HELP}")?,
        }
        Ok(true)
    }

    fn flush_transcript<W: Write>(&mut self, out: &mut W) -> Result<()> {
        while let Ok(entry) = self.transcript.try_recv() {
            writeln!(out, "{}", render_entry(&entry))?;
        }
        Ok(())
    }
}

fn log_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Rejected(RejectReason::Empty) => {}
        TurnOutcome::Rejected(reason) => tracing::info!(?reason, "submission ignored"),
        TurnOutcome::Failed(failure) => {
            tracing::warn!(%failure, "turn ended with a failure message");
        }
        other => tracing::debug!(?other, "turn complete"),
    }
}
