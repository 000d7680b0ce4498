//! Conversational turn orchestration

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::InputDraft;
use super::prompt;
use super::slot::TurnSlot;
use super::state::{ConversationState, Speaker, TranscriptEntry};
use crate::dataset::SummaryProvider;
use crate::generation::{GenerationFailure, TextGenerator};
use crate::voice::SpeechOutputChannel;

/// Why a submission was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty or whitespace-only text
    Empty,
    /// A turn is already in flight
    Busy,
    /// Playback is active
    Speaking,
    /// The name has not been collected yet
    NotReady,
}

/// Observable result of one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Ignored without touching the transcript
    Rejected(RejectReason),
    /// The name was collected and the welcome message sent
    Welcomed { user_name: String },
    /// The endpoint answered
    Answered { reply: String },
    /// The endpoint failed; a diagnostic was sent instead
    Failed(GenerationFailure),
    /// No dataset summary, so no request was made
    SummaryMissing,
}

/// What a turn does once its user line is recorded
enum Plan {
    /// Speak a message already recorded in the transcript
    Say(String, TurnOutcome),
    /// Send a prompt to the generation endpoint
    Ask(String),
}

struct Inner {
    state: Mutex<ConversationState>,
    generator: Arc<dyn TextGenerator>,
    speech: SpeechOutputChannel,
    slot: TurnSlot,
    draft: InputDraft,
    listener: Option<mpsc::UnboundedSender<TranscriptEntry>>,
}

/// Interprets user text against the conversation and drives replies
///
/// Cheap to clone; clones share one conversation.
#[derive(Clone)]
pub struct TurnOrchestrator {
    inner: Arc<Inner>,
}

impl TurnOrchestrator {
    /// Create an orchestrator with a fresh conversation
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        speech: SpeechOutputChannel,
        slot: TurnSlot,
        draft: InputDraft,
    ) -> Self {
        Self::build(generator, speech, slot, draft, None)
    }

    /// Create an orchestrator that reports every appended transcript entry
    #[must_use]
    pub fn with_listener(
        generator: Arc<dyn TextGenerator>,
        speech: SpeechOutputChannel,
        slot: TurnSlot,
        draft: InputDraft,
        listener: mpsc::UnboundedSender<TranscriptEntry>,
    ) -> Self {
        Self::build(generator, speech, slot, draft, Some(listener))
    }

    fn build(
        generator: Arc<dyn TextGenerator>,
        speech: SpeechOutputChannel,
        slot: TurnSlot,
        draft: InputDraft,
        listener: Option<mpsc::UnboundedSender<TranscriptEntry>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ConversationState::new()),
                generator,
                speech,
                slot,
                draft,
                listener,
            }),
        }
    }

    /// The busy token shared with voice capture
    #[must_use]
    pub fn slot(&self) -> &TurnSlot {
        &self.inner.slot
    }

    /// Copy of the conversation for rendering
    pub async fn snapshot(&self) -> ConversationState {
        self.inner.state.lock().await.clone()
    }

    /// Handle one user utterance, typed or spoken
    pub async fn submit(&self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Rejected(RejectReason::Empty);
        }
        if self.inner.speech.is_active() {
            tracing::debug!("playback active, ignoring submission");
            return TurnOutcome::Rejected(RejectReason::Speaking);
        }
        let Some(_turn) = self.inner.slot.try_acquire() else {
            tracing::debug!("turn in flight, ignoring submission");
            return TurnOutcome::Rejected(RejectReason::Busy);
        };

        self.inner.draft.clear();

        let plan = {
            let mut state = self.inner.state.lock().await;
            self.record(&mut state, Speaker::User, text);

            if let Some(accepted) = state.accept_name(text) {
                let greeting = prompt::welcome(&accepted.user_name);
                self.record(&mut state, Speaker::Assistant, &greeting);
                Plan::Say(
                    greeting,
                    TurnOutcome::Welcomed {
                        user_name: accepted.user_name,
                    },
                )
            } else {
                let request = match (state.user_name(), state.summary()) {
                    (Some(user_name), Some(summary)) => Some(prompt::answer_prompt(
                        user_name,
                        &summary.to_json(),
                        text,
                    )),
                    _ => None,
                };

                if let Some(request) = request {
                    Plan::Ask(request)
                } else {
                    tracing::warn!("question received without a dataset summary");
                    self.record(&mut state, Speaker::Assistant, prompt::SUMMARY_MISSING);
                    Plan::Say(
                        prompt::SUMMARY_MISSING.to_string(),
                        TurnOutcome::SummaryMissing,
                    )
                }
            }
        };

        match plan {
            Plan::Say(message, outcome) => {
                self.inner.speech.speak(&message);
                outcome
            }
            Plan::Ask(request) => self.ask(&request).await,
        }
    }

    /// Ask the endpoint for starter analyses of the dataset
    pub async fn suggest_analyses(&self) -> TurnOutcome {
        if self.inner.speech.is_active() {
            return TurnOutcome::Rejected(RejectReason::Speaking);
        }
        let Some(_turn) = self.inner.slot.try_acquire() else {
            return TurnOutcome::Rejected(RejectReason::Busy);
        };

        let request = {
            let mut state = self.inner.state.lock().await;
            let blocked = match (state.user_name(), state.summary()) {
                (Some(user_name), Some(summary)) => {
                    Ok(prompt::suggestions_prompt(user_name, &summary.to_json()))
                }
                (None, _) => Err((
                    prompt::NAME_FIRST,
                    TurnOutcome::Rejected(RejectReason::NotReady),
                )),
                (Some(_), None) => Err((prompt::SUMMARY_MISSING, TurnOutcome::SummaryMissing)),
            };

            match blocked {
                Ok(request) => request,
                Err((message, outcome)) => {
                    tracing::debug!(?outcome, "suggestions not available yet");
                    self.record(&mut state, Speaker::Assistant, message);
                    drop(state);
                    self.inner.speech.speak(message);
                    return outcome;
                }
            }
        };

        self.inner.speech.stop();
        let (message, outcome) = match self.inner.generator.generate(&request).await {
            Ok(reply) => (reply.clone(), TurnOutcome::Answered { reply }),
            Err(failure) => {
                tracing::warn!(error = %failure, "suggestion request failed");
                (
                    prompt::SUGGESTIONS_UNAVAILABLE.to_string(),
                    TurnOutcome::Failed(failure),
                )
            }
        };

        self.say(&message).await;
        outcome
    }

    /// Fetch the dataset summary at startup
    ///
    /// Returns true if a summary was stored. On failure the summary stays
    /// absent and the transcript explains why.
    pub async fn load_summary(&self, provider: &dyn SummaryProvider) -> bool {
        match provider.fetch_summary().await {
            Ok(summary) => {
                tracing::info!(fields = summary.len(), "dataset summary loaded");
                let stored = {
                    let mut state = self.inner.state.lock().await;
                    let stored = state.set_summary(summary);
                    if stored {
                        self.record(&mut state, Speaker::Assistant, prompt::OPENING_GREETING);
                    }
                    stored
                };
                if stored {
                    self.inner.speech.speak(prompt::OPENING_GREETING);
                }
                stored
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load dataset summary");
                self.say(prompt::SUMMARY_UNAVAILABLE).await;
                false
            }
        }
    }

    async fn ask(&self, request: &str) -> TurnOutcome {
        // A stale answer must never overlap the next one
        self.inner.speech.stop();

        let (message, outcome) = match self.inner.generator.generate(request).await {
            Ok(reply) => (reply.clone(), TurnOutcome::Answered { reply }),
            Err(failure) => {
                tracing::warn!(error = %failure, "generation turn failed");
                (prompt::failure_message(&failure), TurnOutcome::Failed(failure))
            }
        };

        self.say(&message).await;
        outcome
    }

    /// Append an assistant line and speak it
    async fn say(&self, message: &str) {
        {
            let mut state = self.inner.state.lock().await;
            self.record(&mut state, Speaker::Assistant, message);
        }
        self.inner.speech.speak(message);
    }

    fn record(&self, state: &mut ConversationState, speaker: Speaker, text: &str) {
        let entry = state.append(speaker, text);
        if let Some(listener) = &self.inner.listener {
            let _ = listener.send(entry);
        }
    }
}
