//! Speech input channel: one finalized transcript per capture session

use std::sync::Arc;

use tokio::sync::mpsc;

use super::output::SpeechOutputChannel;
use super::{Notice, NoticeKind};
use crate::conversation::{InputDraft, LISTENING_PLACEHOLDER, TurnSlot};
use crate::{Error, Result};

/// Event reported by a recognizer for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Capture is live
    Started,
    /// Final utterance
    Transcript(String),
    /// Capture or recognition failed; the session is over
    Error(String),
    /// Session finished
    Ended,
}

/// A recognition event tagged with the session it belongs to
pub type SessionEvent = (u64, RecognitionEvent);

/// Platform speech-to-text capture
///
/// A session is non-continuous: it waits for one final utterance, reports
/// it, then ends on its own.
pub trait Recognizer: Send + Sync {
    /// Begin a capture session, reporting through `events`
    ///
    /// # Errors
    ///
    /// Returns error if capture could not be started
    fn start(&self, events: RecognitionEvents) -> Result<()>;

    /// Abort the active session, if any
    fn stop(&self);
}

/// Sender handed to a recognizer for one session
#[derive(Debug, Clone)]
pub struct RecognitionEvents {
    session: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl RecognitionEvents {
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// Report an event; silently dropped once the channel is gone
    pub fn send(&self, event: RecognitionEvent) {
        let _ = self.tx.send((self.session, event));
    }
}

/// Capture lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningState {
    Idle,
    /// Session requested, platform has not confirmed
    Starting,
    Listening,
}

/// Arbitrates microphone capture against playback and in-flight turns
pub struct SpeechInputChannel {
    backend: Option<Arc<dyn Recognizer>>,
    output: SpeechOutputChannel,
    slot: TurnSlot,
    draft: InputDraft,
    notices: mpsc::UnboundedSender<Notice>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state: ListeningState,
    session: u64,
    delivered: bool,
}

impl std::fmt::Debug for SpeechInputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechInputChannel")
            .field("supported", &self.backend.is_some())
            .field("state", &self.state)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SpeechInputChannel {
    /// Create a channel and the receiver its recognizer reports into
    ///
    /// Feed every received event back through [`SpeechInputChannel::handle_event`].
    #[must_use]
    pub fn new(
        backend: Option<Arc<dyn Recognizer>>,
        output: SpeechOutputChannel,
        slot: TurnSlot,
        draft: InputDraft,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let channel = Self {
            backend,
            output,
            slot,
            draft,
            notices,
            events_tx,
            state: ListeningState::Idle,
            session: 0,
            delivered: false,
        };
        (channel, events_rx)
    }

    #[must_use]
    pub const fn state(&self) -> ListeningState {
        self.state
    }

    /// True once the platform confirmed the session is live
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == ListeningState::Listening
    }

    /// True while a session is requested or live
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != ListeningState::Idle
    }

    /// Whether the platform can recognize speech
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    /// Start a capture session, replacing any previous one
    ///
    /// Active playback is stopped first.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityUnavailable` without a recognizer, `Recognition`
    /// if a turn is in flight or the platform refuses to start
    pub fn start(&mut self) -> Result<()> {
        let Some(backend) = self.backend.clone() else {
            let message = "speech recognition is not available on this system".to_string();
            self.notify(NoticeKind::Capability, message.clone());
            return Err(Error::CapabilityUnavailable(message));
        };

        if self.slot.is_busy() {
            return Err(Error::Recognition(
                "cannot listen while a turn is in progress".to_string(),
            ));
        }

        self.output.stop();

        if self.state != ListeningState::Idle {
            backend.stop();
        }

        self.session += 1;
        self.delivered = false;
        self.state = ListeningState::Starting;

        let events = RecognitionEvents {
            session: self.session,
            tx: self.events_tx.clone(),
        };

        tracing::debug!(session = self.session, "starting speech capture");
        if let Err(e) = backend.start(events) {
            self.state = ListeningState::Idle;
            self.draft.clear();
            tracing::warn!(error = %e, "failed to start speech capture");
            self.notify(NoticeKind::Recognition, e.to_string());
            return Err(Error::Recognition(e.to_string()));
        }

        Ok(())
    }

    /// Stop the active session; no-op when idle
    pub fn stop(&mut self) {
        if self.state == ListeningState::Idle {
            return;
        }

        if let Some(backend) = &self.backend {
            backend.stop();
        }
        // Retire the session so late events are ignored
        self.session += 1;
        self.state = ListeningState::Idle;
        if self.draft.get() == LISTENING_PLACEHOLDER {
            self.draft.clear();
        }
        tracing::debug!("speech capture stopped");
    }

    /// Start when idle, stop when active
    ///
    /// # Errors
    ///
    /// Propagates errors from [`SpeechInputChannel::start`]
    pub fn toggle(&mut self) -> Result<()> {
        if self.is_active() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// Apply a recognizer event
    ///
    /// Returns the finalized transcript at most once per session.
    pub fn handle_event(&mut self, session: u64, event: RecognitionEvent) -> Option<String> {
        if session != self.session || self.state == ListeningState::Idle {
            tracing::trace!(session, current = self.session, "ignoring stale recognition event");
            return None;
        }

        match event {
            RecognitionEvent::Started => {
                self.state = ListeningState::Listening;
                self.draft.set(LISTENING_PLACEHOLDER);
                None
            }
            RecognitionEvent::Transcript(text) => {
                if self.delivered {
                    return None;
                }
                self.delivered = true;
                tracing::info!(transcript = %text, "speech recognized");
                self.draft.set(text.clone());
                Some(text)
            }
            RecognitionEvent::Error(message) => {
                self.state = ListeningState::Idle;
                self.draft.clear();
                tracing::warn!(error = %message, "speech recognition error");
                self.notify(NoticeKind::Recognition, message);
                None
            }
            RecognitionEvent::Ended => {
                self.state = ListeningState::Idle;
                if !self.delivered && self.draft.get() == LISTENING_PLACEHOLDER {
                    self.draft.clear();
                }
                None
            }
        }
    }

    fn notify(&self, kind: NoticeKind, message: String) {
        let _ = self.notices.send(Notice { kind, message });
    }
}
