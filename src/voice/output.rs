//! Speech output channel: one utterance at a time, no queueing

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{Notice, NoticeKind};
use crate::Result;

/// Text plus the voice chosen for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// `None` means the platform default voice
    pub voice: Option<String>,
}

/// Platform text-to-speech playback
///
/// Implementations report progress through the [`PlaybackEvents`] handle
/// they are given, from any thread.
pub trait Synthesizer: Send + Sync {
    /// Voices the platform offers
    fn voices(&self) -> Vec<String>;

    /// Begin playing `utterance`
    ///
    /// # Errors
    ///
    /// Returns error if playback could not be started at all
    fn speak(&self, utterance: Utterance, events: PlaybackEvents) -> Result<()>;

    /// Abort the active playback, if any
    fn cancel(&self);
}

/// Playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Handed to the platform, not yet audible
    Pending,
    Speaking,
}

/// Result of a `speak` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback started with the given voice
    Started { voice: Option<String> },
    /// Another playback was active; the text was dropped
    Dropped,
    /// No synthesis capability
    Unsupported,
    /// The platform refused to start playback
    Failed(String),
}

#[derive(Debug)]
struct OutputState {
    playback: PlaybackState,
    session: u64,
}

struct OutputInner {
    backend: Option<Arc<dyn Synthesizer>>,
    preferred_voices: Vec<String>,
    state: Mutex<OutputState>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl OutputInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, OutputState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Speaks assistant messages through the platform synthesizer
#[derive(Clone)]
pub struct SpeechOutputChannel {
    inner: Arc<OutputInner>,
}

impl std::fmt::Debug for SpeechOutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechOutputChannel")
            .field("supported", &self.inner.backend.is_some())
            .field("state", &self.state())
            .finish()
    }
}

impl SpeechOutputChannel {
    /// Create a channel; `backend = None` makes every `speak` a no-op
    #[must_use]
    pub fn new(backend: Option<Arc<dyn Synthesizer>>, preferred_voices: Vec<String>) -> Self {
        Self {
            inner: Arc::new(OutputInner {
                backend,
                preferred_voices,
                state: Mutex::new(OutputState {
                    playback: PlaybackState::Idle,
                    session: 0,
                }),
                notices: None,
            }),
        }
    }

    /// Channel without synthesis capability
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, Vec::new())
    }

    /// Route playback error notices to `notices`
    #[must_use]
    pub fn with_notices(
        backend: Option<Arc<dyn Synthesizer>>,
        preferred_voices: Vec<String>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            inner: Arc::new(OutputInner {
                backend,
                preferred_voices,
                state: Mutex::new(OutputState {
                    playback: PlaybackState::Idle,
                    session: 0,
                }),
                notices: Some(notices),
            }),
        }
    }

    /// Whether a synthesizer is available
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.inner.backend.is_some()
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.inner.lock().playback
    }

    /// True between the platform's start and end/error events
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state() == PlaybackState::Speaking
    }

    /// True from `speak` until end, error or `stop`
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() != PlaybackState::Idle
    }

    /// Speak `text` unless a playback is already active
    pub fn speak(&self, text: &str) -> SpeakOutcome {
        let Some(backend) = self.inner.backend.clone() else {
            tracing::debug!("no synthesizer, skipping speech");
            return SpeakOutcome::Unsupported;
        };

        let session = {
            let mut state = self.inner.lock();
            if state.playback != PlaybackState::Idle {
                tracing::debug!(state = ?state.playback, "playback active, dropping utterance");
                return SpeakOutcome::Dropped;
            }
            state.session += 1;
            state.playback = PlaybackState::Pending;
            state.session
        };

        let voice = select_voice(&backend.voices(), &self.inner.preferred_voices);
        let utterance = Utterance {
            text: text.to_string(),
            voice: voice.clone(),
        };
        let events = PlaybackEvents {
            inner: Arc::clone(&self.inner),
            session,
        };

        tracing::debug!(session, voice = ?voice, chars = text.len(), "starting playback");
        match backend.speak(utterance, events) {
            Ok(()) => SpeakOutcome::Started { voice },
            Err(e) => {
                let mut state = self.inner.lock();
                if state.session == session {
                    state.playback = PlaybackState::Idle;
                }
                drop(state);
                tracing::warn!(error = %e, "failed to start playback");
                notify(&self.inner, NoticeKind::Playback, e.to_string());
                SpeakOutcome::Failed(e.to_string())
            }
        }
    }

    /// Cancel any active playback; no-op when idle
    pub fn stop(&self) {
        let was_active = {
            let mut state = self.inner.lock();
            let active = state.playback != PlaybackState::Idle;
            if active {
                // Retire the session so late platform events are ignored
                state.session += 1;
                state.playback = PlaybackState::Idle;
            }
            active
        };

        if was_active {
            if let Some(backend) = &self.inner.backend {
                backend.cancel();
            }
            tracing::debug!("playback stopped");
        }
    }
}

/// Callback handle for one playback session
///
/// Events from a session that has since been stopped or replaced are ignored.
#[derive(Clone)]
pub struct PlaybackEvents {
    inner: Arc<OutputInner>,
    session: u64,
}

impl std::fmt::Debug for PlaybackEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEvents")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl PlaybackEvents {
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// Platform began producing audio
    pub fn started(&self) {
        let mut state = self.inner.lock();
        if state.session == self.session && state.playback == PlaybackState::Pending {
            state.playback = PlaybackState::Speaking;
        }
    }

    /// Playback ran to completion
    pub fn ended(&self) {
        let mut state = self.inner.lock();
        if state.session == self.session {
            state.playback = PlaybackState::Idle;
            tracing::debug!(session = self.session, "playback ended");
        }
    }

    /// Playback failed
    pub fn failed(&self, message: &str) {
        let current = {
            let mut state = self.inner.lock();
            let current = state.session == self.session;
            if current {
                state.playback = PlaybackState::Idle;
            }
            current
        };

        if current {
            tracing::warn!(session = self.session, error = message, "speech synthesis error");
            notify(&self.inner, NoticeKind::Playback, message.to_string());
        }
    }
}

fn notify(inner: &OutputInner, kind: NoticeKind, message: String) {
    if let Some(tx) = &inner.notices {
        let _ = tx.send(Notice { kind, message });
    }
}

/// First preferred voice the platform offers, if any
#[must_use]
pub fn select_voice(available: &[String], preferred: &[String]) -> Option<String> {
    preferred
        .iter()
        .find(|p| available.iter().any(|a| a == *p))
        .cloned()
}
