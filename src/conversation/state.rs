//! Conversation phase, dataset summary and transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the conversation is in its lifecycle
///
/// `AwaitingName` moves to `Ready` exactly once and never back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// First utterance will be taken as the user's name
    #[default]
    AwaitingName,
    /// Name collected; utterances are questions about the dataset
    Ready {
        /// Name given by the user
        user_name: String,
    },
}

impl Phase {
    /// Whether the name has been collected
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Emitted once, by the `AwaitingName` → `Ready` transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAccepted {
    pub user_name: String,
}

/// Who said a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One line of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Append-only, chronologically ordered log of the conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Append an entry and return a copy of it
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> TranscriptEntry {
        let entry = TranscriptEntry {
            speaker,
            text: text.into(),
            at: Utc::now(),
        };
        self.entries.push(entry.clone());
        entry
    }

    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[must_use]
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Opaque description of the uploaded dataset (column or metric → value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetSummary(serde_json::Map<String, serde_json::Value>);

impl DatasetSummary {
    /// Wrap a JSON value; only objects are summaries
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Compact JSON rendering embedded into prompts
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::Value::Object(self.0.clone()).to_string()
    }

    /// Summary fields in key order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the orchestrator knows about the conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    phase: Phase,
    summary: Option<DatasetSummary>,
    transcript: Transcript,
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    /// User name, once collected
    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        match &self.phase {
            Phase::Ready { user_name } => Some(user_name),
            Phase::AwaitingName => None,
        }
    }

    /// Take `name` as the user's name if it has not been collected yet
    ///
    /// Returns the transition event the first time only.
    pub fn accept_name(&mut self, name: &str) -> Option<NameAccepted> {
        if self.phase.is_ready() {
            return None;
        }

        self.phase = Phase::Ready {
            user_name: name.to_string(),
        };
        tracing::info!(user_name = name, "conversation ready");

        Some(NameAccepted {
            user_name: name.to_string(),
        })
    }

    #[must_use]
    pub const fn summary(&self) -> Option<&DatasetSummary> {
        self.summary.as_ref()
    }

    /// Store the dataset summary; a summary is only ever set once
    ///
    /// Returns false if one was already present.
    pub fn set_summary(&mut self, summary: DatasetSummary) -> bool {
        if self.summary.is_some() {
            return false;
        }
        self.summary = Some(summary);
        true
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Append a line to the transcript
    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>) -> TranscriptEntry {
        self.transcript.push(speaker, text)
    }
}
