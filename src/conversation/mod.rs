//! Conversation state and turn orchestration
//!
//! The [`TurnOrchestrator`] owns the [`ConversationState`] and is the only
//! writer of the transcript. Voice capture and typed input both end up in
//! [`TurnOrchestrator::submit`].

mod draft;
mod orchestrator;
pub mod prompt;
mod slot;
mod state;

pub use draft::{InputDraft, LISTENING_PLACEHOLDER};
pub use orchestrator::{RejectReason, TurnOrchestrator, TurnOutcome};
pub use slot::{TurnGuard, TurnSlot};
pub use state::{
    ConversationState, DatasetSummary, NameAccepted, Phase, Speaker, Transcript, TranscriptEntry,
};
