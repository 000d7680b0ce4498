//! datachat - conversational dashboard for an uploaded dataset
//!
//! This library provides the pieces behind the `datachat` binary:
//! - Conversation state and turn orchestration
//! - Resilient calls to the text generation endpoint
//! - Voice input and output (microphone, STT, TTS, speakers)
//! - The dataset backend client (CSV upload, summary fetch)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Terminal dashboard                  │
//! │   typed lines  │  /mic  │  /suggest  │  rendering    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 TurnOrchestrator                     │
//! │  ConversationState │ TurnSlot │ speech in / out      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Generation endpoint  │  Dataset backend  │ STT/TTS │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod generation;
pub mod voice;

pub use config::Config;
pub use conversation::{ConversationState, Phase, TurnOrchestrator, TurnOutcome, TurnSlot};
pub use dashboard::Dashboard;
pub use dataset::{DatasetClient, SummaryProvider, UploadReceipt};
pub use error::{Error, Result};
pub use generation::{GenerationFailure, ResilientGenerationClient, RetryPolicy, TextGenerator};
