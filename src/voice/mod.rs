//! Voice input and output
//!
//! [`SpeechInputChannel`] and [`SpeechOutputChannel`] are platform-neutral
//! state machines; the [`platform`] backends bind them to the microphone,
//! the speakers and cloud STT/TTS.

mod capture;
mod endpoint;
mod input;
mod output;
pub mod platform;
mod playback;
mod stt;
mod tts;

pub use capture::{MicCapture, SAMPLE_RATE, has_input_device, samples_to_wav};
pub use endpoint::{Endpoint, UtteranceDetector};
pub use input::{
    ListeningState, RecognitionEvent, RecognitionEvents, Recognizer, SessionEvent,
    SpeechInputChannel,
};
pub use output::{
    PlaybackEvents, PlaybackState, SpeakOutcome, SpeechOutputChannel, Synthesizer, Utterance,
    select_voice,
};
pub use playback::{PlaybackEnd, decode_mp3, has_output_device, play_mp3_blocking};
pub use stt::Transcriber;
pub use tts::{OPENAI_VOICES, SpeechSynthesis};

/// Which part of the voice stack raised a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Platform lacks the capability
    Capability,
    /// Capture or recognition failed
    Recognition,
    /// Synthesis or playback failed
    Playback,
}

/// Transient, user-facing message from a voice channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.kind {
            NoticeKind::Capability => "voice unavailable",
            NoticeKind::Recognition => "speech recognition error",
            NoticeKind::Playback => "speech playback error",
        };
        write!(f, "{label}: {}", self.message)
    }
}
