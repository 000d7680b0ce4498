//! Audio-device backed speech platform
//!
//! Capture and playback run on dedicated OS threads (audio streams are not
//! `Send`) and report back through the channel event handles. Cloud STT/TTS
//! requests are driven on the tokio runtime the backend was created in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

use super::capture::{MicCapture, SAMPLE_RATE, has_input_device, samples_to_wav};
use super::endpoint::{Endpoint, UtteranceDetector};
use super::input::{RecognitionEvent, RecognitionEvents, Recognizer};
use super::output::{PlaybackEvents, Synthesizer, Utterance};
use super::playback::{has_output_device, play_mp3_blocking};
use super::stt::Transcriber;
use super::tts::SpeechSynthesis;
use crate::{Error, Result};

/// Microphone polling interval
const CAPTURE_POLL: Duration = Duration::from_millis(100);

/// Replace the active session's stop flag, raising the old one
fn replace_flag(slot: &Mutex<Option<Arc<AtomicBool>>>) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(previous) = guard.replace(Arc::clone(&flag)) {
        previous.store(true, Ordering::Release);
    }
    flag
}

fn raise_flag(slot: &Mutex<Option<Arc<AtomicBool>>>) {
    let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(flag) = guard.take() {
        flag.store(true, Ordering::Release);
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current()
        .map_err(|e| Error::Config(format!("speech backends need a tokio runtime: {e}")))
}

/// Microphone capture plus cloud transcription
pub struct MicRecognizer {
    transcriber: Arc<Transcriber>,
    runtime: Handle,
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl MicRecognizer {
    /// Build a recognizer if this system can capture and transcribe speech
    ///
    /// Returns `Ok(None)` when there is no transcriber or no input device.
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime
    pub fn detect(transcriber: Option<Transcriber>) -> Result<Option<Self>> {
        let Some(transcriber) = transcriber else {
            tracing::info!("no STT credentials, speech recognition unavailable");
            return Ok(None);
        };
        if !has_input_device() {
            tracing::info!("no input device, speech recognition unavailable");
            return Ok(None);
        }

        Ok(Some(Self {
            transcriber: Arc::new(transcriber),
            runtime: current_runtime()?,
            active: Mutex::new(None),
        }))
    }
}

impl Recognizer for MicRecognizer {
    fn start(&self, events: RecognitionEvents) -> Result<()> {
        let stop = replace_flag(&self.active);
        let transcriber = Arc::clone(&self.transcriber);
        let runtime = self.runtime.clone();

        std::thread::Builder::new()
            .name("datachat-capture".to_string())
            .spawn(move || run_capture(&transcriber, &runtime, &stop, &events))
            .map_err(|e| Error::Recognition(format!("could not start capture thread: {e}")))?;

        Ok(())
    }

    fn stop(&self) {
        raise_flag(&self.active);
    }
}

fn run_capture(
    transcriber: &Transcriber,
    runtime: &Handle,
    stop: &AtomicBool,
    events: &RecognitionEvents,
) {
    let mic = match MicCapture::open() {
        Ok(mic) => mic,
        Err(e) => {
            events.send(RecognitionEvent::Error(e.to_string()));
            return;
        }
    };
    events.send(RecognitionEvent::Started);

    let mut detector = UtteranceDetector::new();
    let samples = loop {
        if stop.load(Ordering::Acquire) {
            events.send(RecognitionEvent::Ended);
            return;
        }
        std::thread::sleep(CAPTURE_POLL);

        match detector.push(&mic.drain()) {
            Endpoint::Pending => {}
            Endpoint::Complete => break detector.take(),
            Endpoint::NoSpeech => {
                events.send(RecognitionEvent::Error("no speech detected".to_string()));
                return;
            }
        }
    };
    drop(mic);

    let result = samples_to_wav(&samples, SAMPLE_RATE)
        .and_then(|wav| runtime.block_on(transcriber.transcribe(wav)));

    if stop.load(Ordering::Acquire) {
        events.send(RecognitionEvent::Ended);
        return;
    }

    match result {
        Ok(text) if !text.is_empty() => {
            events.send(RecognitionEvent::Transcript(text));
            events.send(RecognitionEvent::Ended);
        }
        Ok(_) => events.send(RecognitionEvent::Error("no speech recognized".to_string())),
        Err(e) => events.send(RecognitionEvent::Error(e.to_string())),
    }
}

/// Cloud synthesis plus speaker playback
pub struct SpeakerSynthesizer {
    tts: Arc<SpeechSynthesis>,
    runtime: Handle,
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl SpeakerSynthesizer {
    /// Build a synthesizer if this system can synthesize and play speech
    ///
    /// Returns `Ok(None)` when there is no TTS client or no output device.
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime
    pub fn detect(tts: Option<SpeechSynthesis>) -> Result<Option<Self>> {
        let Some(tts) = tts else {
            tracing::info!("no TTS credentials, speech output unavailable");
            return Ok(None);
        };
        if !has_output_device() {
            tracing::info!("no output device, speech output unavailable");
            return Ok(None);
        }

        Ok(Some(Self {
            tts: Arc::new(tts),
            runtime: current_runtime()?,
            active: Mutex::new(None),
        }))
    }
}

impl Synthesizer for SpeakerSynthesizer {
    fn voices(&self) -> Vec<String> {
        self.tts.voices().to_vec()
    }

    fn speak(&self, utterance: Utterance, events: PlaybackEvents) -> Result<()> {
        let cancel = replace_flag(&self.active);
        let tts = Arc::clone(&self.tts);
        let runtime = self.runtime.clone();

        std::thread::Builder::new()
            .name("datachat-playback".to_string())
            .spawn(move || {
                let audio =
                    runtime.block_on(tts.synthesize(&utterance.text, utterance.voice.as_deref()));
                let audio = match audio {
                    Ok(audio) => audio,
                    Err(e) => {
                        events.failed(&e.to_string());
                        return;
                    }
                };

                if cancel.load(Ordering::Acquire) {
                    return;
                }
                events.started();

                match play_mp3_blocking(&audio, &cancel) {
                    Ok(_) => events.ended(),
                    Err(e) => events.failed(&e.to_string()),
                }
            })
            .map_err(|e| Error::Playback(format!("could not start playback thread: {e}")))?;

        Ok(())
    }

    fn cancel(&self) {
        raise_flag(&self.active);
    }
}
