//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use datachat::conversation::{DatasetSummary, InputDraft, TurnOrchestrator, TurnSlot};
use datachat::generation::{
    GenerateContentRequest, GenerationFailure, GenerationTransport, ResilientGenerationClient,
    RetryPolicy, Sleeper, TextGenerator, TransportError, TransportResponse,
};
use datachat::voice::{
    PlaybackEvents, RecognitionEvents, Recognizer, SpeechOutputChannel, Synthesizer, Utterance,
};
use datachat::{Error, Result, SummaryProvider};

/// One scripted transport outcome
pub type Step = std::result::Result<TransportResponse, TransportError>;

/// Gemini-shaped success body carrying `text`
#[must_use]
pub fn ok_body(text: &str) -> String {
    json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
    .to_string()
}

/// Transport step returning `status` with `body`
#[must_use]
pub fn status(status: u16, body: &str) -> Step {
    Ok(TransportResponse {
        status,
        body: body.to_string(),
    })
}

/// Transport step returning a 200 with generated `text`
#[must_use]
pub fn reply(text: &str) -> Step {
    status(200, &ok_body(text))
}

/// Transport step failing before any HTTP status
#[must_use]
pub fn network_error(message: &str) -> Step {
    Err(TransportError(message.to_string()))
}

/// The summary used across conversation tests
#[must_use]
pub fn sample_summary() -> DatasetSummary {
    DatasetSummary::from_value(json!({ "rows": 120, "columns": ["a", "b"] }))
        .expect("object summary")
}

/// Transport that replays a fixed script and records every prompt
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Number of requests sent so far
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Prompts in the order they were sent
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationTransport for ScriptedTransport {
    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.prompt().unwrap_or_default().to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| status(500, "script exhausted"))
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Requested delays in milliseconds
    pub fn delays_ms(&self) -> Vec<u128> {
        self.delays
            .lock()
            .unwrap()
            .iter()
            .map(Duration::as_millis)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Resilient client over a scripted transport with the default policy
#[must_use]
pub fn resilient(
    transport: &Arc<ScriptedTransport>,
    sleeper: &Arc<RecordingSleeper>,
) -> ResilientGenerationClient {
    ResilientGenerationClient::with_sleeper(
        Arc::clone(transport) as Arc<dyn GenerationTransport>,
        Arc::clone(sleeper) as Arc<dyn Sleeper>,
        RetryPolicy::default(),
    )
}

/// Generator that blocks until released, for busy-gating tests
#[derive(Default)]
pub struct GatedGenerator {
    release: Notify,
    calls: Mutex<Vec<String>>,
}

impl GatedGenerator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let the pending `generate` call finish
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for GatedGenerator {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationFailure> {
        self.calls.lock().unwrap().push(prompt.to_string());
        self.release.notified().await;
        Ok("released reply".to_string())
    }
}

/// Shared, ordered record of platform calls across fakes
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// Synthesizer that keeps the playback open until the test ends it
pub struct FakeSynthesizer {
    voices: Vec<String>,
    fail_start: bool,
    auto_finish: Mutex<usize>,
    log: CallLog,
    utterances: Mutex<Vec<Utterance>>,
    last_events: Mutex<Option<PlaybackEvents>>,
}

impl FakeSynthesizer {
    #[must_use]
    pub fn new(voices: &[&str], log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            voices: voices.iter().map(ToString::to_string).collect(),
            fail_start: false,
            auto_finish: Mutex::new(0),
            log,
            utterances: Mutex::new(Vec::new()),
            last_events: Mutex::new(None),
        })
    }

    /// Synthesizer whose `speak` always fails
    #[must_use]
    pub fn failing(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            voices: Vec::new(),
            fail_start: true,
            auto_finish: Mutex::new(0),
            log,
            utterances: Mutex::new(Vec::new()),
            last_events: Mutex::new(None),
        })
    }

    /// Synthesizer that plays its first `count` utterances to completion
    /// immediately and keeps later ones open
    #[must_use]
    pub fn finishing_first(count: usize, log: CallLog) -> Arc<Self> {
        let synth = Self::new(&["alloy"], log);
        *synth.auto_finish.lock().unwrap() = count;
        synth
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.utterances.lock().unwrap().clone()
    }

    /// Events handle of the most recent playback
    pub fn events(&self) -> PlaybackEvents {
        self.last_events
            .lock()
            .unwrap()
            .clone()
            .expect("no playback was started")
    }
}

impl Synthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<String> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, events: PlaybackEvents) -> Result<()> {
        self.log.lock().unwrap().push("speak");
        if self.fail_start {
            return Err(Error::Playback("speaker unplugged".to_string()));
        }
        self.utterances.lock().unwrap().push(utterance);

        let mut remaining = self.auto_finish.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            events.started();
            events.ended();
        }
        *self.last_events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn cancel(&self) {
        self.log.lock().unwrap().push("cancel_playback");
    }
}

/// Recognizer driven entirely by the test through its events handle
pub struct FakeRecognizer {
    log: CallLog,
    last_events: Mutex<Option<RecognitionEvents>>,
}

impl FakeRecognizer {
    #[must_use]
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            last_events: Mutex::new(None),
        })
    }

    /// Events handle of the most recent session
    pub fn events(&self) -> RecognitionEvents {
        self.last_events
            .lock()
            .unwrap()
            .clone()
            .expect("no capture session was started")
    }
}

impl Recognizer for FakeRecognizer {
    fn start(&self, events: RecognitionEvents) -> Result<()> {
        self.log.lock().unwrap().push("start_capture");
        *self.last_events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&self) {
        self.log.lock().unwrap().push("stop_capture");
    }
}

/// Summary provider with a fixed answer
pub struct FakeSummary(pub Option<DatasetSummary>);

#[async_trait]
impl SummaryProvider for FakeSummary {
    async fn fetch_summary(&self) -> Result<DatasetSummary> {
        self.0
            .clone()
            .ok_or_else(|| Error::SummaryUnavailable("No data".to_string()))
    }
}

/// Orchestrator wired to fakes
pub struct Harness {
    pub orchestrator: TurnOrchestrator,
    pub output: SpeechOutputChannel,
    pub synth: Arc<FakeSynthesizer>,
    pub slot: TurnSlot,
    pub draft: InputDraft,
    pub log: CallLog,
}

impl Harness {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        let log = CallLog::default();
        let synth = FakeSynthesizer::new(&["alloy"], Arc::clone(&log));
        let output = SpeechOutputChannel::new(
            Some(Arc::clone(&synth) as Arc<dyn Synthesizer>),
            vec!["alloy".to_string()],
        );
        let slot = TurnSlot::new();
        let draft = InputDraft::new();
        let orchestrator =
            TurnOrchestrator::new(generator, output.clone(), slot.clone(), draft.clone());

        Self {
            orchestrator,
            output,
            synth,
            slot,
            draft,
            log,
        }
    }

    /// Finish whatever the fake synthesizer is currently playing
    pub fn finish_playback(&self) {
        if self.output.is_active() {
            self.synth.events().ended();
        }
    }

    /// Load the sample summary and finish the opening greeting
    pub async fn ready_summary(&self) {
        assert!(
            self.orchestrator
                .load_summary(&FakeSummary(Some(sample_summary())))
                .await
        );
        self.finish_playback();
    }

    /// Load the summary, collect `name`, and finish both greetings
    pub async fn ready_as(&self, name: &str) {
        self.ready_summary().await;
        self.orchestrator.submit(name).await;
        self.finish_playback();
    }
}
