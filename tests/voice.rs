//! Speech channel integration tests
//!
//! Exercise both channels against fake platform backends, without audio hardware

use std::sync::Arc;

use tokio::sync::mpsc;

use datachat::Error;
use datachat::conversation::{InputDraft, LISTENING_PLACEHOLDER, TurnSlot};
use datachat::voice::{
    ListeningState, NoticeKind, PlaybackState, RecognitionEvent, Recognizer, SessionEvent,
    SpeakOutcome, SpeechInputChannel, SpeechOutputChannel, Synthesizer,
};

mod common;

use common::{CallLog, FakeRecognizer, FakeSynthesizer};

struct Rig {
    log: CallLog,
    synth: Arc<FakeSynthesizer>,
    recognizer: Arc<FakeRecognizer>,
    output: SpeechOutputChannel,
    input: SpeechInputChannel,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    notices: mpsc::UnboundedReceiver<datachat::voice::Notice>,
    slot: TurnSlot,
    draft: InputDraft,
}

fn rig(voices: &[&str], preferred: &[&str]) -> Rig {
    let log = CallLog::default();
    let synth = FakeSynthesizer::new(voices, Arc::clone(&log));
    let recognizer = FakeRecognizer::new(Arc::clone(&log));
    let (notice_tx, notices) = mpsc::unbounded_channel();

    let output = SpeechOutputChannel::with_notices(
        Some(Arc::clone(&synth) as Arc<dyn Synthesizer>),
        preferred.iter().map(ToString::to_string).collect(),
        notice_tx.clone(),
    );
    let slot = TurnSlot::new();
    let draft = InputDraft::new();
    let (input, events) = SpeechInputChannel::new(
        Some(Arc::clone(&recognizer) as Arc<dyn Recognizer>),
        output.clone(),
        slot.clone(),
        draft.clone(),
        notice_tx,
    );

    Rig {
        log,
        synth,
        recognizer,
        output,
        input,
        events,
        notices,
        slot,
        draft,
    }
}

/// Feed every queued recognizer event through the channel
fn pump(rig: &mut Rig) -> Vec<String> {
    let mut transcripts = Vec::new();
    while let Ok((session, event)) = rig.events.try_recv() {
        if let Some(text) = rig.input.handle_event(session, event) {
            transcripts.push(text);
        }
    }
    transcripts
}

#[test]
fn test_second_speak_is_dropped_while_active() {
    let rig = rig(&["alloy"], &[]);

    assert_eq!(
        rig.output.speak("first"),
        SpeakOutcome::Started { voice: None }
    );
    rig.synth.events().started();
    assert!(rig.output.is_speaking());

    assert_eq!(rig.output.speak("second"), SpeakOutcome::Dropped);
    assert_eq!(rig.synth.utterances().len(), 1);
    assert!(rig.output.is_speaking());

    rig.synth.events().ended();
    assert_eq!(rig.output.state(), PlaybackState::Idle);
    assert!(matches!(
        rig.output.speak("third"),
        SpeakOutcome::Started { .. }
    ));
}

#[test]
fn test_preferred_voice_is_selected_when_offered() {
    let rig = rig(&["alloy", "nova"], &["onyx", "nova"]);

    assert_eq!(
        rig.output.speak("hello"),
        SpeakOutcome::Started {
            voice: Some("nova".to_string())
        }
    );
    assert_eq!(rig.synth.utterances()[0].voice.as_deref(), Some("nova"));
}

#[test]
fn test_stop_cancels_and_retires_session() {
    let rig = rig(&["alloy"], &[]);

    rig.output.speak("long answer");
    let stale = rig.synth.events();
    stale.started();

    rig.output.stop();
    assert_eq!(rig.output.state(), PlaybackState::Idle);
    assert_eq!(*rig.log.lock().unwrap(), vec!["speak", "cancel_playback"]);

    // Late events from the stopped playback change nothing
    rig.output.speak("next");
    stale.ended();
    assert_eq!(rig.output.state(), PlaybackState::Pending);
    stale.started();
    assert_eq!(rig.output.state(), PlaybackState::Pending);
}

#[test]
fn test_stop_when_idle_is_safe() {
    let rig = rig(&["alloy"], &[]);
    rig.output.stop();
    assert_eq!(rig.output.state(), PlaybackState::Idle);
    assert!(rig.log.lock().unwrap().is_empty());
}

#[test]
fn test_playback_error_clears_flag_and_notifies() {
    let mut rig = rig(&["alloy"], &[]);

    rig.output.speak("hello");
    rig.synth.events().started();
    rig.synth.events().failed("device lost");

    assert!(!rig.output.is_active());
    let notice = rig.notices.try_recv().unwrap();
    assert_eq!(notice.kind, NoticeKind::Playback);
    assert_eq!(notice.message, "device lost");
}

#[test]
fn test_refused_playback_resets_channel() {
    let log = CallLog::default();
    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let output = SpeechOutputChannel::with_notices(
        Some(FakeSynthesizer::failing(log) as Arc<dyn Synthesizer>),
        Vec::new(),
        notice_tx,
    );

    assert!(matches!(output.speak("hello"), SpeakOutcome::Failed(_)));
    assert_eq!(output.state(), PlaybackState::Idle);
    assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::Playback);
}

#[test]
fn test_capture_stops_playback_first() {
    let mut rig = rig(&["alloy"], &[]);

    rig.output.speak("answer");
    rig.synth.events().started();

    rig.input.start().unwrap();
    assert!(!rig.output.is_active());
    assert_eq!(
        *rig.log.lock().unwrap(),
        vec!["speak", "cancel_playback", "start_capture"]
    );
}

#[test]
fn test_one_transcript_per_session() {
    let mut rig = rig(&[], &[]);

    rig.input.start().unwrap();
    assert_eq!(rig.input.state(), ListeningState::Starting);

    let events = rig.recognizer.events();
    events.send(RecognitionEvent::Started);
    events.send(RecognitionEvent::Transcript("average of a".to_string()));
    events.send(RecognitionEvent::Transcript("duplicate".to_string()));
    events.send(RecognitionEvent::Ended);

    assert_eq!(pump(&mut rig), vec!["average of a".to_string()]);
    assert_eq!(rig.input.state(), ListeningState::Idle);
    assert_eq!(rig.draft.get(), "average of a");
}

#[test]
fn test_started_sets_placeholder_and_error_clears_it() {
    let mut rig = rig(&[], &[]);

    rig.input.start().unwrap();
    let events = rig.recognizer.events();
    events.send(RecognitionEvent::Started);
    pump(&mut rig);
    assert!(rig.input.is_listening());
    assert_eq!(rig.draft.get(), LISTENING_PLACEHOLDER);

    events.send(RecognitionEvent::Error("no speech detected".to_string()));
    assert!(pump(&mut rig).is_empty());
    assert_eq!(rig.input.state(), ListeningState::Idle);
    assert_eq!(rig.draft.get(), "");

    let notice = rig.notices.try_recv().unwrap();
    assert_eq!(notice.kind, NoticeKind::Recognition);
}

#[test]
fn test_new_session_replaces_old_one() {
    let mut rig = rig(&[], &[]);

    rig.input.start().unwrap();
    let old = rig.recognizer.events();
    rig.input.start().unwrap();
    let current = rig.recognizer.events();
    assert_ne!(old.session(), current.session());
    assert_eq!(
        *rig.log.lock().unwrap(),
        vec!["start_capture", "stop_capture", "start_capture"]
    );

    old.send(RecognitionEvent::Transcript("stale".to_string()));
    current.send(RecognitionEvent::Transcript("fresh".to_string()));
    assert_eq!(pump(&mut rig), vec!["fresh".to_string()]);
}

#[test]
fn test_stop_ignores_late_transcript() {
    let mut rig = rig(&[], &[]);

    rig.input.start().unwrap();
    let events = rig.recognizer.events();
    events.send(RecognitionEvent::Started);
    pump(&mut rig);

    rig.input.stop();
    assert_eq!(rig.draft.get(), "");
    events.send(RecognitionEvent::Transcript("too late".to_string()));
    assert!(pump(&mut rig).is_empty());
}

#[test]
fn test_capture_refused_while_turn_in_flight() {
    let mut rig = rig(&[], &[]);
    let _turn = rig.slot.try_acquire().unwrap();

    let err = rig.input.start().unwrap_err();
    assert!(matches!(err, Error::Recognition(_)));
    assert!(rig.log.lock().unwrap().is_empty());
    assert!(!rig.input.is_active());
}

#[test]
fn test_missing_recognizer_reports_capability() {
    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let (mut input, _events) = SpeechInputChannel::new(
        None,
        SpeechOutputChannel::disabled(),
        TurnSlot::new(),
        InputDraft::new(),
        notice_tx,
    );

    assert!(!input.is_supported());
    assert!(matches!(
        input.start(),
        Err(Error::CapabilityUnavailable(_))
    ));
    assert!(!input.is_active());
    assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::Capability);
}

#[test]
fn test_toggle_starts_then_stops() {
    let mut rig = rig(&[], &[]);

    rig.input.toggle().unwrap();
    assert!(rig.input.is_active());
    rig.input.toggle().unwrap();
    assert!(!rig.input.is_active());
    assert_eq!(
        *rig.log.lock().unwrap(),
        vec!["start_capture", "stop_capture"]
    );
}
