//! Retry and backoff behavior of the generation client
//!
//! Uses a scripted transport and a recording sleeper, so no test waits

use std::sync::Arc;
use std::time::Duration;

use datachat::generation::{
    GenerationFailure, GenerationTransport, ResilientGenerationClient, RetryPolicy, Sleeper,
    TextGenerator,
};

mod common;

use common::{RecordingSleeper, ScriptedTransport, network_error, reply, resilient, status};

#[tokio::test]
async fn test_rate_limited_four_times_then_success() {
    let transport = ScriptedTransport::new(vec![
        status(429, ""),
        status(429, ""),
        status(429, ""),
        status(429, ""),
        reply("finally"),
    ]);
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    assert_eq!(client.generate("hi").await.unwrap(), "finally");
    assert_eq!(transport.calls(), 5);
    assert_eq!(sleeper.delays_ms(), vec![1000, 2000, 4000, 8000]);
}

#[tokio::test]
async fn test_rate_limited_five_times_exhausts_without_sixth_attempt() {
    let transport = ScriptedTransport::new((0..6).map(|_| status(429, "slow down")));
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    let failure = client.generate("hi").await.unwrap_err();
    assert_eq!(
        failure,
        GenerationFailure::RetriesExhausted {
            attempts: 5,
            last: Box::new(GenerationFailure::RateLimited),
        }
    );
    assert_eq!(transport.calls(), 5);
    assert_eq!(sleeper.delays_ms(), vec![1000, 2000, 4000, 8000, 16000]);
}

#[tokio::test]
async fn test_bad_request_fails_immediately() {
    let transport = ScriptedTransport::new(vec![status(400, "invalid argument"), reply("unused")]);
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    let failure = client.generate("hi").await.unwrap_err();
    assert!(matches!(
        failure,
        GenerationFailure::Unexpected {
            status: Some(400),
            ..
        }
    ));
    assert_eq!(transport.calls(), 1);
    assert!(sleeper.delays_ms().is_empty());
}

#[tokio::test]
async fn test_server_errors_and_network_errors_share_one_schedule() {
    let transport = ScriptedTransport::new(vec![
        status(503, "unavailable"),
        network_error("connection reset"),
        status(500, "oops"),
        reply("ok"),
    ]);
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    assert_eq!(client.generate("hi").await.unwrap(), "ok");
    assert_eq!(sleeper.delays_ms(), vec![1000, 2000, 4000]);
}

#[tokio::test]
async fn test_malformed_success_retries_without_delay() {
    let transport = ScriptedTransport::new(vec![
        status(200, r#"{"candidates":[]}"#),
        status(429, ""),
        status(200, "not json at all"),
        status(429, ""),
        reply("done"),
    ]);
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    assert_eq!(client.generate("hi").await.unwrap(), "done");
    assert_eq!(transport.calls(), 5);
    // Malformed bodies neither wait nor advance the schedule
    assert_eq!(sleeper.delays_ms(), vec![1000, 2000]);
}

#[tokio::test]
async fn test_malformed_success_every_time_exhausts() {
    let transport = ScriptedTransport::new((0..5).map(|_| status(200, "{}")));
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    let failure = client.generate("hi").await.unwrap_err();
    let GenerationFailure::RetriesExhausted { attempts, last } = failure else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts, 5);
    assert!(matches!(
        *last,
        GenerationFailure::Unexpected {
            status: Some(200),
            ..
        }
    ));
    assert!(sleeper.delays_ms().is_empty());
}

#[tokio::test]
async fn test_prompt_sent_verbatim_as_single_turn() {
    let transport = ScriptedTransport::new(vec![reply("ok")]);
    let sleeper = RecordingSleeper::new();
    let client = resilient(&transport, &sleeper);

    client.generate("Describe the dataset").await.unwrap();
    assert_eq!(transport.prompts(), vec!["Describe the dataset".to_string()]);
}

#[tokio::test]
async fn test_custom_policy_is_honored() {
    let transport = ScriptedTransport::new((0..3).map(|_| status(502, "")));
    let sleeper = RecordingSleeper::new();
    let client = ResilientGenerationClient::with_sleeper(
        Arc::clone(&transport) as Arc<dyn GenerationTransport>,
        Arc::clone(&sleeper) as Arc<dyn Sleeper>,
        RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(250),
        },
    );

    let failure = client.generate("hi").await.unwrap_err();
    assert!(matches!(
        failure,
        GenerationFailure::RetriesExhausted { attempts: 2, .. }
    ));
    assert_eq!(transport.calls(), 2);
    assert_eq!(sleeper.delays_ms(), vec![250, 500]);
}
