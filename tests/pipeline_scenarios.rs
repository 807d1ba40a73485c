//! End-to-end pipeline scenarios against a scripted transport.

use botgate::http::TransportError;
use botgate::pipeline::{InvokeOptions, Pipeline, PipelineSettings};
use botgate::{ApiReply, CircuitState, InstantSleeper, ManualClock, ScriptedTransport, TrackingSleeper};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn build_pipeline(
    transport: ScriptedTransport,
    clock: ManualClock,
    settings: PipelineSettings,
) -> Pipeline {
    Pipeline::builder(Arc::new(transport))
        .clock(clock)
        .sleeper(InstantSleeper)
        .settings(settings)
        .build()
        .expect("pipeline builds")
}

#[tokio::test]
async fn cache_hit_skips_the_network_entirely() {
    let transport = ScriptedTransport::always_ok();
    let clock = ManualClock::new();
    let pipeline = build_pipeline(transport.clone(), clock, PipelineSettings::default());

    pipeline.cache().store(
        "get_identity",
        &json!({}),
        json!({"id": 7}),
        Some(Duration::from_secs(60)),
    );

    let first = pipeline.invoke("get_identity", json!({}), InvokeOptions::default()).await;
    let second = pipeline.invoke("get_identity", json!({}), InvokeOptions::default()).await;

    assert_eq!(transport.call_count(), 0, "no outbound calls on cache hits");
    for reply in [first, second] {
        assert!(reply.ok);
        assert_eq!(reply.result, Some(json!({"id": 7})));
    }
    // A hit consumes no budget and leaves the breaker untouched.
    assert_eq!(pipeline.global_limiter().in_window(), 0);
    assert_eq!(pipeline.breaker().phase(), CircuitState::Closed);
}

#[tokio::test]
async fn client_errors_are_not_retried_and_spare_the_breaker() {
    let transport = ScriptedTransport::always_ok();
    transport.push(Ok(ApiReply::failure(400, "Bad Request")));
    let pipeline = build_pipeline(
        transport.clone(),
        ManualClock::new(),
        PipelineSettings { max_retries: 3, ..Default::default() },
    );

    let reply = pipeline
        .invoke("send_text", json!({"chat_id": 123, "text": "x"}), InvokeOptions::default())
        .await;

    assert_eq!(transport.call_count(), 1, "a 400 never retries");
    assert!(!reply.ok);
    assert_eq!(reply.error_code, Some(400));
    assert_eq!(reply.description.as_deref(), Some("Bad Request"));
    assert_eq!(pipeline.breaker().phase(), CircuitState::Closed);
    assert_eq!(pipeline.breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn breaker_opens_after_five_transport_failures() {
    let transport =
        ScriptedTransport::always_err(TransportError::Network("connection refused".to_string()));
    let pipeline = build_pipeline(
        transport.clone(),
        ManualClock::new(),
        PipelineSettings { max_retries: 0, ..Default::default() },
    );

    for _ in 0..5 {
        let reply = pipeline.invoke("get_identity", json!({}), InvokeOptions::default()).await;
        assert!(!reply.ok);
        assert_eq!(reply.error_code, None, "transport failures carry no code");
    }
    assert_eq!(pipeline.breaker().phase(), CircuitState::Open);
    assert_eq!(transport.call_count(), 5);

    let sixth = pipeline.invoke("get_identity", json!({}), InvokeOptions::default()).await;
    assert_eq!(sixth.error_code, Some(503));
    assert!(sixth.description.unwrap().contains("circuit breaker open"));
    assert_eq!(transport.call_count(), 5, "open breaker performs zero transport calls");
}

#[tokio::test]
async fn per_chat_private_limit_paces_one_send_per_second() {
    let transport = ScriptedTransport::always_ok();
    let clock = ManualClock::new();
    let pipeline = build_pipeline(
        transport.clone(),
        clock.clone(),
        PipelineSettings { rate_limit_per_minute: 60, max_retries: 0, ..Default::default() },
    );

    let first = pipeline
        .invoke("send_text", json!({"chat_id": 12345, "text": "a"}), InvokeOptions::default())
        .await;
    assert!(first.ok);

    clock.advance(200);
    let second = pipeline
        .invoke("send_text", json!({"chat_id": 12345, "text": "b"}), InvokeOptions::default())
        .await;
    assert!(!second.ok);
    assert_eq!(second.error_code, Some(429));
    assert!(second.description.as_deref().unwrap().contains("Per-chat rate limit"));
    assert_eq!(transport.call_count(), 1, "the refused send never reaches the wire");

    clock.advance(900);
    let third = pipeline
        .invoke("send_text", json!({"chat_id": 12345, "text": "c"}), InvokeOptions::default())
        .await;
    assert!(third.ok);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn per_chat_limits_are_independent_across_destinations() {
    let transport = ScriptedTransport::always_ok();
    let pipeline =
        build_pipeline(transport.clone(), ManualClock::new(), PipelineSettings::default());

    let first = pipeline
        .invoke("send_text", json!({"chat_id": 111, "text": "a"}), InvokeOptions::default())
        .await;
    let second = pipeline
        .invoke("send_text", json!({"chat_id": 222, "text": "b"}), InvokeOptions::default())
        .await;

    assert!(first.ok);
    assert!(second.ok);
    assert_eq!(transport.call_count(), 2);
    assert_eq!(pipeline.per_chat_limiter().tracked(), 2);
}

#[tokio::test]
async fn retry_waits_the_server_supplied_delay() {
    let transport = ScriptedTransport::always_ok();
    transport.push(Ok(ApiReply::rate_limited("Too Many Requests: retry after 2", 2)));
    transport.push(Ok(ApiReply::success(json!({"message_id": 5}))));

    let sleeper = TrackingSleeper::new();
    let pipeline = Pipeline::builder(Arc::new(transport.clone()))
        .clock(ManualClock::new())
        .sleeper(sleeper.clone())
        .settings(PipelineSettings { max_retries: 1, ..Default::default() })
        .build()
        .expect("pipeline builds");

    let reply = pipeline
        .invoke("send_text", json!({"chat_id": 1, "text": "x"}), InvokeOptions::default())
        .await;

    assert!(reply.ok, "second attempt's envelope is returned");
    assert_eq!(reply.result, Some(json!({"message_id": 5})));
    assert_eq!(transport.call_count(), 2);
    assert_eq!(
        sleeper.calls(),
        vec![Duration::from_secs(2)],
        "the wait between attempts is the server-supplied delay"
    );
}

#[tokio::test]
async fn retries_consume_global_budget_per_attempt() {
    let transport = ScriptedTransport::always_ok();
    transport.push(Ok(ApiReply::failure(500, "Internal Server Error")));
    transport.push(Ok(ApiReply::failure(500, "Internal Server Error")));
    transport.push(Ok(ApiReply::success(json!({}))));

    let pipeline = build_pipeline(
        transport.clone(),
        ManualClock::new(),
        PipelineSettings { max_retries: 2, ..Default::default() },
    );

    let reply = pipeline.invoke("get_chat", json!({"chat_id": 1}), InvokeOptions::default()).await;
    assert!(reply.ok);
    assert_eq!(transport.call_count(), 3);
    assert_eq!(pipeline.global_limiter().in_window(), 3, "each attempt records budget");
}

#[tokio::test]
async fn success_stores_into_the_cache_for_the_next_caller() {
    let transport = ScriptedTransport::always_ok();
    transport.push(Ok(ApiReply::success(json!({"id": 42, "is_bot": true}))));
    let pipeline =
        build_pipeline(transport.clone(), ManualClock::new(), PipelineSettings::default());

    let first = pipeline.invoke("get_identity", json!({}), InvokeOptions::default()).await;
    assert!(first.ok);
    assert_eq!(transport.call_count(), 1);

    let second = pipeline.invoke("get_identity", json!({}), InvokeOptions::default()).await;
    assert!(second.ok);
    assert_eq!(second.result, Some(json!({"id": 42, "is_bot": true})));
    assert_eq!(transport.call_count(), 1, "the second caller hits the cache");
}

#[tokio::test]
async fn breaker_recovers_through_half_open_probe() {
    let transport = ScriptedTransport::always_ok();
    for _ in 0..5 {
        transport.push(Err(TransportError::Network("down".to_string())));
    }
    let clock = ManualClock::new();
    let pipeline = build_pipeline(
        transport.clone(),
        clock.clone(),
        PipelineSettings { max_retries: 0, ..Default::default() },
    );

    for _ in 0..5 {
        let _ = pipeline
            .invoke("send_text", json!({"chat_id": 9, "text": "x"}), InvokeOptions::default())
            .await;
    }
    assert_eq!(pipeline.breaker().phase(), CircuitState::Open);

    clock.advance(30_000);
    let probe = pipeline
        .invoke("send_text", json!({"chat_id": 9, "text": "probe"}), InvokeOptions::default())
        .await;
    assert!(probe.ok, "half-open probe reaches the wire and succeeds");
    assert_eq!(pipeline.breaker().phase(), CircuitState::Closed);
}

#[tokio::test]
async fn concurrent_invocations_share_the_guards_safely() {
    let transport = ScriptedTransport::always_ok();
    let pipeline = Arc::new(build_pipeline(
        transport.clone(),
        ManualClock::new(),
        PipelineSettings { rate_limit_per_minute: 60, ..Default::default() },
    ));

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .invoke(
                        "send_text",
                        json!({"chat_id": 1000 + i, "text": "hi"}),
                        InvokeOptions::default(),
                    )
                    .await
            })
        })
        .collect();

    let replies = futures::future::join_all(tasks).await;
    for reply in replies {
        assert!(reply.unwrap().ok);
    }
    assert_eq!(transport.call_count(), 10);
    assert_eq!(pipeline.global_limiter().in_window(), 10);
    assert_eq!(pipeline.per_chat_limiter().tracked(), 10);
}
