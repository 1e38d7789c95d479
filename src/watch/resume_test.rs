use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::resume::*;
use crate::test_utils::change_event;
use crate::test_utils::ScriptedTransport;
use crate::BackoffPolicy;
use crate::ChangeNotification;
use crate::StreamError;
use crate::WatchClient;
use crate::WatchOptions;

fn policy(max_retries: usize) -> BackoffPolicy {
    BackoffPolicy {
        max_retries,
        base_delay_ms: 100,
        max_delay_ms: 1_000,
    }
}

fn client(transport: &Arc<ScriptedTransport>) -> Arc<WatchClient> {
    let client = WatchClient::builder("http://localhost:8080")
        .token("test-token")
        .default_timeout(None)
        .transport(transport.clone())
        .build()
        .unwrap();
    Arc::new(client)
}

fn connect_error() -> StreamError {
    StreamError::Connect {
        message: "connection refused".to_string(),
    }
}

async fn drain(
    stream: impl Stream<Item = std::result::Result<ChangeNotification, StreamError>>
) -> Vec<std::result::Result<ChangeNotification, StreamError>> {
    stream.collect().await
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_resumes_from_last_event_id_after_disconnect() {
    let transport = ScriptedTransport::new();
    let first = transport.push_stream();
    let second = transport.push_stream();

    first.send_with_id(change_event("CREATED", "a"), "5");
    drop(first);
    second.send(change_event("UPDATED", "a"));
    second.done();

    let items = drain(resume_watch(client(&transport), WatchOptions::default(), policy(3))).await;

    let ids: Vec<_> = items.into_iter().map(|i| i.unwrap().kind.as_str()).collect();
    assert_eq!(ids, vec!["CREATED", "UPDATED"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].resume_token, None);
    assert_eq!(requests[1].resume_token.as_deref(), Some("5"));
    assert!(requests[1].url.query().unwrap().contains("resource_version=5"));
}

#[tokio::test(start_paused = true)]
async fn test_caller_resume_token_is_used_first() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.done();

    let options = WatchOptions::default().resume_token("rv-1");
    let items = drain(resume_watch(client(&transport), options, policy(3))).await;

    assert!(items.is_empty());
    assert_eq!(transport.requests()[0].resume_token.as_deref(), Some("rv-1"));
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_is_surfaced_without_retry() {
    let transport = ScriptedTransport::new();
    transport.push_failure(StreamError::Status {
        status: 403,
        message: "forbidden".to_string(),
    });

    let items = drain(resume_watch(client(&transport), WatchOptions::default(), policy(5))).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(StreamError::Status { status: 403, .. })));
    assert_eq!(transport.subscribe_count(), 1);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_gives_up_after_max_retries() {
    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        transport.push_failure(connect_error());
    }

    let items = drain(resume_watch(client(&transport), WatchOptions::default(), policy(2))).await;

    assert_eq!(items, vec![Err(connect_error())]);
    assert_eq!(transport.subscribe_count(), 3);
    assert!(logs_contain("giving up"));
}

#[tokio::test(start_paused = true)]
async fn test_delivered_notification_resets_retry_budget() {
    let transport = ScriptedTransport::new();
    transport.push_failure(connect_error());
    let feed = transport.push_stream();
    feed.send(change_event("CREATED", "a"));
    drop(feed);
    let last = transport.push_stream();
    last.done();

    let items = drain(resume_watch(client(&transport), WatchOptions::default(), policy(1))).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().resource_id, "a");
    assert_eq!(transport.subscribe_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff_ends_stream() {
    let transport = ScriptedTransport::new();
    transport.push_failure(connect_error());
    let cancel = CancellationToken::new();

    let slow = BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 60_000,
        max_delay_ms: 60_000,
    };
    let options = WatchOptions::default().cancellation(cancel.clone());
    let stream = resume_watch(client(&transport), options, slow);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let items = drain(stream).await;
    canceller.await.unwrap();

    assert!(items.is_empty());
    assert_eq!(transport.subscribe_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overall_timeout_spans_reconnects() {
    let transport = ScriptedTransport::new();
    transport.push_failure(connect_error());
    // second subscription stays open and silent
    let started = tokio::time::Instant::now();

    let options = WatchOptions::default().timeout(Duration::from_secs(30));
    let items = drain(resume_watch(client(&transport), options, policy(0))).await;

    assert!(items.is_empty());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30));
    assert!(elapsed < Duration::from_secs(31));
    assert_eq!(transport.subscribe_count(), 2);
}

#[tokio::test]
async fn test_unbounded_timeout_resumes_without_deadline() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.send(change_event("CREATED", "a"));
    feed.done();

    let options = WatchOptions::default().timeout(Duration::MAX);
    let items = drain(resume_watch(client(&transport), options, policy(3))).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().resource_id, "a");
    assert_eq!(transport.subscribe_count(), 1);
}
