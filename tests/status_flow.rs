//! End-to-end status propagation: webhook deliveries go in, newline-
//! delimited JSON comes out of the client stream, and the persisted bot
//! document tracks what the stream reported.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;

use meetrelay::bot::{BotRegistry, StatusStreamEngine, WebhookIngestor};
use meetrelay::db::Store;

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    registry: Arc<BotRegistry>,
    store: Store,
    engine: StatusStreamEngine,
    ingestor: WebhookIngestor,
}

fn harness() -> Harness {
    let registry = Arc::new(BotRegistry::new());
    let store = Store::in_memory().unwrap();
    let engine = StatusStreamEngine::new(
        Arc::clone(&registry),
        store.clone(),
        Duration::from_secs(5),
    );
    let ingestor = WebhookIngestor::new(Arc::clone(&registry), store.clone());
    Harness {
        registry,
        store,
        engine,
        ingestor,
    }
}

async fn launch(h: &Harness, user_id: &str, bot_id: &str) {
    h.registry
        .register(bot_id, user_id, "https://meet.example/abc")
        .await
        .unwrap();
    h.store
        .register_bot(user_id, bot_id, "https://meet.example/abc")
        .await
        .unwrap();
}

fn status_event(bot_id: &str, code: &str, created_at: &str) -> Value {
    json!({
        "event": "bot.status_change",
        "data": {
            "bot_id": bot_id,
            "status": { "code": code, "created_at": created_at }
        }
    })
}

async fn next_line<S>(stream: &mut S) -> Option<String>
where
    S: Stream<Item = Result<String, Infallible>> + Unpin,
{
    timeout(WAIT, stream.next())
        .await
        .expect("stream made no progress")
        .map(|line| line.unwrap())
}

#[tokio::test]
async fn test_deliveries_flow_through_stream_and_store() {
    let h = harness();
    launch(&h, "u1", "b1").await;

    let mut stream = Box::pin(h.engine.event_stream("b1".to_string()));
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"bot_id\":\"b1\"}\n")
    );

    let reply = h
        .ingestor
        .ingest(status_event("b1", "in_call_recording", "2024-05-01T10:00:00+00:00"))
        .await;
    assert_eq!(reply.event.as_deref(), Some("bot.status_change"));
    assert_eq!(reply.bot_id.as_deref(), Some("b1"));
    assert_eq!(reply.status.as_deref(), Some("in call recording"));
    assert_eq!(reply.created_at.as_deref(), Some("2024-05-01T10:00:00+00:00"));
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"status\":\"in_call_recording\"}\n")
    );

    h.ingestor
        .ingest(status_event("b1", "call_ended", "2024-05-01T10:30:00+00:00"))
        .await;
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"status\":\"call_ended\"}\n")
    );
    assert_eq!(next_line(&mut stream).await, None);

    // The persisted document uses the display rendering.
    let row = h.store.get_bot("u1", "b1").await.unwrap().unwrap();
    assert_eq!(row.status.as_deref(), Some("call ended"));
    assert_eq!(
        row.status_changed_at.as_deref(),
        Some("2024-05-01T10:30:00+00:00")
    );

    // The completion confirmation lands after the stream has closed.
    h.ingestor
        .ingest(json!({ "event": "complete", "data": { "bot_id": "b1" } }))
        .await;

    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let row = h.store.get_bot("u1", "b1").await.unwrap().unwrap();
        if row.status.as_deref() == Some("complete") && h.registry.get("b1").await.is_none() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "completion was never confirmed, last status {:?}",
            row.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_events_before_attach_reach_a_late_consumer() {
    let h = harness();
    launch(&h, "u1", "b1").await;

    // The consumer has not attached yet when these arrive.
    h.ingestor
        .ingest(status_event("b1", "joining_call", "2024-05-01T09:59:00+00:00"))
        .await;
    h.ingestor
        .ingest(status_event("b1", "in_call_recording", "2024-05-01T10:00:00+00:00"))
        .await;

    let mut stream = Box::pin(h.engine.event_stream("b1".to_string()));
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"bot_id\":\"b1\"}\n")
    );
    // Only the latest state is replayed, not the intermediate history.
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"status\":\"in_call_recording\"}\n")
    );
}

#[tokio::test]
async fn test_failure_event_overrides_and_closes_stream() {
    let h = harness();
    launch(&h, "u1", "b1").await;

    let mut stream = Box::pin(h.engine.event_stream("b1".to_string()));
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"bot_id\":\"b1\"}\n")
    );

    h.ingestor
        .ingest(status_event("b1", "in_call_recording", "2024-05-01T10:00:00+00:00"))
        .await;
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"status\":\"in_call_recording\"}\n")
    );

    let reply = h
        .ingestor
        .ingest(json!({
            "event": "failed",
            "data": { "bot_id": "b1", "error": "kicked from call" }
        }))
        .await;
    assert_eq!(reply.status.as_deref(), Some("failed"));

    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"status\":\"failed\"}\n")
    );
    assert_eq!(next_line(&mut stream).await, None);

    // No handoff on failure: the record is gone and stays failed.
    assert!(h.registry.get("b1").await.is_none());
    let row = h.store.get_bot("u1", "b1").await.unwrap().unwrap();
    assert_eq!(row.status.as_deref(), Some("failed"));
}

#[tokio::test]
async fn test_stale_and_malformed_deliveries_change_nothing() {
    let h = harness();
    launch(&h, "u1", "b1").await;

    h.ingestor
        .ingest(status_event("b1", "in_call_recording", "2024-05-01T10:00:00+00:00"))
        .await;

    // A stale earlier state, an unknown code, and garbage payloads.
    h.ingestor
        .ingest(status_event("b1", "joining_call", "2024-05-01T09:00:00+00:00"))
        .await;
    h.ingestor
        .ingest(status_event("b1", "teleporting", "2024-05-01T10:01:00+00:00"))
        .await;
    h.ingestor.ingest(Value::Null).await;
    h.ingestor.ingest(json!({ "event": "complete" })).await;

    let mut stream = Box::pin(h.engine.event_stream("b1".to_string()));
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"bot_id\":\"b1\"}\n")
    );
    assert_eq!(
        next_line(&mut stream).await.as_deref(),
        Some("{\"status\":\"in_call_recording\"}\n")
    );
}
