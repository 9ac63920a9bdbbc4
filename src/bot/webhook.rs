//! Webhook intake: classification and application of bot status events.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::db::Store;

use super::registry::BotRegistry;
use super::status::LifecycleState;

/// What an inbound webhook payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedEvent {
    StatusChange {
        bot_id: String,
        code: String,
        state: Option<LifecycleState>,
        created_at: Option<String>,
    },
    Failure {
        bot_id: String,
        error: Option<String>,
    },
    Completed {
        bot_id: String,
    },
    Unrecognized,
}

/// Acknowledgement returned to the sender. Webhook responses are always
/// 200-shaped so the sender never retries a delivery we chose to ignore.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReply {
    pub event: Option<String>,
    pub bot_id: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

/// Classifies a payload without touching any state. Payloads with no
/// usable event or bot id are unrecognized, never errors.
pub fn classify(payload: &Value) -> ClassifiedEvent {
    let Some(event) = payload["event"].as_str() else {
        return ClassifiedEvent::Unrecognized;
    };
    let data = &payload["data"];
    let Some(bot_id) = data["bot_id"].as_str() else {
        return ClassifiedEvent::Unrecognized;
    };

    match event {
        "bot.status_change" => {
            let code = data["status"]["code"].as_str().unwrap_or_default().to_string();
            let created_at = data["status"]["created_at"].as_str().map(str::to_string);
            let state = LifecycleState::from_code(&code);
            ClassifiedEvent::StatusChange {
                bot_id: bot_id.to_string(),
                code,
                state,
                created_at,
            }
        }
        "failed" => ClassifiedEvent::Failure {
            bot_id: bot_id.to_string(),
            error: data["error"].as_str().map(str::to_string),
        },
        "complete" => ClassifiedEvent::Completed {
            bot_id: bot_id.to_string(),
        },
        _ => ClassifiedEvent::Unrecognized,
    }
}

/// The sole writer of externally sourced transitions into the registry.
pub struct WebhookIngestor {
    registry: Arc<BotRegistry>,
    store: Store,
}

impl WebhookIngestor {
    pub fn new(registry: Arc<BotRegistry>, store: Store) -> Self {
        Self { registry, store }
    }

    /// Classifies and applies one delivery, mirroring applied transitions
    /// into the store. The reply echoes the sender's own fields; `status`
    /// is the display rendering of the event's code, `waiting` when the
    /// code was not recognized.
    pub async fn ingest(&self, payload: Value) -> WebhookReply {
        let status = match classify(&payload) {
            ClassifiedEvent::StatusChange {
                bot_id,
                code,
                state,
                created_at,
            } => match state {
                Some(state) => {
                    self.apply_and_mirror(&bot_id, state, created_at).await;
                    Some(state.display_label().to_string())
                }
                None => {
                    info!("Unrecognized status code \"{}\" for bot {}", code, bot_id);
                    Some(LifecycleState::Unknown.display_label().to_string())
                }
            },
            ClassifiedEvent::Failure { bot_id, error } => {
                match &error {
                    Some(error) => warn!("Bot {} reported failure: {}", bot_id, error),
                    None => warn!("Bot {} reported failure", bot_id),
                }
                // Failure events carry no timestamp of their own.
                let failed_at = chrono::Utc::now().to_rfc3339();
                self.apply_and_mirror(&bot_id, LifecycleState::Failed, Some(failed_at))
                    .await;
                Some(LifecycleState::Failed.display_label().to_string())
            }
            ClassifiedEvent::Completed { bot_id } => {
                self.apply_complete(&bot_id).await;
                Some(LifecycleState::Complete.display_label().to_string())
            }
            ClassifiedEvent::Unrecognized => {
                info!(
                    "Ignoring unrecognized webhook event {:?}",
                    payload["event"].as_str().unwrap_or("<none>")
                );
                None
            }
        };

        WebhookReply {
            event: payload["event"].as_str().map(str::to_string),
            bot_id: payload["data"]["bot_id"].as_str().map(str::to_string),
            status,
            created_at: payload["data"]["status"]["created_at"]
                .as_str()
                .map(str::to_string),
        }
    }

    /// Mirrors the registry's post-transition state rather than the raw
    /// incoming code, so the document can never record a regression the
    /// state machine refused. Store failures are logged and swallowed.
    async fn apply_and_mirror(
        &self,
        bot_id: &str,
        state: LifecycleState,
        created_at: Option<String>,
    ) {
        let Some(record) = self
            .registry
            .apply_transition(bot_id, state, created_at)
            .await
        else {
            return;
        };
        if let Err(e) = self
            .store
            .set_bot_status(
                &record.owner_id,
                bot_id,
                record.status.state.display_label(),
                record.status.created_at.clone(),
            )
            .await
        {
            warn!("Failed to mirror status for bot {}: {}", bot_id, e);
        }
    }

    async fn apply_complete(&self, bot_id: &str) {
        let confirmed_at = chrono::Utc::now().to_rfc3339();
        let Some(record) = self
            .registry
            .apply_transition(bot_id, LifecycleState::Complete, Some(confirmed_at))
            .await
        else {
            return;
        };
        if record.status.state == LifecycleState::Complete {
            if let Err(e) = self
                .store
                .set_bot_status(
                    &record.owner_id,
                    bot_id,
                    record.status.state.display_label(),
                    record.status.created_at.clone(),
                )
                .await
            {
                warn!("Failed to mirror completion for bot {}: {}", bot_id, e);
            }
        } else {
            warn!(
                "Completion event for bot {} with no terminal state recorded, ignoring",
                bot_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status_payload(bot_id: &str, code: &str, created_at: &str) -> Value {
        json!({
            "event": "bot.status_change",
            "data": {
                "bot_id": bot_id,
                "status": { "code": code, "created_at": created_at }
            }
        })
    }

    #[test]
    fn test_classify_status_change() {
        let event = classify(&status_payload("b1", "in_call_recording", "t1"));
        assert_eq!(
            event,
            ClassifiedEvent::StatusChange {
                bot_id: "b1".to_string(),
                code: "in_call_recording".to_string(),
                state: Some(LifecycleState::InCallRecording),
                created_at: Some("t1".to_string()),
            }
        );
    }

    #[test]
    fn test_classify_unknown_code_keeps_event() {
        let event = classify(&status_payload("b1", "rebooting", "t1"));
        match event {
            ClassifiedEvent::StatusChange { state, code, .. } => {
                assert_eq!(state, None);
                assert_eq!(code, "rebooting");
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_and_complete() {
        let failure = classify(&json!({
            "event": "failed",
            "data": { "bot_id": "b1", "error": "kicked from call" }
        }));
        assert_eq!(
            failure,
            ClassifiedEvent::Failure {
                bot_id: "b1".to_string(),
                error: Some("kicked from call".to_string()),
            }
        );

        let complete = classify(&json!({ "event": "complete", "data": { "bot_id": "b1" } }));
        assert_eq!(
            complete,
            ClassifiedEvent::Completed {
                bot_id: "b1".to_string()
            }
        );
    }

    #[test]
    fn test_classify_unrecognized_shapes() {
        assert_eq!(classify(&json!({})), ClassifiedEvent::Unrecognized);
        assert_eq!(classify(&Value::Null), ClassifiedEvent::Unrecognized);
        assert_eq!(
            classify(&json!({ "event": "bot.status_change", "data": {} })),
            ClassifiedEvent::Unrecognized
        );
        assert_eq!(
            classify(&json!({ "event": "bot.renamed", "data": { "bot_id": "b1" } })),
            ClassifiedEvent::Unrecognized
        );
    }

    fn ingestor() -> (Arc<BotRegistry>, Store, WebhookIngestor) {
        let registry = Arc::new(BotRegistry::new());
        let store = Store::in_memory().unwrap();
        let ingestor = WebhookIngestor::new(Arc::clone(&registry), store.clone());
        (registry, store, ingestor)
    }

    #[tokio::test]
    async fn test_ingest_applies_and_mirrors() {
        let (registry, store, ingestor) = ingestor();
        registry.register("b1", "u1", "https://x").await.unwrap();

        let reply = ingestor
            .ingest(status_payload("b1", "in_call_recording", "t1"))
            .await;
        assert_eq!(reply.event.as_deref(), Some("bot.status_change"));
        assert_eq!(reply.bot_id.as_deref(), Some("b1"));
        assert_eq!(reply.status.as_deref(), Some("in call recording"));
        assert_eq!(reply.created_at.as_deref(), Some("t1"));

        let record = registry.get("b1").await.unwrap();
        assert_eq!(record.status.state, LifecycleState::InCallRecording);
        let row = store.get_bot("u1", "b1").await.unwrap().unwrap();
        assert_eq!(row.status.as_deref(), Some("in call recording"));
    }

    #[tokio::test]
    async fn test_ingest_unknown_bot_creates_nothing() {
        let (registry, _store, ingestor) = ingestor();

        let reply = ingestor
            .ingest(status_payload("ghost", "joining_call", "t1"))
            .await;
        assert_eq!(reply.bot_id.as_deref(), Some("ghost"));
        assert_eq!(reply.status.as_deref(), Some("joining call"));
        assert!(registry.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_ingest_unrecognized_code_is_waiting() {
        let (registry, _store, ingestor) = ingestor();
        registry.register("b1", "u1", "https://x").await.unwrap();

        let reply = ingestor.ingest(status_payload("b1", "rebooting", "t1")).await;
        assert_eq!(reply.status.as_deref(), Some("waiting"));
        // Display-only: the record did not transition.
        let record = registry.get("b1").await.unwrap();
        assert_eq!(record.status.state, LifecycleState::Unknown);
    }

    #[tokio::test]
    async fn test_ingest_failure_overrides() {
        let (registry, store, ingestor) = ingestor();
        registry.register("b1", "u1", "https://x").await.unwrap();
        ingestor
            .ingest(status_payload("b1", "in_call_recording", "t1"))
            .await;

        let reply = ingestor
            .ingest(json!({
                "event": "failed",
                "data": { "bot_id": "b1", "error": "meeting not reachable" }
            }))
            .await;
        assert_eq!(reply.status.as_deref(), Some("failed"));

        let record = registry.get("b1").await.unwrap();
        assert_eq!(record.status.state, LifecycleState::Failed);
        let row = store.get_bot("u1", "b1").await.unwrap().unwrap();
        assert_eq!(row.status.as_deref(), Some("failed"));
    }

    #[tokio::test]
    async fn test_ingest_complete_requires_terminal() {
        let (registry, store, ingestor) = ingestor();
        registry.register("b1", "u1", "https://x").await.unwrap();

        ingestor
            .ingest(json!({ "event": "complete", "data": { "bot_id": "b1" } }))
            .await;
        let record = registry.get("b1").await.unwrap();
        assert_eq!(record.status.state, LifecycleState::Unknown);

        ingestor
            .ingest(status_payload("b1", "call_ended", "t2"))
            .await;
        ingestor
            .ingest(json!({ "event": "complete", "data": { "bot_id": "b1" } }))
            .await;
        let record = registry.get("b1").await.unwrap();
        assert_eq!(record.status.state, LifecycleState::Complete);
        let row = store.get_bot("u1", "b1").await.unwrap().unwrap();
        assert_eq!(row.status.as_deref(), Some("complete"));
    }

    #[tokio::test]
    async fn test_ingest_garbage_payload_replies_empty() {
        let (_registry, _store, ingestor) = ingestor();
        let reply = ingestor.ingest(Value::Null).await;
        assert!(reply.event.is_none());
        assert!(reply.bot_id.is_none());
        assert!(reply.status.is_none());
        assert!(reply.created_at.is_none());
    }
}
