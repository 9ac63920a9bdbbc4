//! Live status streaming and the completion watcher.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::Store;

use super::registry::{BotRegistry, ConfirmationOutcome};
use super::status::LifecycleState;

/// Produces the per-consumer NDJSON status stream and drives persistence
/// of each transition as it is observed.
#[derive(Clone)]
pub struct StatusStreamEngine {
    registry: Arc<BotRegistry>,
    store: Store,
    confirm_budget: Duration,
}

impl StatusStreamEngine {
    pub fn new(registry: Arc<BotRegistry>, store: Store, confirm_budget: Duration) -> Self {
        Self {
            registry,
            store,
            confirm_budget,
        }
    }

    /// One NDJSON line per event: `{"bot_id"}` on open, then each status
    /// change at most once, in observation order, ending at a terminal
    /// state. Dropping the stream cancels the subscription, so a consumer
    /// disconnect leaks nothing.
    pub fn event_stream(
        &self,
        bot_id: String,
    ) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
        let registry = Arc::clone(&self.registry);
        let store = self.store.clone();
        let confirm_budget = self.confirm_budget;

        async_stream::stream! {
            yield Ok(event_line(&json!({ "bot_id": bot_id })));

            let record = registry.get(&bot_id).await;
            let receiver = registry.subscribe(&bot_id).await;
            match (record, receiver) {
                (Some(record), Some(mut rx)) => {
                    let owner_id = record.owner_id;
                    let mut last_emitted = LifecycleState::Unknown;
                    loop {
                        let status = rx.borrow_and_update().clone();
                        if status.state != last_emitted {
                            last_emitted = status.state;
                            yield Ok(event_line(
                                &json!({ "status": status.state.stream_label() }),
                            ));
                            if let Err(e) = store
                                .set_bot_status(
                                    &owner_id,
                                    &bot_id,
                                    status.state.display_label(),
                                    status.created_at.clone(),
                                )
                                .await
                            {
                                warn!("Failed to persist status for bot {}: {}", bot_id, e);
                            }
                            match status.state {
                                LifecycleState::CallEnded => {
                                    // The confirmation handshake happens off
                                    // the response path; the consumer is done.
                                    spawn_confirmation_watcher(
                                        Arc::clone(&registry),
                                        store.clone(),
                                        bot_id.clone(),
                                        owner_id.clone(),
                                        confirm_budget,
                                    );
                                    break;
                                }
                                LifecycleState::Failed | LifecycleState::Complete => {
                                    registry.remove(&bot_id).await;
                                    break;
                                }
                                _ => {}
                            }
                        }
                        if rx.changed().await.is_err() {
                            debug!("Status channel for bot {} closed", bot_id);
                            break;
                        }
                    }
                }
                _ => {
                    warn!("Status stream requested for unknown bot {}", bot_id);
                }
            }
        }
    }
}

fn event_line(event: &serde_json::Value) -> String {
    let mut line = event.to_string();
    line.push('\n');
    line
}

/// Waits (bounded) for the `complete` confirmation after `call_ended`,
/// persists it, then drops the registry record.
fn spawn_confirmation_watcher(
    registry: Arc<BotRegistry>,
    store: Store,
    bot_id: String,
    owner_id: String,
    budget: Duration,
) {
    tokio::spawn(async move {
        match registry.await_confirmation(&bot_id, budget).await {
            ConfirmationOutcome::Confirmed => {
                info!("Bot {} confirmed complete", bot_id);
                if let Err(e) = store
                    .set_bot_status(
                        &owner_id,
                        &bot_id,
                        LifecycleState::Complete.display_label(),
                        None,
                    )
                    .await
                {
                    warn!("Failed to persist completion for bot {}: {}", bot_id, e);
                }
            }
            ConfirmationOutcome::TimedOut => {
                warn!(
                    "Bot {} never confirmed completion within {}s",
                    bot_id,
                    budget.as_secs()
                );
            }
            ConfirmationOutcome::Gone => {
                debug!("Bot {} was removed before confirmation", bot_id);
            }
        }
        registry.remove(&bot_id).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn engine() -> (Arc<BotRegistry>, Store, StatusStreamEngine) {
        let registry = Arc::new(BotRegistry::new());
        let store = Store::in_memory().unwrap();
        let engine =
            StatusStreamEngine::new(Arc::clone(&registry), store.clone(), Duration::from_secs(5));
        (registry, store, engine)
    }

    #[tokio::test]
    async fn test_stream_for_unknown_bot_ends_after_bot_id() {
        let (_registry, _store, engine) = engine();
        let mut stream = Box::pin(engine.event_stream("ghost".to_string()));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "{\"bot_id\":\"ghost\"}\n");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_replays_terminal_state_to_late_consumer() {
        let (registry, _store, engine) = engine();
        registry.register("b1", "u1", "https://x").await.unwrap();
        registry
            .apply_transition("b1", LifecycleState::CallEnded, None)
            .await;
        registry
            .apply_transition("b1", LifecycleState::Complete, None)
            .await;

        let mut stream = Box::pin(engine.event_stream("b1".to_string()));
        assert_eq!(stream.next().await.unwrap().unwrap(), "{\"bot_id\":\"b1\"}\n");
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            "{\"status\":\"complete\"}\n"
        );
        assert!(stream.next().await.is_none());

        // The drained record is gone.
        assert!(registry.get("b1").await.is_none());
    }

    #[tokio::test]
    async fn test_stream_terminates_on_failure_without_handoff() {
        let (registry, store, engine) = engine();
        registry.register("b1", "u1", "https://x").await.unwrap();

        let mut stream = Box::pin(engine.event_stream("b1".to_string()));
        assert_eq!(stream.next().await.unwrap().unwrap(), "{\"bot_id\":\"b1\"}\n");

        registry
            .apply_transition("b1", LifecycleState::InCallRecording, None)
            .await;
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            "{\"status\":\"in_call_recording\"}\n"
        );

        registry
            .apply_transition("b1", LifecycleState::Failed, None)
            .await;
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            "{\"status\":\"failed\"}\n"
        );
        assert!(stream.next().await.is_none());

        assert!(registry.get("b1").await.is_none());
        let row = store.get_bot("u1", "b1").await.unwrap().unwrap();
        assert_eq!(row.status.as_deref(), Some("failed"));
    }
}
