//! Process-wide table of in-flight bot records.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

use super::status::{BotStatus, LifecycleState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("bot {0} is already registered")]
    DuplicateBotId(String),
    #[error("bot {0} is not registered")]
    UnknownBot(String),
}

/// Snapshot of one record, safe to hand out to callers.
#[derive(Debug, Clone)]
pub struct BotRecord {
    pub bot_id: String,
    pub owner_id: String,
    pub meeting_url: String,
    pub status: BotStatus,
}

/// Outcome of waiting for the `complete` confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    TimedOut,
    /// The record was removed before the confirmation arrived.
    Gone,
}

struct BotEntry {
    owner_id: String,
    meeting_url: String,
    status_tx: watch::Sender<BotStatus>,
}

impl BotEntry {
    fn snapshot(&self, bot_id: &str) -> BotRecord {
        BotRecord {
            bot_id: bot_id.to_string(),
            owner_id: self.owner_id.clone(),
            meeting_url: self.meeting_url.clone(),
            status: self.status_tx.borrow().clone(),
        }
    }
}

/// Owner of all bot records. The map lock covers id lookup only; each
/// record carries its own watch channel, so a webhook write and a stream
/// read on the same bot synchronize on that channel and unrelated bots
/// never contend with each other.
#[derive(Default)]
pub struct BotRegistry {
    bots: RwLock<HashMap<String, BotEntry>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record in the `unknown` state.
    pub async fn register(
        &self,
        bot_id: &str,
        owner_id: &str,
        meeting_url: &str,
    ) -> Result<BotRecord, RegistryError> {
        let mut bots = self.bots.write().await;
        if bots.contains_key(bot_id) {
            return Err(RegistryError::DuplicateBotId(bot_id.to_string()));
        }
        let (status_tx, _) = watch::channel(BotStatus::default());
        let entry = BotEntry {
            owner_id: owner_id.to_string(),
            meeting_url: meeting_url.to_string(),
            status_tx,
        };
        let record = entry.snapshot(bot_id);
        bots.insert(bot_id.to_string(), entry);
        debug!("Registered bot {} for user {}", bot_id, owner_id);
        Ok(record)
    }

    pub async fn get(&self, bot_id: &str) -> Option<BotRecord> {
        self.bots
            .read()
            .await
            .get(bot_id)
            .map(|entry| entry.snapshot(bot_id))
    }

    /// Applies an externally observed transition. Unknown ids are logged
    /// and ignored; no record is ever created here. Returns the
    /// post-transition snapshot for known ids, whether or not the status
    /// changed. Update and subscriber wakeup happen atomically, and a
    /// refused transition wakes nobody.
    pub async fn apply_transition(
        &self,
        bot_id: &str,
        next: LifecycleState,
        created_at: Option<String>,
    ) -> Option<BotRecord> {
        let bots = self.bots.read().await;
        let Some(entry) = bots.get(bot_id) else {
            warn!(
                "Status event {} for unknown bot {}, ignoring",
                next.as_str(),
                bot_id
            );
            return None;
        };
        let changed = entry
            .status_tx
            .send_if_modified(|status| status.advance(next, created_at));
        let record = entry.snapshot(bot_id);
        if changed {
            debug!("Bot {} moved to {}", bot_id, record.status.state.as_str());
        } else {
            debug!(
                "Bot {} ignored transition to {} (currently {})",
                bot_id,
                next.as_str(),
                record.status.state.as_str()
            );
        }
        Some(record)
    }

    /// Change-notification receiver for a record's status.
    pub async fn subscribe(&self, bot_id: &str) -> Option<watch::Receiver<BotStatus>> {
        self.bots
            .read()
            .await
            .get(bot_id)
            .map(|entry| entry.status_tx.subscribe())
    }

    /// Blocks until the record reaches a terminal state and returns it.
    /// The wait inspects the current value before suspending, so a
    /// transition that arrived before the waiter attached is not lost.
    pub async fn await_completion(&self, bot_id: &str) -> Result<LifecycleState, RegistryError> {
        let mut rx = self
            .subscribe(bot_id)
            .await
            .ok_or_else(|| RegistryError::UnknownBot(bot_id.to_string()))?;
        let result = match rx.wait_for(|status| status.state.is_terminal()).await {
            Ok(status) => Ok(status.state),
            Err(_) => Err(RegistryError::UnknownBot(bot_id.to_string())),
        };
        result
    }

    /// Waits for the `complete` confirmation within a bounded budget.
    pub async fn await_confirmation(
        &self,
        bot_id: &str,
        budget: Duration,
    ) -> ConfirmationOutcome {
        let Some(mut rx) = self.subscribe(bot_id).await else {
            return ConfirmationOutcome::Gone;
        };
        let confirmed = rx.wait_for(|status| status.state == LifecycleState::Complete);
        let outcome = match tokio::time::timeout(budget, confirmed).await {
            Ok(Ok(_)) => ConfirmationOutcome::Confirmed,
            Ok(Err(_)) => ConfirmationOutcome::Gone,
            Err(_) => ConfirmationOutcome::TimedOut,
        };
        outcome
    }

    /// Drops a drained record. Residual subscribers observe the channel
    /// closing. Returns whether the record existed.
    pub async fn remove(&self, bot_id: &str) -> bool {
        let removed = self.bots.write().await.remove(bot_id).is_some();
        if removed {
            debug!("Removed bot {} from registry", bot_id);
        }
        removed
    }
}
