//! Meeting bot lifecycle module.
//!
//! Owns the in-memory registry of in-flight bots, ingests webhook status
//! events, and fans each bot's transitions out to its streaming consumer.

pub mod registry;
pub mod status;
pub mod stream;
pub mod webhook;

pub use registry::{BotRecord, BotRegistry, ConfirmationOutcome, RegistryError};
pub use status::{BotStatus, LifecycleState};
pub use stream::StatusStreamEngine;
pub use webhook::{ClassifiedEvent, WebhookIngestor, WebhookReply};
