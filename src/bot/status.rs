//! Bot lifecycle states and the per-record status cell.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a meeting bot as reported by the bot service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unknown,
    JoiningCall,
    InWaitingRoom,
    InCallNotRecording,
    InCallRecording,
    CallEnded,
    Failed,
    Complete,
}

impl LifecycleState {
    /// Parses a webhook status code. Codes outside the known alphabet
    /// return `None` and are rendered as `waiting` without a transition.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "joining_call" => Some(Self::JoiningCall),
            "in_waiting_room" => Some(Self::InWaitingRoom),
            "in_call_not_recording" => Some(Self::InCallNotRecording),
            "in_call_recording" => Some(Self::InCallRecording),
            "call_ended" => Some(Self::CallEnded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::JoiningCall => "joining_call",
            Self::InWaitingRoom => "in_waiting_room",
            Self::InCallNotRecording => "in_call_not_recording",
            Self::InCallRecording => "in_call_recording",
            Self::CallEnded => "call_ended",
            Self::Failed => "failed",
            Self::Complete => "complete",
        }
    }

    /// Label emitted on the status stream. A record that has not seen a
    /// real state yet presents as `waiting`.
    pub fn stream_label(&self) -> &'static str {
        match self {
            Self::Unknown => "waiting",
            other => other.as_str(),
        }
    }

    /// Human form written into persisted bot documents.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Unknown => "waiting",
            Self::JoiningCall => "joining call",
            Self::InWaitingRoom => "in waiting room",
            Self::InCallNotRecording => "in call not recording",
            Self::InCallRecording => "in call recording",
            Self::CallEnded => "call ended",
            Self::Failed => "failed",
            Self::Complete => "complete",
        }
    }

    /// `call_ended` and `failed` end live progress and fire the
    /// completion signal.
    pub fn is_first_terminal(&self) -> bool {
        matches!(self, Self::CallEnded | Self::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CallEnded | Self::Failed | Self::Complete)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::JoiningCall => 1,
            Self::InWaitingRoom => 2,
            Self::InCallNotRecording => 3,
            Self::InCallRecording => 4,
            Self::CallEnded | Self::Failed => 5,
            Self::Complete => 6,
        }
    }
}

/// Current status of one bot record, held in its watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotStatus {
    pub state: LifecycleState,
    /// Timestamp the event source attached to the current state, if any.
    pub created_at: Option<String>,
}

impl Default for BotStatus {
    fn default() -> Self {
        Self {
            state: LifecycleState::Unknown,
            created_at: None,
        }
    }
}

impl BotStatus {
    /// Applies a transition if it moves the record forward.
    ///
    /// Rules: states never regress and never return to `unknown`;
    /// `failed` overrides any non-terminal state; `complete` is only
    /// reachable from a first terminal state and only once; everything
    /// after a first terminal state other than `complete` is ignored.
    /// Returns whether the status changed.
    pub fn advance(&mut self, next: LifecycleState, created_at: Option<String>) -> bool {
        let applied = match (self.state, next) {
            (_, LifecycleState::Unknown) => false,
            (LifecycleState::Complete, _) => false,
            (current, LifecycleState::Complete) => current.is_first_terminal(),
            (current, _) if current.is_first_terminal() => false,
            (_, LifecycleState::Failed) => true,
            (current, candidate) => candidate.rank() > current.rank(),
        };
        if applied {
            self.state = next;
            self.created_at = created_at;
        }
        applied
    }
}
