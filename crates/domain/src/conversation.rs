use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionPayload;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// One persisted message of a user's conversation. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-user conversation state, persisted next to the history.
///
/// `Answering` and `Executing` are transient within one request and never
/// stored; only the two resting states are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingConfirmation {
        pending_action: ActionPayload,
        /// The question shown to the user.
        question: String,
        created_at: DateTime<Utc>,
    },
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    /// Whether a pending confirmation is older than `ttl_secs`.
    /// A TTL of zero means pending confirmations never expire.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        match self {
            ConversationState::Idle => false,
            ConversationState::AwaitingConfirmation { created_at, .. } => {
                ttl_secs > 0 && (now - *created_at).num_seconds() > ttl_secs as i64
            }
        }
    }
}
