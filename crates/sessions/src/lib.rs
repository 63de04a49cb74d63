//! Per-user conversation persistence.
//!
//! Two stores live under the configured state path: append-only JSONL
//! conversation history, and the explicit conversation state (idle or
//! awaiting confirmation of a pending action). Both are keyed by the
//! authenticated user id and re-read at the start of every turn.

pub mod history;
pub mod state;

pub use history::HistoryStore;
pub use state::ConversationStateStore;

/// Map a user id to a safe file stem.
pub(crate) fn file_stem(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
