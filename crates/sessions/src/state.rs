//! Persisted per-user conversation state.
//!
//! Stored in `conversation_state.json` under the configured state path. Only
//! users with a pending confirmation have an entry; a missing entry is
//! [`ConversationState::Idle`].

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use pp_domain::conversation::ConversationState;
use pp_domain::error::{Error, Result};

pub struct ConversationStateStore {
    path: PathBuf,
    states: RwLock<HashMap<String, ConversationState>>,
    /// Serializes snapshot + write + rename so the newest snapshot lands last.
    write_lock: Mutex<()>,
}

impl ConversationStateStore {
    /// Load or create the store at `state_path/conversation_state.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("conversation_state.json");
        let states: HashMap<String, ConversationState> = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "conversation state unreadable, starting idle");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        tracing::info!(
            pending = states.len(),
            path = %path.display(),
            "conversation state loaded"
        );

        Ok(Self {
            path,
            states: RwLock::new(states),
            write_lock: Mutex::new(()),
        })
    }

    pub fn get(&self, user_id: &str) -> ConversationState {
        self.states
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace a user's state and persist. Setting `Idle` removes the entry.
    pub fn set(&self, user_id: &str, state: ConversationState) -> Result<()> {
        {
            let mut states = self.states.write();
            if state.is_idle() {
                states.remove(user_id);
            } else {
                states.insert(user_id.to_owned(), state);
            }
        }
        self.flush()
    }

    /// Return a user to `Idle` and persist.
    pub fn clear(&self, user_id: &str) -> Result<()> {
        self.set(user_id, ConversationState::Idle)
    }

    /// Remove and return a user's state in one step, then persist.
    ///
    /// Of two concurrent callers only one sees the pending action.
    pub fn take(&self, user_id: &str) -> Result<ConversationState> {
        let taken = self.states.write().remove(user_id);
        let Some(state) = taken else {
            return Ok(ConversationState::Idle);
        };
        self.flush()?;
        Ok(state)
    }

    /// Number of users with a pending confirmation.
    pub fn pending_count(&self) -> usize {
        self.states.read().len()
    }

    /// Persist the current state to disk.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let json = {
            let states = self.states.read();
            serde_json::to_string_pretty(&*states)?
        };
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(Error::Io)?;
        tmp.write_all(json.as_bytes()).map_err(Error::Io)?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pp_domain::action::ActionPayload;

    fn pending() -> ConversationState {
        ConversationState::AwaitingConfirmation {
            pending_action: ActionPayload::DeleteProject {
                project_name: "Old Website Backup".into(),
            },
            question: "Delete Old Website Backup?".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_user_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStateStore::new(dir.path()).unwrap();
        assert!(store.get("nobody").is_idle());
    }

    #[test]
    fn pending_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let original = pending();
        {
            let store = ConversationStateStore::new(dir.path()).unwrap();
            store.set("u1", original.clone()).unwrap();
        }
        let store = ConversationStateStore::new(dir.path()).unwrap();
        assert_eq!(store.get("u1"), original);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn take_hands_out_pending_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStateStore::new(dir.path()).unwrap();
        let original = pending();
        store.set("u1", original.clone()).unwrap();
        assert_eq!(store.take("u1").unwrap(), original);
        assert!(store.take("u1").unwrap().is_idle());
        let reopened = ConversationStateStore::new(dir.path()).unwrap();
        assert!(reopened.get("u1").is_idle());
    }

    #[test]
    fn concurrent_writers_for_different_users_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(ConversationStateStore::new(dir.path()).unwrap());
        for round in 0..20 {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    std::thread::spawn(move || store.set(&format!("u{round}-{i}"), pending()))
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }
        }
        assert_eq!(store.pending_count(), 160);
        let reopened = ConversationStateStore::new(dir.path()).unwrap();
        assert_eq!(reopened.pending_count(), 160);
    }

    #[test]
    fn clear_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStateStore::new(dir.path()).unwrap();
        store.set("u1", pending()).unwrap();
        store.clear("u1").unwrap();
        assert!(store.get("u1").is_idle());
        assert_eq!(store.pending_count(), 0);
    }
}
