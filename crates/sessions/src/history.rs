//! Append-only JSONL conversation history.
//!
//! Each user gets a `<userId>.jsonl` file under `<state_path>/history`.
//! Every inbound and outbound message is appended as a single JSON line.
//!
//! Includes an in-memory write-through cache to avoid re-reading from disk
//! every turn, and async I/O wrappers to avoid blocking the tokio runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use pp_domain::conversation::ConversationTurn;
use pp_domain::error::{Error, Result};
use pp_domain::trace::TraceEvent;

use crate::file_stem;

/// Turns kept in memory per user unless overridden.
pub const DEFAULT_CACHE_TURNS: usize = 100;

#[derive(Default)]
struct Cache {
    /// Newest `cache_turns` turns per loaded user.
    turns: HashMap<String, Vec<ConversationTurn>>,
    /// Bumped on every append; a disk read that raced an append is not cached.
    appends: u64,
}

pub struct HistoryStore {
    base_dir: PathBuf,
    cache_turns: usize,
    cache: RwLock<Cache>,
}

impl HistoryStore {
    /// Open (or create) the history directory under `state_path`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let base_dir = state_path.join("history");
        std::fs::create_dir_all(&base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir,
            cache_turns: DEFAULT_CACHE_TURNS,
            cache: RwLock::new(Cache::default()),
        })
    }

    /// Cap the number of turns cached per user. Reads beyond the cap go to disk.
    pub fn with_cache_turns(mut self, turns: usize) -> Self {
        self.cache_turns = turns.max(1);
        self
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.jsonl", file_stem(user_id)))
    }

    /// Append turns to a user's history (sync).
    pub fn append(&self, user_id: &str, turns: &[ConversationTurn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        let buf = serialize_turns(turns)?;
        append_to_file(&self.path_for(user_id), &buf)?;
        self.after_append(user_id, turns);
        Ok(())
    }

    /// Append turns to a user's history (async).
    ///
    /// Uses `spawn_blocking` to avoid blocking the tokio runtime during file I/O.
    pub async fn append_async(&self, user_id: &str, turns: &[ConversationTurn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        let buf = serialize_turns(turns)?;
        let path = self.path_for(user_id);

        // Write to disk first; only update cache if I/O succeeds.
        tokio::task::spawn_blocking(move || append_to_file(&path, &buf))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.after_append(user_id, turns);
        Ok(())
    }

    fn after_append(&self, user_id: &str, turns: &[ConversationTurn]) {
        {
            let mut cache = self.cache.write();
            cache.appends += 1;
            // Only extend a loaded entry; an unloaded one is read from disk
            // on the next `recent`.
            if let Some(cached) = cache.turns.get_mut(user_id) {
                cached.extend(turns.iter().cloned());
                trim_front(cached, self.cache_turns);
            }
        }
        TraceEvent::HistoryAppend {
            user_id: user_id.to_owned(),
            turns: turns.len(),
        }
        .emit();
    }

    /// Cached tail, if the cache can answer `limit` turns.
    fn cached(&self, user_id: &str, limit: usize) -> Option<Vec<ConversationTurn>> {
        if limit > self.cache_turns {
            return None;
        }
        self.cache.read().turns.get(user_id).map(|turns| tail(turns, limit))
    }

    fn appends_seen(&self) -> u64 {
        self.cache.read().appends
    }

    /// Cache a disk read unless an append landed while it was in flight.
    fn fill(&self, user_id: &str, mut turns: Vec<ConversationTurn>, appends_before: u64) {
        let mut cache = self.cache.write();
        if cache.appends != appends_before {
            return;
        }
        trim_front(&mut turns, self.cache_turns);
        cache.turns.entry(user_id.to_owned()).or_insert(turns);
    }

    /// The most recent `limit` turns, oldest first.
    pub fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        if let Some(turns) = self.cached(user_id, limit) {
            return Ok(turns);
        }

        let appends_before = self.appends_seen();
        let turns = read_jsonl_file(&self.path_for(user_id), user_id)?;
        let out = tail(&turns, limit);
        self.fill(user_id, turns, appends_before);
        Ok(out)
    }

    /// Async variant of [`recent`](Self::recent).
    pub async fn recent_async(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        if let Some(turns) = self.cached(user_id, limit) {
            return Ok(turns);
        }

        let appends_before = self.appends_seen();
        let path = self.path_for(user_id);
        let uid = user_id.to_owned();
        let turns = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &uid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        let out = tail(&turns, limit);
        self.fill(user_id, turns, appends_before);
        Ok(out)
    }

    /// Drop a user's whole history.
    pub fn clear(&self, user_id: &str) -> Result<()> {
        let path = self.path_for(user_id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(Error::Io)?;
        }
        self.cache.write().turns.remove(user_id);
        Ok(())
    }
}

fn tail(turns: &[ConversationTurn], limit: usize) -> Vec<ConversationTurn> {
    let start = turns.len().saturating_sub(limit);
    turns[start..].to_vec()
}

fn trim_front(turns: &mut Vec<ConversationTurn>, keep: usize) {
    let excess = turns.len().saturating_sub(keep);
    if excess > 0 {
        turns.drain(..excess);
    }
}

fn serialize_turns(turns: &[ConversationTurn]) -> Result<String> {
    let mut buf = String::new();
    for turn in turns {
        buf.push_str(&serde_json::to_string(turn)?);
        buf.push('\n');
    }
    Ok(buf)
}

fn append_to_file(path: &Path, buf: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::Io)?;
    file.write_all(buf.as_bytes()).map_err(Error::Io)?;
    Ok(())
}

fn read_jsonl_file(path: &Path, user_id: &str) -> Result<Vec<ConversationTurn>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut turns = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ConversationTurn>(line) {
            Ok(turn) => turns.push(turn),
            Err(e) => {
                tracing::warn!(
                    user_id = user_id,
                    error = %e,
                    "skipping malformed history line"
                );
            }
        }
    }
    Ok(turns)
}
