use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace data store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection to the hosted backend that owns projects, tasks, goals and
/// articles. Row-level authorization is enforced there, so every request
/// carries the caller's own access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub mode: WorkspaceMode,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Env var holding the backend's public (anon) API key.
    #[serde(default = "d_anon_key_env")]
    pub anon_key_env: String,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// `memory` mode only: JSON fixture seeding the in-memory workspace.
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            mode: WorkspaceMode::Rest,
            base_url: d_base_url(),
            anon_key_env: d_anon_key_env(),
            timeout_ms: 10_000,
            max_retries: 2,
            fixture_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceMode {
    #[default]
    Rest,
    /// Offline demo store; accepts any bearer token.
    Memory,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://127.0.0.1:54321".into()
}
fn d_anon_key_env() -> String {
    "PP_BACKEND_ANON_KEY".into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_2() -> u32 {
    2
}
