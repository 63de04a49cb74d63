use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistant (routing pipeline)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Directory holding conversation history and confirmation state.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Most recent turns replayed into each prompt.
    #[serde(default = "d_20")]
    pub history_limit: usize,
    /// Budget for one dispatch: context build + completion + execution.
    #[serde(default = "d_90000")]
    pub request_timeout_ms: u64,
    #[serde(default = "d_router_temperature")]
    pub router_temperature: f32,
    #[serde(default = "d_1500")]
    pub router_max_tokens: u32,
    #[serde(default = "d_chat_temperature")]
    pub chat_temperature: f32,
    #[serde(default = "d_1000")]
    pub chat_max_tokens: u32,
    /// Pending confirmations older than this are discarded. `0` = never.
    #[serde(default = "d_1800")]
    pub pending_confirmation_ttl_secs: u64,
    #[serde(default = "d_12000")]
    pub context_max_per_section_chars: usize,
    #[serde(default = "d_48000")]
    pub context_total_max_chars: usize,
    /// Services the model may attach to projects.
    #[serde(default = "d_services")]
    pub available_services: Vec<String>,
    /// Icon names the model may pick for new projects.
    #[serde(default = "d_icons")]
    pub available_icons: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            history_limit: 20,
            request_timeout_ms: 90_000,
            router_temperature: d_router_temperature(),
            router_max_tokens: 1500,
            chat_temperature: d_chat_temperature(),
            chat_max_tokens: 1000,
            pending_confirmation_ttl_secs: 1800,
            context_max_per_section_chars: 12_000,
            context_total_max_chars: 48_000,
            available_services: d_services(),
            available_icons: d_icons(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}
fn d_20() -> usize {
    20
}
fn d_90000() -> u64 {
    90_000
}
fn d_router_temperature() -> f32 {
    0.2
}
fn d_chat_temperature() -> f32 {
    0.7
}
fn d_1500() -> u32 {
    1500
}
fn d_1000() -> u32 {
    1000
}
fn d_1800() -> u64 {
    1800
}
fn d_12000() -> usize {
    12_000
}
fn d_48000() -> usize {
    48_000
}
fn d_services() -> Vec<String> {
    [
        "Event Planning",
        "Catering",
        "Venue Sourcing",
        "Marketing",
        "Web Development",
        "Graphic Design",
        "Photography",
        "Videography",
        "Social Media",
        "Consulting",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn d_icons() -> Vec<String> {
    [
        "briefcase", "calendar", "camera", "code", "globe", "megaphone", "music", "star",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_runs_colder_than_chat() {
        let cfg = AssistantConfig::default();
        assert!(cfg.router_temperature < cfg.chat_temperature);
    }

    #[test]
    fn custom_services_replace_defaults() {
        let cfg: AssistantConfig =
            toml::from_str(r#"available_services = ["Catering"]"#).unwrap();
        assert_eq!(cfg.available_services, vec!["Catering"]);
        assert_eq!(cfg.history_limit, 20);
    }
}
