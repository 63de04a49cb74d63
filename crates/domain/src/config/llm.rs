use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_60000")]
    pub default_timeout_ms: u64,
    /// Retries on transient failures (timeouts, connection errors, 5xx).
    /// Credential and quota failures are never retried.
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// Abort startup when no provider initializes.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Model roles (`router`, `chat`, optional `vision`), each `"provider_id/model_name"`.
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    /// Registered LLM providers.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 60_000,
            max_retries: 2,
            startup_policy: LlmStartupPolicy::AllowNone,
            roles: HashMap::new(),
            providers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Boot without providers; dispatches answer with a configuration error
    /// until credentials are in place.
    #[default]
    AllowNone,
    /// Abort startup if no provider initializes.
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Format: "provider_id/model_name"
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Header name override (e.g. "api-key").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix override (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "portalpilot").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "openai-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_60000() -> u64 {
    60_000
}
fn d_2() -> u32 {
    2
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_and_roles_parse() {
        let toml_str = r#"
            max_retries = 1

            [[providers]]
            id = "openai"
            kind = "openai_compat"
            base_url = "https://api.openai.com/v1"
            default_model = "gpt-4o-mini"
            auth = { env = "OPENAI_API_KEY" }

            [roles.router]
            model = "openai/gpt-4o-mini"
        "#;
        let cfg: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(cfg.providers[0].kind, ProviderKind::OpenaiCompat);
        assert_eq!(cfg.providers[0].auth.env.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(cfg.roles["router"].model, "openai/gpt-4o-mini");
    }

    #[test]
    fn default_policy_allows_no_providers() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.startup_policy, LlmStartupPolicy::AllowNone);
        assert!(cfg.providers.is_empty());
    }
}
