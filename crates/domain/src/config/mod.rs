mod assistant;
mod enrichment;
mod llm;
mod observability;
mod server;
mod workspace;

pub use assistant::*;
pub use enrichment::*;
pub use llm::*;
pub use observability::*;
pub use server::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return every issue found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.server.port == 0 {
            push(ConfigSeverity::Error, "server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty");
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            );
        }

        if self.llm.providers.is_empty() {
            push(ConfigSeverity::Warning, "llm.providers", "no LLM providers configured");
        }
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                push(
                    ConfigSeverity::Error,
                    &format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                );
            }
            if provider.base_url.is_empty() {
                push(
                    ConfigSeverity::Error,
                    &format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                );
            }
        }
        for (role, rc) in &self.llm.roles {
            let provider_id = rc.model.split('/').next().unwrap_or_default();
            if !self.llm.providers.iter().any(|p| p.id == provider_id) {
                push(
                    ConfigSeverity::Warning,
                    &format!("llm.roles.{role}.model"),
                    "references a provider that is not configured",
                );
            }
        }

        if self.workspace.mode == WorkspaceMode::Rest && self.workspace.base_url.is_empty() {
            push(ConfigSeverity::Error, "workspace.base_url", "base_url must not be empty");
        }
        if self.assistant.history_limit == 0 {
            push(
                ConfigSeverity::Warning,
                "assistant.history_limit",
                "0 disables context carryover between turns",
            );
        }
        if self.assistant.request_timeout_ms == 0 {
            push(
                ConfigSeverity::Error,
                "assistant.request_timeout_ms",
                "request timeout must be greater than 0",
            );
        }
        if !(0.0..=2.0).contains(&self.assistant.router_temperature) {
            push(
                ConfigSeverity::Error,
                "assistant.router_temperature",
                "temperature must be within 0.0..=2.0",
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_only_warns_about_missing_providers() {
        let issues = Config::default().validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
        assert_eq!(issues[0].field, "llm.providers");
    }

    #[test]
    fn dangling_role_is_a_warning() {
        let cfg: Config = toml::from_str(
            r#"
            [llm.roles.router]
            model = "missing/gpt-4o"
        "#,
        )
        .unwrap();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "llm.roles.router.model" && i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let mut cfg = Config::default();
        cfg.assistant.request_timeout_ms = 0;
        assert!(cfg
            .validate()
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error));
    }
}
