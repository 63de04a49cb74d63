//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads the [`LlmConfig`], resolves credentials, and instantiates
//! the adapter for each configured provider. Completions are requested by
//! role (`router`, `chat`) and retried on transient failures.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use pp_domain::capability::ModelRole;
use pp_domain::config::{LlmConfig, LlmStartupPolicy, ProviderKind};
use pp_domain::error::{Error, Result};
use pp_domain::trace::TraceEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers and role assignments.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// role name → "provider_id/model_name"
    roles: HashMap<String, String>,
    max_retries: u32,
    retry_base_ms: u64,
}

impl ProviderRegistry {
    /// An empty registry. Providers and roles are added with
    /// [`register`](Self::register) and [`assign_role`](Self::assign_role).
    pub fn new(max_retries: u32) -> Self {
        Self {
            providers: HashMap::new(),
            roles: HashMap::new(),
            max_retries,
            retry_base_ms: 100,
        }
    }

    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize are logged and skipped rather than
    /// aborting the entire startup, unless the startup policy is
    /// `require_one` and none succeeded.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut registry = Self::new(config.max_retries);

        for pc in &config.providers {
            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, config.default_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc, config.default_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        "registered LLM provider"
                    );
                    registry.providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        if registry.providers.is_empty() {
            if config.startup_policy == LlmStartupPolicy::RequireOne {
                return Err(Error::Config(
                    "no LLM provider initialized and llm.startup_policy = \"require_one\"".into(),
                ));
            }
            tracing::warn!(
                "no LLM providers initialized; dispatches will report a \
                 configuration error until credentials are configured"
            );
        }

        for (role_name, role_cfg) in &config.roles {
            registry.assign_role(role_name, &role_cfg.model);
        }

        Ok(registry)
    }

    /// Add (or replace) a provider under its own id.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers
            .insert(provider.provider_id().to_string(), provider);
    }

    /// Map a role to a `"provider_id/model_name"` spec.
    pub fn assign_role(&mut self, role: &str, model_spec: &str) {
        self.roles.insert(role.to_string(), model_spec.to_string());
    }

    /// Override the backoff base (tests use 0).
    pub fn with_retry_base_ms(mut self, ms: u64) -> Self {
        self.retry_base_ms = ms;
        self
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Get the provider assigned to a given role. The role config stores
    /// "provider_id/model_name"; we split on '/' and look up the provider by
    /// the first segment.
    pub fn for_role(&self, role: &str) -> Option<Arc<dyn LlmProvider>> {
        let model_spec = self.roles.get(role)?;
        let provider_id = model_spec.split('/').next().unwrap_or(model_spec);
        self.providers.get(provider_id).cloned()
    }

    /// The model name assigned to a role (the part after the first '/').
    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        let spec = self.roles.get(role)?;
        spec.split_once('/').map(|(_, model)| model)
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// List roles and their assigned model specs.
    pub fn list_roles(&self) -> HashMap<String, String> {
        self.roles.clone()
    }

    /// Send `req` to the provider serving `role`.
    ///
    /// Transient failures (timeouts, connection errors, 5xx) are retried up
    /// to `max_retries` times with exponential backoff. Credential, quota
    /// and malformed-response errors surface immediately.
    pub async fn chat_for_role(
        &self,
        role: ModelRole,
        mut req: ChatRequest,
    ) -> Result<ChatResponse> {
        let provider = self.for_role(role.as_str()).ok_or_else(|| {
            Error::Config(format!(
                "no LLM provider available for role '{}'",
                role.as_str()
            ))
        })?;
        if req.model.is_none() {
            req.model = self.model_for_role(role.as_str()).map(String::from);
        }
        if req.json_mode && !provider.capabilities().supports_json_mode {
            req.json_mode = false;
        }

        let start = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            match provider.chat(&req).await {
                Ok(resp) => {
                    TraceEvent::LlmRequest {
                        provider: provider.provider_id().to_string(),
                        model: resp.model.clone(),
                        role: role.as_str().to_string(),
                        duration_ms: start.elapsed().as_millis() as u64,
                        prompt_tokens: resp.usage.map(|u| u.prompt_tokens),
                        completion_tokens: resp.usage.map(|u| u.completion_tokens),
                    }
                    .emit();
                    return Ok(resp);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    TraceEvent::LlmRetry {
                        provider: provider.provider_id().to_string(),
                        attempt,
                        reason: e.to_string(),
                    }
                    .emit();
                    let delay = self.retry_base_ms * 2u64.pow(attempt - 1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.provider_id(),
                        role = role.as_str(),
                        attempts = attempt + 1,
                        error = %e,
                        "completion failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_domain::capability::LlmCapabilities;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails with `errors` in order, then answers "ok".
    struct Flaky {
        calls: AtomicU32,
        errors: Mutex<Vec<Error>>,
        caps: LlmCapabilities,
    }

    #[async_trait::async_trait]
    impl LlmProvider for Flaky {
        async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut errors = self.errors.lock().unwrap();
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
            Ok(ChatResponse {
                content: "ok".into(),
                model: req.model.clone().unwrap_or_default(),
                ..Default::default()
            })
        }
        fn capabilities(&self) -> &LlmCapabilities {
            &self.caps
        }
        fn provider_id(&self) -> &str {
            "flaky"
        }
    }

    fn registry(errors: Vec<Error>) -> (ProviderRegistry, Arc<Flaky>) {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            errors: Mutex::new(errors),
            caps: LlmCapabilities::default(),
        });
        let mut reg = ProviderRegistry::new(2).with_retry_base_ms(0);
        reg.register(flaky.clone());
        reg.assign_role("router", "flaky/model-x");
        (reg, flaky)
    }

    #[test]
    fn role_resolves_provider_and_model() {
        let (reg, _) = registry(vec![]);
        assert!(reg.for_role("router").is_some());
        assert!(reg.for_role("chat").is_none());
        assert_eq!(reg.model_for_role("router"), Some("model-x"));
        assert_eq!(reg.list_providers(), vec!["flaky"]);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let (reg, flaky) = registry(vec![
            Error::Timeout("slow".into()),
            Error::Http("503".into()),
        ]);
        let resp = reg
            .chat_for_role(ModelRole::Router, ChatRequest::default())
            .await
            .unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(resp.model, "model-x");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (reg, flaky) = registry(vec![
            Error::Http("a".into()),
            Error::Http("b".into()),
            Error::Http("c".into()),
        ]);
        let err = reg
            .chat_for_role(ModelRole::Router, ChatRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn credential_errors_are_not_retried() {
        let (reg, flaky) = registry(vec![Error::Config("revoked".into())]);
        let err = reg
            .chat_for_role(ModelRole::Router, ChatRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_role_is_a_config_error() {
        let (reg, _) = registry(vec![]);
        let err = reg
            .chat_for_role(ModelRole::Chat, ChatRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn require_one_fails_without_providers() {
        let cfg = LlmConfig {
            startup_policy: LlmStartupPolicy::RequireOne,
            ..Default::default()
        };
        assert!(ProviderRegistry::from_config(&cfg).is_err());
        assert!(ProviderRegistry::from_config(&LlmConfig::default()).is_ok());
    }
}
