//! AppState construction shared by `serve` and `run`.

use std::sync::Arc;

use anyhow::Context;

use pp_contextpack::PromptComposer;
use pp_domain::config::{Config, ConfigSeverity};
use pp_providers::ProviderRegistry;
use pp_sessions::history::DEFAULT_CACHE_TURNS;
use pp_sessions::{ConversationStateStore, HistoryStore};

use crate::extract::DefaultExtractor;
use crate::runtime::ActionParser;
use crate::skills::{HttpImageSearch, HttpPlaceLookup};
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?,
    );
    if llm.is_empty() {
        tracing::warn!(
            "no LLM providers initialized; configure API keys to enable the assistant"
        );
    } else {
        tracing::info!(providers = llm.len(), roles = ?llm.list_roles(), "LLM provider registry ready");
    }

    // ── Workspace backend ────────────────────────────────────────────
    let connector =
        pp_workspace::create_connector(&config.workspace).context("creating workspace connector")?;
    tracing::info!(backend = connector.backend(), "workspace connector ready");

    // ── Conversation stores ──────────────────────────────────────────
    let state_path = &config.assistant.state_path;
    let history = Arc::new(
        HistoryStore::new(state_path)
            .context("initializing history store")?
            .with_cache_turns(config.assistant.history_limit.max(DEFAULT_CACHE_TURNS)),
    );
    let conversations = Arc::new(
        ConversationStateStore::new(state_path).context("initializing conversation state")?,
    );
    tracing::info!(
        path = %state_path.display(),
        pending = conversations.pending_count(),
        "conversation stores ready"
    );

    // ── Pipeline ─────────────────────────────────────────────────────
    let composer = Arc::new(PromptComposer::new(
        config.assistant.context_max_per_section_chars,
        config.assistant.context_total_max_chars,
    ));
    let parser = Arc::new(ActionParser::new().context("compiling action parser")?);

    // ── Enrichment ───────────────────────────────────────────────────
    let extractor = Arc::new(
        DefaultExtractor::from_config(&config.enrichment).context("initializing text extractor")?,
    );
    let image_search = Arc::new(
        HttpImageSearch::from_config(&config.enrichment).context("initializing image search")?,
    );
    let places = Arc::new(
        HttpPlaceLookup::from_config(&config.enrichment).context("initializing place lookup")?,
    );
    tracing::info!("enrichment clients ready");

    Ok(AppState {
        config,
        llm,
        connector,
        history,
        conversations,
        composer,
        parser,
        extractor,
        image_search,
        places,
    })
}
