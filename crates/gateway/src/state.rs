use std::sync::Arc;

use pp_contextpack::PromptComposer;
use pp_domain::config::Config;
use pp_providers::ProviderRegistry;
use pp_sessions::{ConversationStateStore, HistoryStore};
use pp_workspace::WorkspaceConnector;

use crate::extract::TextExtractor;
use crate::runtime::ActionParser;
use crate::skills::{ImageSearch, PlaceLookup};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, LLM providers, workspace connector
/// - **Conversation**: history and pending confirmations
/// - **Pipeline**: prompt composer and action parser
/// - **Enrichment**: attachment extraction, image search, place lookup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,
    /// Turns a caller's bearer token into a user-scoped store.
    pub connector: Arc<dyn WorkspaceConnector>,

    // ── Conversation ──────────────────────────────────────────────────
    pub history: Arc<HistoryStore>,
    pub conversations: Arc<ConversationStateStore>,

    // ── Pipeline ──────────────────────────────────────────────────────
    pub composer: Arc<PromptComposer>,
    /// Compiled once at startup.
    pub parser: Arc<ActionParser>,

    // ── Enrichment ────────────────────────────────────────────────────
    pub extractor: Arc<dyn TextExtractor>,
    pub image_search: Arc<dyn ImageSearch>,
    pub places: Arc<dyn PlaceLookup>,
}
