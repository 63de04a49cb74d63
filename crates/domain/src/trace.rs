use serde::Serialize;

/// Structured trace events emitted across all PortalPilot crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextBuilt {
        user_id: String,
        projects: usize,
        users: usize,
        goals: usize,
        tags: usize,
        articles: usize,
        folders: usize,
        degraded: Vec<String>,
        duration_ms: u64,
    },
    PromptComposed {
        total_chars: usize,
        sections_truncated: usize,
        sections_excluded: usize,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmRetry {
        provider: String,
        attempt: u32,
        reason: String,
    },
    ActionParsed {
        action: Option<String>,
        reason: String,
    },
    ResolutionFailed {
        action: String,
        field: String,
        value: String,
        reason: String,
    },
    ActionExecuted {
        action: String,
        failed_steps: usize,
        duration_ms: u64,
    },
    ConfirmationPending {
        user_id: String,
        action: String,
    },
    ConfirmationResolved {
        user_id: String,
        action: String,
        confirmed: bool,
        reason: String,
    },
    HistoryAppend {
        user_id: String,
        turns: usize,
    },
    StoreCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pp_event");
    }
}
