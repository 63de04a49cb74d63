use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "workspaceBackend": state.connector.backend(),
        "pendingConfirmations": state.conversations.pending_count(),
    }))
}

/// 200 when at least one LLM provider is registered, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.llm.list_providers();
    let ready = !providers.is_empty();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "providers": providers,
            "roles": state.llm.list_roles(),
        })),
    )
}
