//! Conversation endpoints.
//!
//! - `GET  /v1/history?limit=N`    recent turns, oldest first
//! - `POST /v1/conversation/reset` drop the pending confirmation
//!   (body `{"clearHistory": true}` also clears the history)

use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::response::Json;
use pp_domain::conversation::ConversationState;
use pp_workspace::Session;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn recent(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q
        .limit
        .unwrap_or(state.config.assistant.history_limit)
        .min(MAX_LIMIT);
    let turns = state.history.recent_async(&session.user.id, limit).await?;
    let pending = match state.conversations.get(&session.user.id) {
        ConversationState::AwaitingConfirmation {
            question,
            created_at,
            ..
        } => json!({ "question": question, "createdAt": created_at }),
        ConversationState::Idle => Value::Null,
    };
    Ok(Json(json!({
        "turns": turns,
        "count": turns.len(),
        "pendingConfirmation": pending,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    #[serde(default)]
    pub clear_history: bool,
}

pub async fn reset(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: ResetRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid reset body: {e}")))?
    };

    state.conversations.clear(&session.user.id)?;
    if req.clear_history {
        state.history.clear(&session.user.id)?;
    }
    tracing::info!(user_id = %session.user.id, clear_history = req.clear_history, "conversation reset");
    Ok(Json(json!({
        "reset": true,
        "historyCleared": req.clear_history,
    })))
}
