//! Caller authentication middleware.
//!
//! Every protected request must carry `Authorization: Bearer <token>`. The
//! token is the caller's own workspace session token; it is validated by
//! the configured [`WorkspaceConnector`](pp_workspace::WorkspaceConnector)
//! and the resulting [`Session`] is attached as a request extension. A
//! missing or rejected token short-circuits with 401 before any context is
//! built.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pp_workspace::Session;

use crate::error::ApiError;
use crate::state::AppState;

/// Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(&req) {
        Some(t) => t.to_string(),
        None => return ApiError::unauthenticated("missing bearer token").into_response(),
    };

    let session: Session = match state.connector.authenticate(&token).await {
        Ok(s) => s,
        Err(e) => return ApiError::from(e).into_response(),
    };
    tracing::debug!(user_id = %session.user.id, backend = state.connector.backend(), "caller authenticated");

    req.extensions_mut().insert(session);
    next.run(req).await
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
