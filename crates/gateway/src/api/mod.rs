pub mod auth;
pub mod dispatch;
pub mod health;
pub mod history;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the caller-session middleware, which validates the bearer
/// token against the workspace backend).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/health", get(health::health))
        // Provider readiness (used by health probes)
        .route("/v1/models/readiness", get(health::readiness));

    let protected = Router::new()
        // Routing pipeline
        .route("/assistant/dispatch", post(dispatch::dispatch))
        // Conversation
        .route("/v1/history", get(history::recent))
        .route("/v1/conversation/reset", post(history::reset))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_session,
        ));

    public.merge(protected)
}
