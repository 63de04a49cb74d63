//! The routing pipeline: one dispatch per inbound request.
//!
//! ```text
//! attachment ─► context ─► prompt ─► completion ─► parser ─┬─► answer
//!                                                          └─► resolver ─► (confirm?) ─► executor
//! ```
//!
//! Entry point: [`dispatch`]. Every request is independent; the only state
//! carried between requests is the persisted history and the per-user
//! pending confirmation.

pub mod attachment;
pub mod completion;
pub mod confirmation;
pub mod context;
pub mod executor;
pub mod parser;
pub mod resolver;

use std::time::Duration;

use chrono::Utc;
use pp_domain::action::ActionPayload;
use pp_domain::conversation::ConversationTurn;
use pp_domain::error::{Error, Result};
use pp_workspace::Session;

pub use attachment::{Attachment, UserTurn};
pub use parser::{ActionParser, ParseOutcome};

use crate::state::AppState;
use completion::CompletionOptions;
use confirmation::PendingDecision;
use context::timed;
use executor::Executor;

pub const TIMEOUT_MESSAGE: &str = "I couldn't complete that in time, please try again.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which assistant feature a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Action routing over the workspace.
    AnalyzeProjects,
    /// Conversational answers only.
    GeneralChat,
}

impl Feature {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "analyze-projects" => Some(Feature::AnalyzeProjects),
            "general-chat" => Some(Feature::GeneralChat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::AnalyzeProjects => "analyze-projects",
            Feature::GeneralChat => "general-chat",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchInput {
    pub feature: Feature,
    pub request: String,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Text shown to the user.
    pub result: String,
    /// The action executed this turn, if any.
    pub action: Option<ActionPayload>,
}

impl DispatchOutcome {
    fn say(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            action: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors that end the request with a non-200 status. Everything else
/// becomes an apologetic answer.
fn is_fatal(e: &Error) -> bool {
    matches!(e, Error::Auth(_) | Error::Config(_) | Error::Quota(_))
}

/// Handle one user message for `session`.
///
/// Runs under the configured request budget. On expiry nothing is
/// persisted and the caller gets [`TIMEOUT_MESSAGE`].
pub async fn dispatch(
    state: &AppState,
    session: &Session,
    input: DispatchInput,
) -> Result<DispatchOutcome> {
    let budget = Duration::from_millis(state.config.assistant.request_timeout_ms);
    let feature = input.feature;
    match tokio::time::timeout(budget, run_turn(state, session, input)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                budget_ms = budget.as_millis() as u64,
                feature = feature.as_str(),
                user_id = %session.user.id,
                "dispatch timed out"
            );
            Ok(DispatchOutcome::say(TIMEOUT_MESSAGE))
        }
    }
}

async fn run_turn(
    state: &AppState,
    session: &Session,
    input: DispatchInput,
) -> Result<DispatchOutcome> {
    let turn = timed(
        "attachment",
        attachment::normalize(
            state.extractor.as_ref(),
            &input.request,
            input.attachment.as_ref(),
            state.config.enrichment.attachment_max_text_chars,
        ),
    )
    .await;

    if turn.is_empty() {
        let reply = turn
            .notice
            .clone()
            .unwrap_or_else(|| "What would you like me to do?".to_string());
        return Ok(DispatchOutcome::say(reply));
    }

    // Non-fatal failures still record the user turn, with the apology as reply.
    let mut outcome = match respond(state, session, input.feature, &turn).await {
        Ok(outcome) => outcome,
        Err(e) if is_fatal(&e) => return Err(e),
        Err(e) => {
            tracing::error!(error = %e, feature = input.feature.as_str(), user_id = %session.user.id, "dispatch failed");
            DispatchOutcome::say(format!(
                "Sorry, something went wrong while handling that. ({e})"
            ))
        }
    };

    if let Some(notice) = &turn.notice {
        outcome.result = format!("{notice}\n\n{}", outcome.result);
    }

    let turns = [
        ConversationTurn::user(turn.stored.clone()),
        ConversationTurn::assistant(outcome.result.clone()),
    ];
    if let Err(e) = state.history.append_async(&session.user.id, &turns).await {
        tracing::warn!(error = %e, user_id = %session.user.id, "history append failed");
    }
    Ok(outcome)
}

async fn respond(
    state: &AppState,
    session: &Session,
    feature: Feature,
    turn: &UserTurn,
) -> Result<DispatchOutcome> {
    match feature {
        Feature::AnalyzeProjects => route(state, session, turn).await,
        Feature::GeneralChat => {
            let cfg = &state.config.assistant;
            let history = state.history.recent_async(&session.user.id, cfg.history_limit).await?;
            let ctx = timed("context", build(state, session)).await;
            let (system, _) = state
                .composer
                .compose_chat(&ctx, &session.user.display_name, Utc::now());
            let text = timed(
                "completion",
                completion::complete(&state.llm, &system, &history, turn, CompletionOptions::chat(cfg)),
            )
            .await?;
            Ok(DispatchOutcome::say(text))
        }
    }
}

async fn build(state: &AppState, session: &Session) -> pp_domain::workspace::WorkspaceContext {
    context::build_context(session.store.as_ref(), &state.config.assistant, &session.user.id).await
}

/// Action routing for `analyze-projects`.
async fn route(state: &AppState, session: &Session, turn: &UserTurn) -> Result<DispatchOutcome> {
    let cfg = &state.config.assistant;
    let user_id = session.user.id.as_str();
    let now = Utc::now();

    let decision = confirmation::settle_pending(
        &state.conversations,
        user_id,
        &turn.text,
        now,
        cfg.pending_confirmation_ttl_secs,
    )
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, user_id, "reading pending confirmation failed");
        PendingDecision::Idle
    });

    // A confirmed action runs without another model call, resolved
    // against a fresh snapshot.
    if let PendingDecision::Confirmed(action) = decision {
        let ctx = timed("context", build(state, session)).await;
        return Ok(execute(state, session, &ctx, action).await);
    }

    let history = state.history.recent_async(user_id, cfg.history_limit).await?;
    let ctx = timed("context", build(state, session)).await;
    let (system, _) = state.composer.compose(&ctx, &session.user.display_name, now);
    let completion = timed(
        "completion",
        completion::complete(&state.llm, &system, &history, turn, CompletionOptions::router(cfg)),
    )
    .await?;

    let action = match state.parser.parse(&completion) {
        ParseOutcome::Action(action) => action,
        ParseOutcome::NoAction(_) => return Ok(DispatchOutcome::say(completion)),
    };

    if action.kind().requires_confirmation() {
        let confirmed_in_prose = confirmation::model_asked_for_confirmation(&history, &action)
            && confirmation::is_affirmative(&turn.text);
        if !confirmed_in_prose {
            // Surface ambiguity before asking "are you sure?".
            if let Err(e) = resolver::resolve(&action, &ctx) {
                return Ok(DispatchOutcome::say(e.message()));
            }
            let question = confirmation::hold(&state.conversations, user_id, action, now)?;
            return Ok(DispatchOutcome::say(question));
        }
    }

    Ok(execute(state, session, &ctx, action).await)
}

async fn execute(
    state: &AppState,
    session: &Session,
    ctx: &pp_domain::workspace::WorkspaceContext,
    action: ActionPayload,
) -> DispatchOutcome {
    let resolved = match resolver::resolve(&action, ctx) {
        Ok(r) => r,
        Err(e) => return DispatchOutcome::say(e.message()),
    };
    let executor = Executor {
        store: session.store.as_ref(),
        images: state.image_search.as_ref(),
        places: state.places.as_ref(),
    };
    let result = timed("execute", executor.execute(resolved)).await;
    DispatchOutcome {
        result,
        action: Some(action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_parse_from_wire_names() {
        assert_eq!(Feature::parse("analyze-projects"), Some(Feature::AnalyzeProjects));
        assert_eq!(Feature::parse("general-chat"), Some(Feature::GeneralChat));
        assert_eq!(Feature::parse("summarize"), None);
    }

    #[test]
    fn only_caller_facing_errors_are_fatal() {
        assert!(is_fatal(&Error::Auth("expired".into())));
        assert!(is_fatal(&Error::Config("no key".into())));
        assert!(is_fatal(&Error::Quota("billing".into())));
        assert!(!is_fatal(&Error::Store("down".into())));
        assert!(!is_fatal(&Error::Http("reset".into())));
    }
}
