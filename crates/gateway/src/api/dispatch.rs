//! `POST /assistant/dispatch`: run one user message through the pipeline.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::Json;
use pp_domain::error::Error;
use pp_workspace::Session;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::runtime::{self, Attachment, DispatchInput, Feature};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    /// `analyze-projects` or `general-chat`.
    pub feature: String,
    #[serde(default)]
    pub payload: DispatchPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    /// The user's utterance.
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    /// MIME type of the attachment, when known.
    #[serde(default)]
    pub attachment_type: Option<String>,
}

impl DispatchRequest {
    fn into_input(self) -> Result<DispatchInput, ApiError> {
        let feature = Feature::parse(&self.feature)
            .ok_or_else(|| ApiError::bad_request(format!("unknown feature '{}'", self.feature)))?;
        let attachment = self
            .payload
            .attachment_url
            .filter(|u| !u.trim().is_empty())
            .map(|url| Attachment {
                url,
                media_type: self.payload.attachment_type.filter(|t| !t.trim().is_empty()),
            });
        if self.payload.request.trim().is_empty() && attachment.is_none() {
            return Err(ApiError::bad_request("payload.request must not be empty"));
        }
        Ok(DispatchInput {
            feature,
            request: self.payload.request,
            attachment,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn dispatch(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let input = body.into_input()?;

    // Pre-flight: no point building context without a model.
    if state.llm.is_empty() {
        return Err(Error::Config("no LLM providers are configured".into()).into());
    }

    tracing::info!(
        user_id = %session.user.id,
        feature = input.feature.as_str(),
        has_attachment = input.attachment.is_some(),
        "dispatch"
    );

    let outcome = runtime::dispatch(&state, &session, input).await?;
    let mut resp = json!({ "result": outcome.result });
    if let Some(action) = outcome.action {
        resp["action"] = serde_json::to_value(action).unwrap_or(Value::Null);
    }
    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(v: Value) -> DispatchRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn camel_case_attachment_fields() {
        let input = req(json!({
            "feature": "analyze-projects",
            "payload": {
                "request": "make a project from this",
                "attachmentUrl": "https://files/brief.pdf",
                "attachmentType": "application/pdf"
            }
        }))
        .into_input()
        .unwrap();
        assert_eq!(input.feature, Feature::AnalyzeProjects);
        let att = input.attachment.unwrap();
        assert_eq!(att.media_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn attachment_alone_is_enough() {
        let input = req(json!({
            "feature": "analyze-projects",
            "payload": { "attachmentUrl": "https://files/memo.m4a" }
        }))
        .into_input()
        .unwrap();
        assert!(input.request.is_empty());
    }

    #[test]
    fn unknown_feature_and_empty_request_are_rejected() {
        let err = req(json!({ "feature": "summarize", "payload": { "request": "hi" } }))
            .into_input()
            .unwrap_err();
        assert_eq!(err.kind, "bad_request");

        let err = req(json!({ "feature": "general-chat", "payload": { "request": "   " } }))
            .into_input()
            .unwrap_err();
        assert_eq!(err.kind, "bad_request");
    }
}
