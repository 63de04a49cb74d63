//! HTTP error mapping.
//!
//! Only caller-facing failures leave the pipeline as errors: a missing or
//! rejected session, a broken LLM credential, an exhausted upstream quota and
//! malformed request bodies. Everything else is rendered into a normal
//! `{"result": ...}` reply by the runtime.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pp_domain::error::Error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthenticated",
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Auth(m) => Self::unauthenticated(m),
            Error::Config(m) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                kind: "configuration",
                message: format!("The assistant is not configured correctly: {m}"),
            },
            Error::Quota(m) => Self {
                status: StatusCode::PAYMENT_REQUIRED,
                kind: "quota_exceeded",
                message: format!("The AI provider's usage quota has been exceeded: {m}"),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                kind: "internal",
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = self.kind, error = %self.message, "request failed");
        } else {
            tracing::debug!(kind = self.kind, error = %self.message, "request rejected");
        }
        (
            self.status,
            Json(serde_json::json!({
                "error": self.message,
                "kind": self.kind,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguished_errors_get_their_own_status() {
        assert_eq!(ApiError::from(Error::Auth("x".into())).status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(Error::Config("x".into())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        let quota = ApiError::from(Error::Quota("insufficient_quota".into()));
        assert_eq!(quota.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(quota.kind, "quota_exceeded");
    }

    #[test]
    fn other_errors_are_internal() {
        let e = ApiError::from(Error::Store("boom".into()));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.kind, "internal");
    }
}
