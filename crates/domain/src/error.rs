/// Shared error type used across all PortalPilot crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// LLM credential missing or rejected. Never retried.
    #[error("config: {0}")]
    Config(String),

    /// Upstream billing or rate limit.
    #[error("quota: {0}")]
    Quota(String),

    /// No valid caller session.
    #[error("auth: {0}")]
    Auth(String),

    /// Workspace data store read or write failed.
    #[error("store: {0}")]
    Store(String),

    /// An attachment could not be turned into text.
    #[error("extraction: {0}")]
    Extraction(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient failures that a bounded retry may recover from.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(Error::Http("connection reset".into()).is_retryable());
        assert!(Error::Timeout("20s".into()).is_retryable());
        assert!(!Error::Config("bad key".into()).is_retryable());
        assert!(!Error::Quota("insufficient_quota".into()).is_retryable());
        assert!(!Error::Store("violates constraint".into()).is_retryable());
    }
}
