//! Shared utility functions for provider adapters.

use pp_domain::config::AuthConfig;
use pp_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Body fragments providers use to report exhausted credit or billing caps.
const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "exceeded your current quota",
    "credit balance is too low",
    "billing",
    "rate_limit",
];

/// Classify a non-success completion response.
///
/// * 401 / 403 → [`Error::Config`]: the key is missing, revoked or lacks access.
/// * 402 / 429, or a body mentioning quota or billing → [`Error::Quota`].
/// * 5xx → [`Error::Http`], which the registry retries.
/// * anything else → [`Error::Provider`].
pub fn classify_http_error(provider: &str, status: u16, body: &str) -> Error {
    let snippet: String = body.chars().take(300).collect();
    match status {
        401 | 403 => Error::Config(format!(
            "provider '{provider}' rejected its credentials (HTTP {status})"
        )),
        402 | 429 => Error::Quota(format!("provider '{provider}' HTTP {status}: {snippet}")),
        _ if is_quota_body(body) => {
            Error::Quota(format!("provider '{provider}' HTTP {status}: {snippet}"))
        }
        500..=599 => Error::Http(format!("provider '{provider}' HTTP {status}: {snippet}")),
        _ => Error::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {status} - {snippet}"),
        },
    }
}

fn is_quota_body(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|m| lower.contains(m))
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `service` + `account` → OS keychain via `keyring`
/// 3. `env` field (reads environment variable)
/// 4. Headless keychain fallback: env var `{SERVICE}_{ACCOUNT}` uppercased
/// 5. Error
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key'; \
             prefer 'env' or keychain 'service'+'account' instead"
        );
        return Ok(key.clone());
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => {
                tracing::warn!(
                    service = %service,
                    account = %account,
                    error = %e,
                    "keychain lookup failed, falling through to env"
                );
            }
        }
    }

    if let Some(ref env_var) = auth.env {
        return std::env::var(env_var).map_err(|_| {
            Error::Config(format!(
                "environment variable '{}' not set or not valid UTF-8",
                env_var
            ))
        });
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            tracing::info!(
                env_var = %fallback_var,
                "API key resolved from keychain headless fallback env var"
            );
            return Ok(val);
        }
    }

    Err(Error::Config(
        "no API key configured: set 'key', 'env', or keychain \
         'service'+'account' in the provider's auth table"
            .into(),
    ))
}

/// Read a secret from the OS keychain (macOS Keychain, Windows Credential
/// Manager, Secret Service). Fails on headless systems without a daemon.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Config(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Config(format!("keyring get_password failed: {e}")))
}

/// `("portalpilot", "openai-api-key")` → `"PORTALPILOT_OPENAI_API_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}
