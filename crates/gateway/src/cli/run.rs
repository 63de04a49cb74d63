//! `portalpilot run`: one-shot dispatch.
//!
//! Authenticates the given token, runs one message through the same
//! pipeline the HTTP service uses and prints the reply. Useful for
//! scripting and for trying the assistant against the offline demo store.

use std::sync::Arc;

use pp_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{self, Attachment, DispatchInput, Feature};

pub struct RunArgs {
    pub message: String,
    pub token: String,
    pub feature: String,
    pub attachment: Option<String>,
    pub attachment_type: Option<String>,
    pub json: bool,
}

/// Entry point for `portalpilot run "message"`.
pub async fn run(config: Arc<Config>, args: RunArgs) -> anyhow::Result<()> {
    let feature = Feature::parse(&args.feature).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown feature '{}' (expected analyze-projects or general-chat)",
            args.feature
        )
    })?;

    // 1. Boot the runtime (no HTTP listener).
    let state = bootstrap::build_app_state(config).await?;

    // 2. Authenticate the caller exactly as the middleware would.
    let session = state
        .connector
        .authenticate(&args.token)
        .await
        .map_err(|e| anyhow::anyhow!("authentication failed: {e}"))?;

    // 3. Dispatch.
    let input = DispatchInput {
        feature,
        request: args.message,
        attachment: args.attachment.map(|url| Attachment {
            url,
            media_type: args.attachment_type,
        }),
    };
    let outcome = runtime::dispatch(&state, &session, input).await?;

    // 4. Print.
    if args.json {
        let json = serde_json::json!({
            "result": outcome.result,
            "action": outcome.action,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", outcome.result);
    }

    // 5. Persist pending confirmations before exit.
    if let Err(e) = state.conversations.flush() {
        tracing::warn!(error = %e, "conversation state flush on exit failed");
    }
    Ok(())
}
