//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API, where system messages go in a
//! separate top-level `system` field instead of the message list.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{classify_http_error, from_reqwest, resolve_api_key};
use pp_domain::capability::LlmCapabilities;
use pp_domain::config::ProviderConfig;
use pp_domain::error::Result;
use pp_domain::message::{ContentPart, Message, MessageContent, Role, Usage};
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderConfig, timeout_ms: u64) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-sonnet-4-5".into());

        let capabilities = LlmCapabilities {
            supports_json_mode: false,
            supports_vision: true,
            context_window_tokens: Some(200_000),
            max_output_tokens: Some(8_192),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut system_parts: Vec<String> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.extract_all_text()),
                Role::User | Role::Assistant => api_messages.push(msg_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
        });
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_anthropic(msg: &Message) -> Value {
    let role = if msg.role == Role::Assistant {
        "assistant"
    } else {
        "user"
    };
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": role,
            "content": t,
        }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    ContentPart::Image { url, .. } => serde_json::json!({
                        "type": "image",
                        "source": { "type": "url", "url": url },
                    }),
                })
                .collect();
            serde_json::json!({
                "role": role,
                "content": content,
            })
        }
    }
}

fn parse_anthropic_response(body: &Value) -> ChatResponse {
    let text: String = body
        .get("content")
        .and_then(|v| v.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let finish_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(|s| match s {
            "end_turn" => "stop".to_string(),
            "max_tokens" => "length".to_string(),
            other => other.to_string(),
        });

    ChatResponse {
        content: text,
        usage: body.get("usage").and_then(parse_anthropic_usage),
        model,
        finish_reason,
    }
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req);

        tracing::debug!(provider = %self.id, url = %url, "anthropic chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(classify_http_error(&self.id, status.as_u16(), &resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        Ok(parse_anthropic_response(&resp_json))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_domain::config::{AuthConfig, ProviderKind};

    fn provider() -> AnthropicProvider {
        let cfg = ProviderConfig {
            id: "claude".into(),
            kind: ProviderKind::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            auth: AuthConfig {
                key: Some("sk-ant-test".into()),
                ..Default::default()
            },
            default_model: None,
        };
        AnthropicProvider::from_config(&cfg, 1_000).unwrap()
    }

    #[test]
    fn system_messages_are_lifted_out() {
        let req = ChatRequest {
            messages: vec![
                Message::system("contract"),
                Message::user("hello"),
                Message::assistant("hi"),
            ],
            max_tokens: Some(1000),
            ..Default::default()
        };
        let body = provider().build_messages_body(&req);
        assert_eq!(body["system"], "contract");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn images_are_sent_by_url() {
        let msg = Message::user_with_image("look", "https://cdn/p.jpg", Some("image/jpeg".into()));
        let v = msg_to_anthropic(&msg);
        assert_eq!(v["content"][1]["source"]["type"], "url");
        assert_eq!(v["content"][1]["source"]["url"], "https://cdn/p.jpg");
    }

    #[test]
    fn text_blocks_are_joined() {
        let body = serde_json::json!({
            "model": "claude-sonnet-4-5",
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 4}
        });
        let resp = parse_anthropic_response(&body);
        assert_eq!(resp.content, "ab");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 7);
    }
}
