use serde::{Deserialize, Serialize};

/// LLM model capabilities, advertised by every {provider, model} pair.
/// The completion client uses them to decide how attachments are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub supports_json_mode: bool,
    pub supports_vision: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for LlmCapabilities {
    fn default() -> Self {
        Self {
            supports_json_mode: false,
            supports_vision: false,
            context_window_tokens: None,
            max_output_tokens: None,
        }
    }
}

/// Model roles. Each maps to a `provider_id/model` entry in `[llm.roles]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Classifies utterances into actions or answers (low temperature).
    Router,
    /// Purely conversational features.
    Chat,
    /// Turns carrying an image. Optional; falls back to the turn's own role.
    Vision,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Router => "router",
            ModelRole::Chat => "chat",
            ModelRole::Vision => "vision",
        }
    }
}
