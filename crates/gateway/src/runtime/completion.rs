//! Completion client: one request/response round trip per turn.

use pp_domain::capability::ModelRole;
use pp_domain::config::AssistantConfig;
use pp_domain::conversation::{ConversationTurn, Sender};
use pp_domain::error::{Error, Result};
use pp_domain::message::Message;
use pp_providers::{ChatRequest, ProviderRegistry};

use super::attachment::UserTurn;

/// Sampling settings for one kind of call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub role: ModelRole,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionOptions {
    /// Action routing: low temperature to keep JSON well-formed.
    pub fn router(cfg: &AssistantConfig) -> Self {
        Self {
            role: ModelRole::Router,
            temperature: cfg.router_temperature,
            max_tokens: cfg.router_max_tokens,
        }
    }

    pub fn chat(cfg: &AssistantConfig) -> Self {
        Self {
            role: ModelRole::Chat,
            temperature: cfg.chat_temperature,
            max_tokens: cfg.chat_max_tokens,
        }
    }
}

/// System prompt, then history in chronological order, then the new turn.
pub fn build_messages(system: &str, history: &[ConversationTurn], turn: &UserTurn) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    for t in history {
        messages.push(match t.sender {
            Sender::User => Message::user(t.content.clone()),
            Sender::Assistant => Message::assistant(t.content.clone()),
        });
    }
    messages.push(match &turn.image {
        Some((url, media_type)) => {
            Message::user_with_image(turn.text.clone(), url.clone(), media_type.clone())
        }
        None => Message::user(turn.text.clone()),
    });
    messages
}

/// Image turns go to the `vision` role when one is configured.
fn role_for(llm: &ProviderRegistry, turn: &UserTurn, role: ModelRole) -> ModelRole {
    if turn.image.is_some() && llm.for_role(ModelRole::Vision.as_str()).is_some() {
        ModelRole::Vision
    } else {
        role
    }
}

pub async fn complete(
    llm: &ProviderRegistry,
    system: &str,
    history: &[ConversationTurn],
    turn: &UserTurn,
    opts: CompletionOptions,
) -> Result<String> {
    let req = ChatRequest {
        messages: build_messages(system, history, turn),
        temperature: Some(opts.temperature),
        max_tokens: Some(opts.max_tokens),
        ..Default::default()
    };
    let role = role_for(llm, turn, opts.role);
    let resp = llm.chat_for_role(role, req).await?;
    let text = resp.content.trim();
    if text.is_empty() {
        return Err(Error::Provider {
            provider: role.as_str().to_string(),
            message: format!(
                "empty completion (finish_reason: {})",
                resp.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_domain::message::{MessageContent, Role};

    #[test]
    fn history_is_replayed_between_system_and_turn() {
        let history = vec![
            ConversationTurn::user("delete Old Website Backup"),
            ConversationTurn::assistant("Are you sure?"),
        ];
        let msgs = build_messages("SYS", &history, &UserTurn::plain("yes"));
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(msgs[3].content.text(), Some("yes"));
    }

    #[test]
    fn image_turn_becomes_a_parts_message() {
        let turn = UserTurn {
            text: "what is this".into(),
            image: Some(("https://files/a.png".into(), Some("image/png".into()))),
            ..Default::default()
        };
        let msgs = build_messages("SYS", &[], &turn);
        assert!(matches!(msgs[1].content, MessageContent::Parts(_)));
    }

    struct Stub(pp_domain::capability::LlmCapabilities);

    #[async_trait::async_trait]
    impl pp_providers::LlmProvider for Stub {
        async fn chat(&self, _req: &ChatRequest) -> Result<pp_providers::ChatResponse> {
            Ok(Default::default())
        }
        fn capabilities(&self) -> &pp_domain::capability::LlmCapabilities {
            &self.0
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn image_turns_prefer_the_vision_role() {
        let image = UserTurn {
            text: "what is this".into(),
            image: Some(("https://files/a.png".into(), None)),
            ..Default::default()
        };
        let mut llm = ProviderRegistry::new(0);
        llm.register(std::sync::Arc::new(Stub(Default::default())));
        llm.assign_role("router", "stub/small");
        assert_eq!(role_for(&llm, &image, ModelRole::Router), ModelRole::Router);

        llm.assign_role("vision", "stub/large");
        assert_eq!(role_for(&llm, &image, ModelRole::Router), ModelRole::Vision);
        assert_eq!(role_for(&llm, &UserTurn::plain("hi"), ModelRole::Router), ModelRole::Router);
    }
}
