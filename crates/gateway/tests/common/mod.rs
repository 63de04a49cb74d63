//! Shared fixtures: a scripted LLM, an in-memory workspace and an
//! `AppState` wired around them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pp_contextpack::PromptComposer;
use pp_domain::capability::LlmCapabilities;
use pp_domain::config::Config;
use pp_domain::error::{Error, Result};
use pp_domain::workspace::{GoalSummary, ProjectSummary, TaskRef, UserRef};
use pp_gateway::extract::TextExtractor;
use pp_gateway::runtime::ActionParser;
use pp_gateway::skills::{ImageSearch, PlaceDetails, PlaceLookup};
use pp_gateway::state::AppState;
use pp_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderRegistry};
use pp_sessions::{ConversationStateStore, HistoryStore};
use pp_workspace::{InMemoryConnector, InMemoryWorkspace, Session, WorkspaceConnector, WorkspaceFixture};

// ── Scripted LLM ────────────────────────────────────────────────────

pub enum Reply {
    Text(String),
    Fail(Error),
    Stall(Duration),
}

/// Answers each call with the next queued reply.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    caps: LlmCapabilities,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            caps: LlmCapabilities::default(),
        })
    }

    pub fn texts(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Reply::Text(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req.clone());
        let next = self.replies.lock().pop_front();
        match next {
            Some(Reply::Text(content)) => Ok(ChatResponse {
                content,
                model: "scripted-1".into(),
                finish_reason: Some("stop".into()),
                ..Default::default()
            }),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Stall(d)) => {
                tokio::time::sleep(d).await;
                Ok(ChatResponse {
                    content: "too late".into(),
                    model: "scripted-1".into(),
                    ..Default::default()
                })
            }
            None => Err(Error::Other("script exhausted".into())),
        }
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.caps
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

// ── Enrichment doubles ──────────────────────────────────────────────

pub struct NoExtractor;

#[async_trait]
impl TextExtractor for NoExtractor {
    async fn download(&self, _url: &str) -> Result<Vec<u8>> {
        Err(Error::Http("offline".into()))
    }
    async fn extract_pdf(&self, _bytes: Vec<u8>) -> Result<String> {
        Err(Error::Other("no pdf support".into()))
    }
    async fn extract_docx(&self, _bytes: Vec<u8>) -> Result<String> {
        Err(Error::Other("no docx support".into()))
    }
    async fn transcribe_audio(&self, _bytes: Vec<u8>, _media_type: &str) -> Result<String> {
        Err(Error::Other("no transcription".into()))
    }
}

pub struct NoImages;

#[async_trait]
impl ImageSearch for NoImages {
    async fn find_one(&self, _query: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

pub struct NoPlaces;

#[async_trait]
impl PlaceLookup for NoPlaces {
    async fn lookup(&self, _query: &str) -> Result<Option<PlaceDetails>> {
        Ok(None)
    }
}

// ── Workspace ───────────────────────────────────────────────────────

pub fn fixture() -> WorkspaceFixture {
    WorkspaceFixture {
        users: vec![
            UserRef::from_profile("u1", Some("Jane"), Some("Doe"), Some("jane@example.com")),
            UserRef::from_profile("u2", Some("John"), Some("Smith"), None),
        ],
        projects: vec![
            ProjectSummary {
                id: "p1".into(),
                name: "Summer Gala".into(),
                status: Some("Planning".into()),
                budget: Some(25_000.0),
                venue: Some("Riverside Hall".into()),
                services: vec!["Catering".into()],
                tasks: vec![TaskRef {
                    id: "t1".into(),
                    title: "Book the band".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ProjectSummary {
                id: "p2".into(),
                name: "Old Website Backup".into(),
                ..Default::default()
            },
            ProjectSummary {
                id: "p3".into(),
                name: "Marketing Launch".into(),
                ..Default::default()
            },
            ProjectSummary {
                id: "p4".into(),
                name: "Marketing Review".into(),
                ..Default::default()
            },
        ],
        goals: vec![GoalSummary {
            id: "g1".into(),
            title: "Learn Guitar".into(),
            target: Some(30),
            ..Default::default()
        }],
        ..Default::default()
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub state: AppState,
    pub llm: Arc<ScriptedLlm>,
    pub workspace: Arc<InMemoryWorkspace>,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(llm: Arc<ScriptedLlm>) -> Self {
        Self::with_config(llm, |_| {})
    }

    pub fn with_config(llm: Arc<ScriptedLlm>, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.assistant.state_path = dir.path().to_path_buf();
        tweak(&mut config);

        let mut registry = ProviderRegistry::new(0).with_retry_base_ms(0);
        registry.register(llm.clone());
        registry.assign_role("router", "scripted/scripted-1");
        registry.assign_role("chat", "scripted/scripted-1");

        let workspace = Arc::new(InMemoryWorkspace::new(fixture()));
        let connector: Arc<dyn WorkspaceConnector> =
            Arc::new(InMemoryConnector::new(workspace.clone()));

        let state = AppState {
            llm: Arc::new(registry),
            connector,
            history: Arc::new(HistoryStore::new(&config.assistant.state_path).unwrap()),
            conversations: Arc::new(
                ConversationStateStore::new(&config.assistant.state_path).unwrap(),
            ),
            composer: Arc::new(PromptComposer::new(
                config.assistant.context_max_per_section_chars,
                config.assistant.context_total_max_chars,
            )),
            parser: Arc::new(ActionParser::new().unwrap()),
            extractor: Arc::new(NoExtractor),
            image_search: Arc::new(NoImages),
            places: Arc::new(NoPlaces),
            config: Arc::new(config),
        };

        Self {
            state,
            llm,
            workspace,
            _dir: dir,
        }
    }

    pub async fn session(&self) -> Session {
        self.state.connector.authenticate("u1").await.unwrap()
    }
}

/// Wrap an action object the way models usually return it.
pub fn fenced(json: &str) -> String {
    format!("Sure, here you go.\n\n```json\n{json}\n```")
}
