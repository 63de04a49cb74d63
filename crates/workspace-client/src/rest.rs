//! REST implementation of [`WorkspaceStore`].
//!
//! Talks to a PostgREST-style hosted backend: table reads and writes under
//! `/rest/v1/<table>`, set-replacement stored procedures under
//! `/rest/v1/rpc/<name>`, and token validation at `/auth/v1/user`. Every
//! request carries the project's public `apikey` plus the caller's own
//! bearer token, so row-level authorization is enforced by the backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pp_domain::config::WorkspaceConfig;
use pp_domain::error::{Error, Result};
use pp_domain::trace::TraceEvent;
use pp_domain::workspace::{
    ArticleSummary, FolderRef, GoalSummary, ProjectSummary, TagRef, TaskRef, UserRef,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::{
    ArticleRecord, AuthUser, GoalRecord, ProjectRecord, Session, TaskRecord, WorkspaceConnector,
    WorkspaceStore,
};

const PROJECT_SELECT: &str = "id,name,status,description,start_date,end_date,budget,venue,services,\
tasks(id,title,completed,task_assignees(user_id)),project_members(user_id),project_tags(tags(name))";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared HTTP plumbing. Created once; the `reqwest::Client` pools
/// connections across callers.
#[derive(Debug)]
struct Backend {
    http: Client,
    base_url: String,
    anon_key: String,
    max_retries: u32,
}

pub struct RestConnector {
    backend: Arc<Backend>,
}

impl RestConnector {
    pub fn new(cfg: &WorkspaceConfig) -> Result<Self> {
        let anon_key = std::env::var(&cfg.anon_key_env).map_err(|_| {
            Error::Config(format!(
                "workspace backend key env var '{}' is not set",
                cfg.anon_key_env
            ))
        })?;
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            backend: Arc::new(Backend {
                http,
                base_url: cfg.base_url.trim_end_matches('/').to_owned(),
                anon_key,
                max_retries: cfg.max_retries,
            }),
        })
    }
}

#[derive(Deserialize)]
struct AuthUserRow {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

#[async_trait]
impl WorkspaceConnector for RestConnector {
    async fn authenticate(&self, token: &str) -> Result<Session> {
        if token.trim().is_empty() {
            return Err(Error::Auth("missing bearer token".into()));
        }
        let url = format!("{}/auth/v1/user", self.backend.base_url);
        let resp = self
            .backend
            .execute_with_retry("GET /auth/v1/user", token, true, || {
                self.backend.http.get(&url)
            })
            .await?;
        let row: AuthUserRow = parse_json(resp, "GET /auth/v1/user").await?;

        let meta = |key: &str| row.user_metadata.get(key).and_then(Value::as_str);
        let profile = UserRef::from_profile(
            row.id.clone(),
            meta("first_name"),
            meta("last_name"),
            row.email.as_deref(),
        );
        let user = AuthUser {
            id: row.id,
            display_name: profile.display_name,
            email: row.email,
        };
        let store = RestWorkspaceStore {
            backend: self.backend.clone(),
            token: token.to_owned(),
            user_id: user.id.clone(),
        };
        Ok(Session {
            user,
            store: Arc::new(store),
        })
    }

    fn backend(&self) -> &'static str {
        "rest"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retry engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Backend {
    fn decorate(&self, rb: RequestBuilder, token: &str) -> RequestBuilder {
        rb.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {token}"))
    }

    /// Execute a request with retry + exponential back-off on transient
    /// errors.
    ///
    /// * Retries on 5xx and transport failures, only when `idempotent`.
    /// * Does **not** retry on 4xx (client errors are permanent).
    /// * 401 maps to `Error::Auth`; other failures to `Error::Store` with the
    ///   backend's own message.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        token: &str,
        idempotent: bool,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let attempts = if idempotent { self.max_retries } else { 0 };
        let mut last_err: Option<Error> = None;

        for attempt in 0..=attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request(), token).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::StoreCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Store(backend_message(&body, status)));
                        continue;
                    }
                    if status == StatusCode::UNAUTHORIZED {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Auth(backend_message(&body, status)));
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Store(backend_message(&body, status)));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::StoreCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Store(format!("{endpoint}: all retries exhausted"))))
    }
}

pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// PostgREST and GoTrue report errors as `{"message": ..}` or `{"msg": ..}`.
fn backend_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body.chars().take(300).collect()
            }
        })
}

async fn parse_json<T: DeserializeOwned>(resp: Response, endpoint: &str) -> Result<T> {
    let body = resp.text().await.map_err(from_reqwest)?;
    serde_json::from_str(&body)
        .map_err(|e| Error::Store(format!("{endpoint}: unexpected response shape: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Deserialize)]
struct UserIdRow {
    user_id: String,
}

#[derive(Deserialize)]
struct TagNameRow {
    tags: Option<TagName>,
}

#[derive(Deserialize)]
struct TagName {
    name: String,
}

fn tag_names(rows: Vec<TagNameRow>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|r| r.tags.map(|t| t.name))
        .collect()
}

#[derive(Deserialize)]
struct TaskRow {
    id: String,
    title: String,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    task_assignees: Vec<UserIdRow>,
}

#[derive(Deserialize)]
struct ProjectRow {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    budget: Option<f64>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    services: Option<Vec<String>>,
    #[serde(default)]
    tasks: Vec<TaskRow>,
    #[serde(default)]
    project_members: Vec<UserIdRow>,
    #[serde(default)]
    project_tags: Vec<TagNameRow>,
}

impl From<ProjectRow> for ProjectSummary {
    fn from(r: ProjectRow) -> Self {
        ProjectSummary {
            id: r.id,
            name: r.name,
            status: r.status,
            description: r.description,
            start_date: r.start_date,
            end_date: r.end_date,
            budget: r.budget,
            venue: r.venue,
            tasks: r
                .tasks
                .into_iter()
                .map(|t| TaskRef {
                    id: t.id,
                    title: t.title,
                    completed: t.completed.unwrap_or(false),
                    assignee_ids: t.task_assignees.into_iter().map(|a| a.user_id).collect(),
                    assignee_names: Vec::new(),
                })
                .collect(),
            services: r.services.unwrap_or_default(),
            tags: tag_names(r.project_tags),
            assigned_user_ids: r.project_members.into_iter().map(|m| m.user_id).collect(),
        }
    }
}

#[derive(Deserialize)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct GoalRow {
    id: String,
    title: String,
    #[serde(default, rename = "type")]
    goal_type: Option<String>,
    #[serde(default)]
    progress: Option<u32>,
    #[serde(default)]
    target: Option<u32>,
    #[serde(default)]
    goal_tags: Vec<TagNameRow>,
}

#[derive(Deserialize)]
struct ArticleRow {
    id: String,
    title: String,
    #[serde(default)]
    folder_id: Option<String>,
    #[serde(default)]
    article_tags: Vec<TagNameRow>,
}

#[derive(Deserialize)]
struct IdRow {
    id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A store acting with one caller's token.
pub struct RestWorkspaceStore {
    backend: Arc<Backend>,
    token: String,
    user_id: String,
}

impl RestWorkspaceStore {
    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.backend.base_url, path)
    }

    async fn get_rows<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>> {
        let url = self.url(&format!("{table}?{query}"));
        let endpoint = format!("GET /rest/v1/{table}");
        let resp = self
            .backend
            .execute_with_retry(&endpoint, &self.token, true, || self.backend.http.get(&url))
            .await?;
        parse_json(resp, &endpoint).await
    }

    async fn insert_row(&self, table: &str, body: Value) -> Result<String> {
        let url = self.url(table);
        let endpoint = format!("POST /rest/v1/{table}");
        let resp = self
            .backend
            .execute_with_retry(&endpoint, &self.token, false, || {
                self.backend
                    .http
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(&body)
            })
            .await?;
        let rows: Vec<IdRow> = parse_json(resp, &endpoint).await?;
        rows.into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| Error::Store(format!("{endpoint}: no row returned")))
    }

    async fn patch_row(&self, table: &str, id: &str, body: Value) -> Result<()> {
        let url = self.url(&format!("{table}?id=eq.{id}"));
        let endpoint = format!("PATCH /rest/v1/{table}");
        self.backend
            .execute_with_retry(&endpoint, &self.token, true, || {
                self.backend.http.patch(&url).json(&body)
            })
            .await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<()> {
        let url = self.url(&format!("{table}?id=eq.{id}"));
        let endpoint = format!("DELETE /rest/v1/{table}");
        self.backend
            .execute_with_retry(&endpoint, &self.token, true, || {
                self.backend.http.delete(&url)
            })
            .await?;
        Ok(())
    }

    async fn rpc(&self, name: &str, args: Value) -> Result<()> {
        let url = self.url(&format!("rpc/{name}"));
        let endpoint = format!("POST /rest/v1/rpc/{name}");
        self.backend
            .execute_with_retry(&endpoint, &self.token, true, || {
                self.backend.http.post(&url).json(&args)
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceStore for RestWorkspaceStore {
    async fn projects_with_tasks(&self) -> Result<Vec<ProjectSummary>> {
        let rows: Vec<ProjectRow> = self
            .get_rows("projects", &format!("select={PROJECT_SELECT}&order=created_at.desc"))
            .await?;
        Ok(rows.into_iter().map(ProjectSummary::from).collect())
    }

    async fn users(&self) -> Result<Vec<UserRef>> {
        let rows: Vec<ProfileRow> = self
            .get_rows("profiles", "select=id,first_name,last_name,email")
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                UserRef::from_profile(
                    r.id,
                    r.first_name.as_deref(),
                    r.last_name.as_deref(),
                    r.email.as_deref(),
                )
            })
            .collect())
    }

    async fn goals(&self) -> Result<Vec<GoalSummary>> {
        let rows: Vec<GoalRow> = self
            .get_rows(
                "goals",
                &format!(
                    "select=id,title,type,progress,target,goal_tags(tags(name))&user_id=eq.{}",
                    self.user_id
                ),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| GoalSummary {
                id: r.id,
                title: r.title,
                goal_type: r.goal_type,
                progress: r.progress.unwrap_or(0),
                target: r.target,
                tags: tag_names(r.goal_tags),
            })
            .collect())
    }

    async fn tags(&self) -> Result<Vec<TagRef>> {
        self.get_rows("tags", "select=id,name").await
    }

    async fn articles(&self) -> Result<Vec<ArticleSummary>> {
        let rows: Vec<ArticleRow> = self
            .get_rows("articles", "select=id,title,folder_id,article_tags(tags(name))")
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| ArticleSummary {
                id: r.id,
                title: r.title,
                folder_id: r.folder_id,
                tags: tag_names(r.article_tags),
            })
            .collect())
    }

    async fn folders(&self) -> Result<Vec<FolderRef>> {
        self.get_rows("folders", "select=id,name,parent_id").await
    }

    async fn project(&self, id: &str) -> Result<Option<ProjectSummary>> {
        let rows: Vec<ProjectRow> = self
            .get_rows("projects", &format!("select={PROJECT_SELECT}&id=eq.{id}"))
            .await?;
        Ok(rows.into_iter().next().map(ProjectSummary::from))
    }

    async fn insert_project(&self, record: &ProjectRecord) -> Result<String> {
        let mut body = serde_json::to_value(record)?;
        body["owner_id"] = json!(self.user_id);
        self.insert_row("projects", body).await
    }

    async fn update_project(&self, id: &str, record: &ProjectRecord) -> Result<()> {
        self.patch_row("projects", id, serde_json::to_value(record)?)
            .await
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        self.delete_row("projects", id).await
    }

    async fn set_project_services(&self, id: &str, services: &[String]) -> Result<()> {
        self.patch_row("projects", id, json!({ "services": services }))
            .await
    }

    async fn set_project_members(&self, id: &str, user_ids: &[String]) -> Result<()> {
        self.rpc(
            "set_project_members",
            json!({ "p_project_id": id, "p_user_ids": user_ids }),
        )
        .await
    }

    async fn set_project_tags(&self, id: &str, tag_names: &[String]) -> Result<()> {
        self.rpc(
            "set_project_tags",
            json!({ "p_project_id": id, "p_tag_names": tag_names }),
        )
        .await
    }

    async fn insert_task(&self, project_id: &str, record: &TaskRecord) -> Result<String> {
        let mut body = serde_json::to_value(record)?;
        body["project_id"] = json!(project_id);
        self.insert_row("tasks", body).await
    }

    async fn set_task_assignees(&self, task_id: &str, user_ids: &[String]) -> Result<()> {
        self.rpc(
            "set_task_assignees",
            json!({ "p_task_id": task_id, "p_user_ids": user_ids }),
        )
        .await
    }

    async fn insert_goal(&self, record: &GoalRecord) -> Result<String> {
        let mut body = serde_json::to_value(record)?;
        body["user_id"] = json!(self.user_id);
        self.insert_row("goals", body).await
    }

    async fn update_goal(&self, id: &str, record: &GoalRecord) -> Result<()> {
        self.patch_row("goals", id, serde_json::to_value(record)?)
            .await
    }

    async fn set_goal_tags(&self, id: &str, tag_names: &[String]) -> Result<()> {
        self.rpc(
            "set_goal_tags",
            json!({ "p_goal_id": id, "p_tag_names": tag_names }),
        )
        .await
    }

    async fn insert_article(&self, record: &ArticleRecord) -> Result<String> {
        let mut body = serde_json::to_value(record)?;
        body["author_id"] = json!(self.user_id);
        self.insert_row("articles", body).await
    }

    async fn update_article(&self, id: &str, record: &ArticleRecord) -> Result<()> {
        self.patch_row("articles", id, serde_json::to_value(record)?)
            .await
    }

    async fn delete_article(&self, id: &str) -> Result<()> {
        self.delete_row("articles", id).await
    }

    async fn set_article_tags(&self, id: &str, tag_names: &[String]) -> Result<()> {
        self.rpc(
            "set_article_tags",
            json!({ "p_article_id": id, "p_tag_names": tag_names }),
        )
        .await
    }

    async fn insert_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        self.insert_row(
            "folders",
            json!({ "name": name, "parent_id": parent_id, "owner_id": self.user_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_row_flattens_embedded_resources() {
        let raw = r#"{
            "id": "p1", "name": "Summer Gala", "status": "Planning",
            "budget": 25000, "services": ["Catering"],
            "tasks": [{"id": "t1", "title": "Book the band", "completed": null,
                       "task_assignees": [{"user_id": "u1"}]}],
            "project_members": [{"user_id": "u1"}, {"user_id": "u2"}],
            "project_tags": [{"tags": {"name": "events"}}, {"tags": null}]
        }"#;
        let row: ProjectRow = serde_json::from_str(raw).unwrap();
        let p = ProjectSummary::from(row);
        assert_eq!(p.tasks[0].assignee_ids, vec!["u1"]);
        assert!(!p.tasks[0].completed);
        assert_eq!(p.assigned_user_ids.len(), 2);
        assert_eq!(p.tags, vec!["events"]);
        assert_eq!(p.budget, Some(25000.0));
    }

    #[test]
    fn null_services_become_empty() {
        let row: ProjectRow =
            serde_json::from_str(r#"{"id": "p1", "name": "X", "services": null}"#).unwrap();
        assert!(ProjectSummary::from(row).services.is_empty());
    }

    #[test]
    fn backend_message_prefers_structured_field() {
        let msg = backend_message(
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
            StatusCode::CONFLICT,
        );
        assert_eq!(msg, "duplicate key value violates unique constraint");
        assert_eq!(
            backend_message("", StatusCode::BAD_GATEWAY),
            "HTTP 502"
        );
    }

    #[test]
    fn missing_anon_key_is_a_config_error() {
        let cfg = WorkspaceConfig {
            anon_key_env: "PP_TEST_MISSING_ANON_KEY_4242".into(),
            ..Default::default()
        };
        assert!(matches!(RestConnector::new(&cfg), Err(Error::Config(_))));
    }
}
