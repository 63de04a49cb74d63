//! Collaborator traits and write records.

use std::sync::Arc;

use async_trait::async_trait;
use pp_domain::error::Result;
use pp_domain::workspace::{
    ArticleSummary, FolderRef, GoalSummary, ProjectSummary, TagRef, UserRef,
};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Write records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scalar project columns. Updates always carry the full merged row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: Option<f64>,
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ProjectRecord {
    /// The scalar columns of an existing project.
    pub fn from_summary(p: &ProjectSummary) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone(),
            status: p.status.clone(),
            start_date: p.start_date.clone(),
            end_date: p.end_date.clone(),
            budget: p.budget,
            venue: p.venue.clone(),
            icon: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub title: String,
    #[serde(rename = "type")]
    pub goal_type: Option<String>,
    pub progress: u32,
    pub target: Option<u32>,
}

impl GoalRecord {
    pub fn from_summary(g: &GoalSummary) -> Self {
        Self {
            title: g.title.clone(),
            goal_type: g.goal_type.clone(),
            progress: g.progress,
            target: g.target,
        }
    }
}

/// Article columns. `None` leaves a column unchanged on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// HTML body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_image_url: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WorkspaceStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// User-scoped access to workspace data.
///
/// Every call is atomic on its own and fails with a human-readable
/// [`Error::Store`](pp_domain::error::Error::Store) message. Multi-step
/// operations are sequenced by the caller; there are no transactions.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    // ── reads ────────────────────────────────────────────────────────

    async fn projects_with_tasks(&self) -> Result<Vec<ProjectSummary>>;
    async fn users(&self) -> Result<Vec<UserRef>>;
    async fn goals(&self) -> Result<Vec<GoalSummary>>;
    async fn tags(&self) -> Result<Vec<TagRef>>;
    async fn articles(&self) -> Result<Vec<ArticleSummary>>;
    async fn folders(&self) -> Result<Vec<FolderRef>>;
    /// A single project by id, freshly read. `None` if it no longer exists.
    async fn project(&self, id: &str) -> Result<Option<ProjectSummary>>;

    // ── projects ─────────────────────────────────────────────────────

    async fn insert_project(&self, record: &ProjectRecord) -> Result<String>;
    async fn update_project(&self, id: &str, record: &ProjectRecord) -> Result<()>;
    async fn delete_project(&self, id: &str) -> Result<()>;
    async fn set_project_services(&self, id: &str, services: &[String]) -> Result<()>;
    async fn set_project_members(&self, id: &str, user_ids: &[String]) -> Result<()>;
    /// Replace the project's tags by name, creating unknown tags.
    async fn set_project_tags(&self, id: &str, tag_names: &[String]) -> Result<()>;

    // ── tasks ────────────────────────────────────────────────────────

    async fn insert_task(&self, project_id: &str, record: &TaskRecord) -> Result<String>;
    async fn set_task_assignees(&self, task_id: &str, user_ids: &[String]) -> Result<()>;

    // ── goals ────────────────────────────────────────────────────────

    async fn insert_goal(&self, record: &GoalRecord) -> Result<String>;
    async fn update_goal(&self, id: &str, record: &GoalRecord) -> Result<()>;
    async fn set_goal_tags(&self, id: &str, tag_names: &[String]) -> Result<()>;

    // ── articles & folders ───────────────────────────────────────────

    async fn insert_article(&self, record: &ArticleRecord) -> Result<String>;
    async fn update_article(&self, id: &str, record: &ArticleRecord) -> Result<()>;
    async fn delete_article(&self, id: &str) -> Result<()>;
    async fn set_article_tags(&self, id: &str, tag_names: &[String]) -> Result<()>;
    async fn insert_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authentication
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// An authenticated caller plus a store acting with their credentials.
#[derive(Clone)]
pub struct Session {
    pub user: AuthUser,
    pub store: Arc<dyn WorkspaceStore>,
}

#[async_trait]
pub trait WorkspaceConnector: Send + Sync {
    /// Validate a bearer token. Fails with `Error::Auth` when the token is
    /// missing, expired or rejected.
    async fn authenticate(&self, token: &str) -> Result<Session>;

    /// Short name for logs and readiness output.
    fn backend(&self) -> &'static str;
}
