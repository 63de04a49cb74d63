//! In-memory [`WorkspaceStore`] for tests and the offline demo mode.
//!
//! One shared dataset for every caller. Individual operations can be made to
//! fail with [`InMemoryWorkspace::fail_on`] to exercise degraded paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use pp_domain::error::{Error, Result};
use pp_domain::workspace::{
    ArticleSummary, FolderRef, GoalSummary, ProjectSummary, TagRef, TaskRef, UserRef,
};
use serde::{Deserialize, Serialize};

use crate::store::{
    ArticleRecord, AuthUser, GoalRecord, ProjectRecord, Session, TaskRecord, WorkspaceConnector,
    WorkspaceStore,
};

/// Seed data, also the JSON fixture format for `workspace.fixture_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceFixture {
    #[serde(default)]
    pub users: Vec<UserRef>,
    #[serde(default)]
    pub projects: Vec<ProjectSummary>,
    #[serde(default)]
    pub goals: Vec<GoalSummary>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub articles: Vec<ArticleSummary>,
    #[serde(default)]
    pub folders: Vec<FolderRef>,
}

#[derive(Default)]
struct Data {
    fixture: WorkspaceFixture,
    article_bodies: HashMap<String, ArticleRecord>,
}

pub struct InMemoryWorkspace {
    data: RwLock<Data>,
    failing: RwLock<HashSet<String>>,
}

impl InMemoryWorkspace {
    pub fn new(fixture: WorkspaceFixture) -> Self {
        Self {
            data: RwLock::new(Data {
                fixture,
                article_bodies: HashMap::new(),
            }),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Make the named operation (trait method name) fail until cleared.
    pub fn fail_on(&self, op: &str) {
        self.failing.write().insert(op.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    /// A copy of the current dataset.
    pub fn snapshot(&self) -> WorkspaceFixture {
        self.data.read().fixture.clone()
    }

    /// The last written columns of an article.
    pub fn article_record(&self, id: &str) -> Option<ArticleRecord> {
        self.data.read().article_bodies.get(id).cloned()
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.failing.read().contains(op) {
            return Err(Error::Store(format!("{op} is unavailable")));
        }
        Ok(())
    }

    fn with_project<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ProjectSummary) -> T,
    ) -> Result<T> {
        let mut data = self.data.write();
        let project = data
            .fixture
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::Store(format!("project {id} does not exist")))?;
        Ok(f(project))
    }

    fn ensure_tags(data: &mut Data, names: &[String]) {
        for name in names {
            let exists = data
                .fixture
                .tags
                .iter()
                .any(|t| t.name.eq_ignore_ascii_case(name));
            if !exists {
                data.fixture.tags.push(TagRef {
                    id: new_id(),
                    name: name.clone(),
                });
            }
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl WorkspaceStore for InMemoryWorkspace {
    async fn projects_with_tasks(&self) -> Result<Vec<ProjectSummary>> {
        self.check("projects_with_tasks")?;
        Ok(self.data.read().fixture.projects.clone())
    }

    async fn users(&self) -> Result<Vec<UserRef>> {
        self.check("users")?;
        Ok(self.data.read().fixture.users.clone())
    }

    async fn goals(&self) -> Result<Vec<GoalSummary>> {
        self.check("goals")?;
        Ok(self.data.read().fixture.goals.clone())
    }

    async fn tags(&self) -> Result<Vec<TagRef>> {
        self.check("tags")?;
        Ok(self.data.read().fixture.tags.clone())
    }

    async fn articles(&self) -> Result<Vec<ArticleSummary>> {
        self.check("articles")?;
        Ok(self.data.read().fixture.articles.clone())
    }

    async fn folders(&self) -> Result<Vec<FolderRef>> {
        self.check("folders")?;
        Ok(self.data.read().fixture.folders.clone())
    }

    async fn project(&self, id: &str) -> Result<Option<ProjectSummary>> {
        self.check("project")?;
        Ok(self
            .data
            .read()
            .fixture
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn insert_project(&self, record: &ProjectRecord) -> Result<String> {
        self.check("insert_project")?;
        let id = new_id();
        self.data.write().fixture.projects.push(ProjectSummary {
            id: id.clone(),
            name: record.name.clone(),
            status: record.status.clone(),
            description: record.description.clone(),
            start_date: record.start_date.clone(),
            end_date: record.end_date.clone(),
            budget: record.budget,
            venue: record.venue.clone(),
            ..Default::default()
        });
        Ok(id)
    }

    async fn update_project(&self, id: &str, record: &ProjectRecord) -> Result<()> {
        self.check("update_project")?;
        self.with_project(id, |p| {
            p.name = record.name.clone();
            p.description = record.description.clone();
            p.status = record.status.clone();
            p.start_date = record.start_date.clone();
            p.end_date = record.end_date.clone();
            p.budget = record.budget;
            p.venue = record.venue.clone();
        })
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        self.check("delete_project")?;
        let mut data = self.data.write();
        let before = data.fixture.projects.len();
        data.fixture.projects.retain(|p| p.id != id);
        if data.fixture.projects.len() == before {
            return Err(Error::Store(format!("project {id} does not exist")));
        }
        Ok(())
    }

    async fn set_project_services(&self, id: &str, services: &[String]) -> Result<()> {
        self.check("set_project_services")?;
        self.with_project(id, |p| p.services = services.to_vec())
    }

    async fn set_project_members(&self, id: &str, user_ids: &[String]) -> Result<()> {
        self.check("set_project_members")?;
        self.with_project(id, |p| p.assigned_user_ids = user_ids.to_vec())
    }

    async fn set_project_tags(&self, id: &str, tag_names: &[String]) -> Result<()> {
        self.check("set_project_tags")?;
        Self::ensure_tags(&mut self.data.write(), tag_names);
        self.with_project(id, |p| p.tags = tag_names.to_vec())
    }

    async fn insert_task(&self, project_id: &str, record: &TaskRecord) -> Result<String> {
        self.check("insert_task")?;
        let id = new_id();
        let task = TaskRef {
            id: id.clone(),
            title: record.title.clone(),
            ..Default::default()
        };
        self.with_project(project_id, |p| p.tasks.push(task))?;
        Ok(id)
    }

    async fn set_task_assignees(&self, task_id: &str, user_ids: &[String]) -> Result<()> {
        self.check("set_task_assignees")?;
        let mut data = self.data.write();
        let names: Vec<String> = user_ids
            .iter()
            .filter_map(|uid| {
                data.fixture
                    .users
                    .iter()
                    .find(|u| &u.id == uid)
                    .map(|u| u.display_name.clone())
            })
            .collect();
        let task = data
            .fixture
            .projects
            .iter_mut()
            .flat_map(|p| p.tasks.iter_mut())
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::Store(format!("task {task_id} does not exist")))?;
        task.assignee_ids = user_ids.to_vec();
        task.assignee_names = names;
        Ok(())
    }

    async fn insert_goal(&self, record: &GoalRecord) -> Result<String> {
        self.check("insert_goal")?;
        let id = new_id();
        self.data.write().fixture.goals.push(GoalSummary {
            id: id.clone(),
            title: record.title.clone(),
            goal_type: record.goal_type.clone(),
            progress: record.progress,
            target: record.target,
            tags: Vec::new(),
        });
        Ok(id)
    }

    async fn update_goal(&self, id: &str, record: &GoalRecord) -> Result<()> {
        self.check("update_goal")?;
        let mut data = self.data.write();
        let goal = data
            .fixture
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| Error::Store(format!("goal {id} does not exist")))?;
        goal.title = record.title.clone();
        goal.goal_type = record.goal_type.clone();
        goal.progress = record.progress;
        goal.target = record.target;
        Ok(())
    }

    async fn set_goal_tags(&self, id: &str, tag_names: &[String]) -> Result<()> {
        self.check("set_goal_tags")?;
        let mut data = self.data.write();
        Self::ensure_tags(&mut data, tag_names);
        let goal = data
            .fixture
            .goals
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| Error::Store(format!("goal {id} does not exist")))?;
        goal.tags = tag_names.to_vec();
        Ok(())
    }

    async fn insert_article(&self, record: &ArticleRecord) -> Result<String> {
        self.check("insert_article")?;
        let id = new_id();
        let mut data = self.data.write();
        data.fixture.articles.push(ArticleSummary {
            id: id.clone(),
            title: record.title.clone().unwrap_or_default(),
            folder_id: record.folder_id.clone(),
            tags: Vec::new(),
        });
        data.article_bodies.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn update_article(&self, id: &str, record: &ArticleRecord) -> Result<()> {
        self.check("update_article")?;
        let mut data = self.data.write();
        let article = data
            .fixture
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::Store(format!("article {id} does not exist")))?;
        if let Some(title) = &record.title {
            article.title = title.clone();
        }
        if record.folder_id.is_some() {
            article.folder_id = record.folder_id.clone();
        }
        let body = data.article_bodies.entry(id.to_string()).or_default();
        if record.title.is_some() {
            body.title = record.title.clone();
        }
        if record.content.is_some() {
            body.content = record.content.clone();
        }
        if record.folder_id.is_some() {
            body.folder_id = record.folder_id.clone();
        }
        if record.header_image_url.is_some() {
            body.header_image_url = record.header_image_url.clone();
        }
        Ok(())
    }

    async fn delete_article(&self, id: &str) -> Result<()> {
        self.check("delete_article")?;
        let mut data = self.data.write();
        let before = data.fixture.articles.len();
        data.fixture.articles.retain(|a| a.id != id);
        if data.fixture.articles.len() == before {
            return Err(Error::Store(format!("article {id} does not exist")));
        }
        data.article_bodies.remove(id);
        Ok(())
    }

    async fn set_article_tags(&self, id: &str, tag_names: &[String]) -> Result<()> {
        self.check("set_article_tags")?;
        let mut data = self.data.write();
        Self::ensure_tags(&mut data, tag_names);
        let article = data
            .fixture
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::Store(format!("article {id} does not exist")))?;
        article.tags = tag_names.to_vec();
        Ok(())
    }

    async fn insert_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        self.check("insert_folder")?;
        let id = new_id();
        self.data.write().fixture.folders.push(FolderRef {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(String::from),
        });
        Ok(id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accepts any non-empty token. A token equal to a fixture user id acts as
/// that user; anything else acts as the first fixture user (or a synthetic
/// demo user when the fixture has none).
pub struct InMemoryConnector {
    workspace: Arc<InMemoryWorkspace>,
}

impl InMemoryConnector {
    pub fn new(workspace: Arc<InMemoryWorkspace>) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Arc<InMemoryWorkspace> {
        &self.workspace
    }
}

#[async_trait]
impl WorkspaceConnector for InMemoryConnector {
    async fn authenticate(&self, token: &str) -> Result<Session> {
        if token.trim().is_empty() {
            return Err(Error::Auth("missing bearer token".into()));
        }
        let user = {
            let data = self.workspace.data.read();
            let users = &data.fixture.users;
            users
                .iter()
                .find(|u| u.id == token)
                .or_else(|| users.first())
                .map(|u| AuthUser {
                    id: u.id.clone(),
                    display_name: u.display_name.clone(),
                    email: u.email.clone(),
                })
                .unwrap_or_else(|| AuthUser {
                    id: "demo-user".into(),
                    display_name: "Demo User".into(),
                    email: None,
                })
        };
        Ok(Session {
            user,
            store: self.workspace.clone(),
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> WorkspaceFixture {
        WorkspaceFixture {
            users: vec![
                UserRef::from_profile("u1", Some("Jane"), Some("Doe"), None),
                UserRef::from_profile("u2", Some("John"), Some("Smith"), None),
            ],
            projects: vec![ProjectSummary {
                id: "p1".into(),
                name: "Summer Gala".into(),
                tasks: vec![TaskRef {
                    id: "t1".into(),
                    title: "Book the band".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn token_selects_user() {
        let connector = InMemoryConnector::new(Arc::new(InMemoryWorkspace::new(fixture())));
        assert_eq!(connector.authenticate("u2").await.unwrap().user.id, "u2");
        assert_eq!(connector.authenticate("anything").await.unwrap().user.id, "u1");
        assert!(connector.authenticate("  ").await.is_err());
    }

    #[tokio::test]
    async fn injected_failure_only_hits_named_operation() {
        let ws = InMemoryWorkspace::new(fixture());
        ws.fail_on("goals");
        assert!(matches!(ws.goals().await, Err(Error::Store(_))));
        assert_eq!(ws.projects_with_tasks().await.unwrap().len(), 1);
        ws.clear_failures();
        assert!(ws.goals().await.is_ok());
    }

    #[tokio::test]
    async fn task_assignees_carry_display_names() {
        let ws = InMemoryWorkspace::new(fixture());
        ws.set_task_assignees("t1", &["u1".into(), "u2".into()])
            .await
            .unwrap();
        let project = ws.project("p1").await.unwrap().unwrap();
        assert_eq!(
            project.tasks[0].assignee_names,
            vec!["Jane Doe", "John Smith"]
        );
    }

    #[tokio::test]
    async fn tags_are_created_on_demand() {
        let ws = InMemoryWorkspace::new(fixture());
        ws.set_project_tags("p1", &["events".into()]).await.unwrap();
        assert_eq!(ws.tags().await.unwrap()[0].name, "events");
    }

    #[tokio::test]
    async fn deleting_missing_project_fails() {
        let ws = InMemoryWorkspace::new(fixture());
        ws.delete_project("p1").await.unwrap();
        assert!(ws.delete_project("p1").await.is_err());
        assert!(ws.project("p1").await.unwrap().is_none());
    }
}
