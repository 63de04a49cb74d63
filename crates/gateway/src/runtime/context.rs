//! Context Builder: the per-turn workspace snapshot.

use std::future::Future;
use std::time::Instant;

use pp_domain::config::AssistantConfig;
use pp_domain::error::Result;
use pp_domain::trace::TraceEvent;
use pp_domain::workspace::{Collection, WorkspaceContext};
use pp_workspace::WorkspaceStore;

/// Fetch every collection concurrently. A failing query degrades to an
/// empty list for that collection; the build itself never fails.
pub async fn build_context(
    store: &dyn WorkspaceStore,
    assistant: &AssistantConfig,
    user_id: &str,
) -> WorkspaceContext {
    let start = Instant::now();
    let mut degraded = Vec::new();

    let (projects, users, goals, tags, articles, folders) = tokio::join!(
        store.projects_with_tasks(),
        store.users(),
        store.goals(),
        store.tags(),
        store.articles(),
        store.folders(),
    );

    let mut ctx = WorkspaceContext {
        projects: or_empty(Collection::Projects, projects, &mut degraded),
        users: or_empty(Collection::Users, users, &mut degraded),
        goals: or_empty(Collection::Goals, goals, &mut degraded),
        tags: or_empty(Collection::Tags, tags, &mut degraded),
        articles: or_empty(Collection::Articles, articles, &mut degraded),
        folders: or_empty(Collection::Folders, folders, &mut degraded),
        available_services: assistant.available_services.clone(),
        available_icons: assistant.available_icons.clone(),
        degraded,
    };
    fill_assignee_names(&mut ctx);

    TraceEvent::ContextBuilt {
        user_id: user_id.to_string(),
        projects: ctx.projects.len(),
        users: ctx.users.len(),
        goals: ctx.goals.len(),
        tags: ctx.tags.len(),
        articles: ctx.articles.len(),
        folders: ctx.folders.len(),
        degraded: ctx.degraded.iter().map(|c| c.to_string()).collect(),
        duration_ms: start.elapsed().as_millis() as u64,
    }
    .emit();

    ctx
}

fn or_empty<T>(collection: Collection, result: Result<Vec<T>>, degraded: &mut Vec<Collection>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(collection = %collection, error = %e, "context query failed, continuing without it");
            degraded.push(collection);
            Vec::new()
        }
    }
}

/// Backends return assignee ids only; the model reasons about names.
fn fill_assignee_names(ctx: &mut WorkspaceContext) {
    let users = &ctx.users;
    for project in ctx.projects.iter_mut() {
        for task in project.tasks.iter_mut() {
            if task.assignee_names.is_empty() && !task.assignee_ids.is_empty() {
                task.assignee_names = task
                    .assignee_ids
                    .iter()
                    .filter_map(|id| users.iter().find(|u| &u.id == id))
                    .map(|u| u.display_name.clone())
                    .collect();
            }
        }
    }
}

/// Run `fut` and log how long it took. Used around the slow pipeline stages.
pub(crate) async fn timed<F, T>(stage: &'static str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    tracing::debug!(stage, duration_ms = start.elapsed().as_millis() as u64, "pipeline stage done");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_domain::workspace::{GoalSummary, ProjectSummary, TaskRef, UserRef};
    use pp_workspace::{InMemoryWorkspace, WorkspaceFixture};

    fn fixture() -> WorkspaceFixture {
        WorkspaceFixture {
            users: vec![UserRef {
                id: "u1".into(),
                display_name: "Ada Lovelace".into(),
                email: None,
            }],
            projects: (1..=3)
                .map(|i| ProjectSummary {
                    id: format!("p{i}"),
                    name: format!("Project {i}"),
                    tasks: vec![TaskRef {
                        id: format!("t{i}"),
                        title: "Kickoff".into(),
                        assignee_ids: vec!["u1".into()],
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
            goals: vec![GoalSummary {
                id: "g1".into(),
                title: "Learn Guitar".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_query_degrades_only_its_collection() {
        let ws = InMemoryWorkspace::new(fixture());
        ws.fail_on("goals");
        let ctx = build_context(&ws, &AssistantConfig::default(), "u1").await;

        assert!(ctx.goals.is_empty());
        assert_eq!(ctx.projects.len(), 3);
        assert_eq!(ctx.users.len(), 1);
        assert_eq!(ctx.degraded, vec![Collection::Goals]);
    }

    #[tokio::test]
    async fn assignee_names_are_filled_from_users() {
        let ws = InMemoryWorkspace::new(fixture());
        let ctx = build_context(&ws, &AssistantConfig::default(), "u1").await;
        assert_eq!(ctx.projects[0].tasks[0].assignee_names, vec!["Ada Lovelace"]);
        assert!(ctx.degraded.is_empty());
        assert!(!ctx.available_services.is_empty());
    }
}
