//! Entity Resolver: free-text names in an action payload to snapshot records.
//!
//! Matching per name: case-insensitive exact match wins; otherwise a
//! case-insensitive substring match must be unique. No match and several
//! matches are both errors with a clarifying message, never a guess.
//! List-valued fields (assignees, members) resolve per element and carry
//! their misses along instead of failing the whole action.

use pp_domain::action::{
    ActionPayload, ArticleDetails, ArticleUpdates, GoalDetails, GoalUpdates, ProjectDetails,
    ProjectUpdates, SearchType,
};
use pp_domain::trace::TraceEvent;
use pp_domain::workspace::{
    ArticleSummary, FolderRef, GoalSummary, ProjectSummary, TaskRef, UserRef, WorkspaceContext,
};

const MAX_SUGGESTIONS: usize = 3;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Task,
    Goal,
    User,
    Article,
    Folder,
}

impl EntityKind {
    pub fn noun(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Goal => "goal",
            EntityKind::User => "person",
            EntityKind::Article => "article",
            EntityKind::Folder => "folder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    NotFound {
        entity: EntityKind,
        field: &'static str,
        value: String,
        /// Closest existing names, best first.
        suggestions: Vec<String>,
    },
    Ambiguous {
        entity: EntityKind,
        field: &'static str,
        value: String,
        candidates: Vec<String>,
    },
}

impl ResolutionError {
    pub fn field(&self) -> &'static str {
        match self {
            ResolutionError::NotFound { field, .. } | ResolutionError::Ambiguous { field, .. } => *field,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ResolutionError::NotFound { value, .. } | ResolutionError::Ambiguous { value, .. } => value,
        }
    }

    /// The clarifying message shown to the user.
    pub fn message(&self) -> String {
        match self {
            ResolutionError::NotFound {
                entity,
                value,
                suggestions,
                ..
            } => {
                let mut msg = format!("I couldn't find a {} named \"{value}\".", entity.noun());
                if !suggestions.is_empty() {
                    msg.push_str(&format!(" Did you mean {}?", quoted_list(suggestions, "or")));
                }
                msg
            }
            ResolutionError::Ambiguous {
                entity,
                value,
                candidates,
                ..
            } => format!(
                "\"{value}\" matches more than one {}: {}. Which one do you mean? Please be more specific.",
                entity.noun(),
                quoted_list(candidates, "and"),
            ),
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ResolutionError::NotFound { .. } => "not_found",
            ResolutionError::Ambiguous { .. } => "ambiguous",
        }
    }
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// `"a"`, `"a" and "b"`, `"a", "b" and "c"`.
pub fn quoted_list(items: &[String], conj: &str) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("\"{s}\"")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} {conj} {last}", init.join(", ")),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Matching
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Match `value` against `items` by any of the names `keys` yields.
fn find_one<'a, T>(
    items: &'a [T],
    value: &str,
    entity: EntityKind,
    field: &'static str,
    keys: impl Fn(&T) -> Vec<&str>,
    display: impl Fn(&T) -> &str,
) -> Result<&'a T, ResolutionError> {
    let needle = value.trim().to_lowercase();

    if let Some(hit) = items
        .iter()
        .find(|item| keys(*item).iter().any(|k| k.to_lowercase() == needle))
    {
        return Ok(hit);
    }

    let hits: Vec<&T> = if needle.is_empty() {
        Vec::new()
    } else {
        items
            .iter()
            .filter(|item| keys(*item).iter().any(|k| k.to_lowercase().contains(&needle)))
            .collect()
    };

    match hits.as_slice() {
        [one] => Ok(*one),
        [] => Err(ResolutionError::NotFound {
            entity,
            field,
            value: value.to_string(),
            suggestions: closest(items.iter().map(&display), &needle),
        }),
        many => Err(ResolutionError::Ambiguous {
            entity,
            field,
            value: value.to_string(),
            candidates: many.iter().map(|i| display(*i).to_string()).collect(),
        }),
    }
}

/// Up to [`MAX_SUGGESTIONS`] names by edit distance, ties broken by name.
fn closest<'a>(names: impl Iterator<Item = &'a str>, needle: &str) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = names
        .map(|n| (strsim::levenshtein(&n.to_lowercase(), needle), n))
        .collect();
    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, n)| n.to_string())
        .collect()
}

pub fn find_project<'a>(ctx: &'a WorkspaceContext, name: &str) -> Result<&'a ProjectSummary, ResolutionError> {
    find_one(&ctx.projects, name, EntityKind::Project, "project_name", |p| vec![p.name.as_str()], |p| p.name.as_str())
}

/// Task titles are only unique inside their project.
pub fn find_task<'a>(project: &'a ProjectSummary, title: &str) -> Result<&'a TaskRef, ResolutionError> {
    find_one(&project.tasks, title, EntityKind::Task, "task_title", |t| vec![t.title.as_str()], |t| t.title.as_str())
}

pub fn find_goal<'a>(ctx: &'a WorkspaceContext, title: &str) -> Result<&'a GoalSummary, ResolutionError> {
    find_one(&ctx.goals, title, EntityKind::Goal, "goal_title", |g| vec![g.title.as_str()], |g| g.title.as_str())
}

pub fn find_user<'a>(ctx: &'a WorkspaceContext, name: &str, field: &'static str) -> Result<&'a UserRef, ResolutionError> {
    find_one(
        &ctx.users,
        name,
        EntityKind::User,
        field,
        |u| {
            let mut keys = vec![u.display_name.as_str()];
            if let Some(email) = &u.email {
                keys.push(email.as_str());
            }
            keys
        },
        |u| u.display_name.as_str(),
    )
}

pub fn find_article<'a>(ctx: &'a WorkspaceContext, title: &str) -> Result<&'a ArticleSummary, ResolutionError> {
    find_one(&ctx.articles, title, EntityKind::Article, "article_title", |a| vec![a.title.as_str()], |a| a.title.as_str())
}

pub fn find_folder<'a>(ctx: &'a WorkspaceContext, name: &str, field: &'static str) -> Result<&'a FolderRef, ResolutionError> {
    find_one(&ctx.folders, name, EntityKind::Folder, field, |f| vec![f.name.as_str()], |f| f.name.as_str())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolved actions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-element resolution of a list of user names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedUsers {
    pub ids: Vec<String>,
    pub names: Vec<String>,
    pub unresolved: Vec<ResolutionError>,
}

impl ResolvedUsers {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.unresolved.is_empty()
    }
}

pub fn resolve_users(ctx: &WorkspaceContext, names: &[String], field: &'static str) -> ResolvedUsers {
    let mut out = ResolvedUsers::default();
    for name in names {
        match find_user(ctx, name, field) {
            Ok(user) => {
                if !out.ids.contains(&user.id) {
                    out.ids.push(user.id.clone());
                    out.names.push(user.display_name.clone());
                }
            }
            Err(e) => out.unresolved.push(e),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAction {
    CreateProject {
        details: ProjectDetails,
        members: ResolvedUsers,
    },
    UpdateProject {
        project: ProjectSummary,
        updates: ProjectUpdates,
        add_members: ResolvedUsers,
        remove_members: ResolvedUsers,
    },
    DeleteProject {
        project: ProjectSummary,
    },
    CreateTask {
        project: ProjectSummary,
        title: String,
        description: Option<String>,
        due_date: Option<String>,
        assignees: ResolvedUsers,
    },
    AssignTask {
        project: ProjectSummary,
        task: TaskRef,
        assignees: ResolvedUsers,
    },
    UnassignTask {
        project: ProjectSummary,
        task: TaskRef,
        assignees: ResolvedUsers,
    },
    CreateGoal {
        details: GoalDetails,
    },
    UpdateGoal {
        goal: GoalSummary,
        updates: GoalUpdates,
    },
    CreateArticle {
        details: ArticleDetails,
        folder: Option<FolderRef>,
    },
    UpdateArticle {
        article: ArticleSummary,
        updates: ArticleUpdates,
        folder: Option<FolderRef>,
    },
    DeleteArticle {
        article: ArticleSummary,
    },
    CreateFolder {
        name: String,
        parent: Option<FolderRef>,
    },
    SearchExternal {
        query: String,
        search_type: SearchType,
    },
}

/// Resolve every name-typed field of `action` against `ctx`.
///
/// Deterministic: the same payload and snapshot always give the same result.
pub fn resolve(action: &ActionPayload, ctx: &WorkspaceContext) -> Result<ResolvedAction, ResolutionError> {
    let result = resolve_inner(action, ctx);
    if let Err(e) = &result {
        TraceEvent::ResolutionFailed {
            action: action.kind().to_string(),
            field: e.field().to_string(),
            value: e.value().to_string(),
            reason: e.reason().to_string(),
        }
        .emit();
    }
    result
}

fn resolve_inner(action: &ActionPayload, ctx: &WorkspaceContext) -> Result<ResolvedAction, ResolutionError> {
    let optional_folder = |name: &Option<String>, field: &'static str| -> Result<Option<FolderRef>, ResolutionError> {
        match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => find_folder(ctx, n, field).map(|f| Some(f.clone())),
            None => Ok(None),
        }
    };

    Ok(match action {
        ActionPayload::CreateProject { project_details } => ResolvedAction::CreateProject {
            members: resolve_users(ctx, &project_details.members, "members"),
            details: project_details.clone(),
        },
        ActionPayload::UpdateProject { project_name, updates } => ResolvedAction::UpdateProject {
            project: find_project(ctx, project_name)?.clone(),
            add_members: resolve_users(ctx, &updates.add_members, "add_members"),
            remove_members: resolve_users(ctx, &updates.remove_members, "remove_members"),
            updates: updates.clone(),
        },
        ActionPayload::DeleteProject { project_name } => ResolvedAction::DeleteProject {
            project: find_project(ctx, project_name)?.clone(),
        },
        ActionPayload::CreateTask {
            project_name,
            task_title,
            description,
            due_date,
            assignees,
        } => ResolvedAction::CreateTask {
            project: find_project(ctx, project_name)?.clone(),
            title: task_title.trim().to_string(),
            description: description.clone(),
            due_date: due_date.clone(),
            assignees: resolve_users(ctx, assignees, "assignees"),
        },
        ActionPayload::AssignTask {
            project_name,
            task_title,
            assignees,
        } => {
            let project = find_project(ctx, project_name)?;
            ResolvedAction::AssignTask {
                task: find_task(project, task_title)?.clone(),
                project: project.clone(),
                assignees: resolve_users(ctx, assignees, "assignees"),
            }
        }
        ActionPayload::UnassignTask {
            project_name,
            task_title,
            assignees,
        } => {
            let project = find_project(ctx, project_name)?;
            ResolvedAction::UnassignTask {
                task: find_task(project, task_title)?.clone(),
                project: project.clone(),
                assignees: resolve_users(ctx, assignees, "assignees"),
            }
        }
        ActionPayload::CreateGoal { goal_details } => ResolvedAction::CreateGoal {
            details: goal_details.clone(),
        },
        ActionPayload::UpdateGoal { goal_title, updates } => ResolvedAction::UpdateGoal {
            goal: find_goal(ctx, goal_title)?.clone(),
            updates: updates.clone(),
        },
        ActionPayload::CreateArticle { article_details } => ResolvedAction::CreateArticle {
            folder: optional_folder(&article_details.folder_name, "folder_name")?,
            details: article_details.clone(),
        },
        ActionPayload::UpdateArticle { article_title, updates } => ResolvedAction::UpdateArticle {
            article: find_article(ctx, article_title)?.clone(),
            folder: optional_folder(&updates.folder_name, "folder_name")?,
            updates: updates.clone(),
        },
        ActionPayload::DeleteArticle { article_title } => ResolvedAction::DeleteArticle {
            article: find_article(ctx, article_title)?.clone(),
        },
        ActionPayload::CreateFolder {
            folder_name,
            parent_folder_name,
        } => ResolvedAction::CreateFolder {
            name: folder_name.trim().to_string(),
            parent: optional_folder(parent_folder_name, "parent_folder_name")?,
        },
        ActionPayload::SearchExternal { query, search_type } => ResolvedAction::SearchExternal {
            query: query.clone(),
            search_type: *search_type,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, name: &str) -> ProjectSummary {
        ProjectSummary {
            id: id.into(),
            name: name.into(),
            tasks: vec![TaskRef {
                id: format!("{id}-t1"),
                title: "Book the band".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn ctx() -> WorkspaceContext {
        WorkspaceContext {
            projects: vec![
                project("p1", "Marketing Sprint"),
                project("p2", "Marketing Q3"),
                project("p3", "Summer Gala"),
            ],
            users: vec![
                UserRef {
                    id: "u1".into(),
                    display_name: "Jane Doe".into(),
                    email: Some("jane@studio.io".into()),
                },
                UserRef {
                    id: "u2".into(),
                    display_name: "John Smith".into(),
                    email: None,
                },
            ],
            goals: vec![GoalSummary {
                id: "g1".into(),
                title: "Learn Spanish".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn exact_match_ignores_case() {
        let c = ctx();
        assert_eq!(find_project(&c, "summer GALA").unwrap().id, "p3");
    }

    #[test]
    fn exact_match_beats_substring() {
        let mut c = ctx();
        c.projects.push(project("p4", "Marketing"));
        assert_eq!(find_project(&c, "marketing").unwrap().id, "p4");
    }

    #[test]
    fn unique_substring_resolves() {
        let c = ctx();
        assert_eq!(find_project(&c, "gala").unwrap().id, "p3");
    }

    #[test]
    fn several_substrings_are_ambiguous() {
        let c = ctx();
        let err = find_project(&c, "marketing").unwrap_err();
        match &err {
            ResolutionError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, &vec!["Marketing Sprint".to_string(), "Marketing Q3".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
        let msg = err.message();
        assert!(msg.contains("Marketing Sprint") && msg.contains("Marketing Q3"));
    }

    #[test]
    fn not_found_suggests_closest_names() {
        let c = ctx();
        let err = find_goal(&c, "Learn Guitar").unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound { .. }));
        assert_eq!(
            err.message(),
            "I couldn't find a goal named \"Learn Guitar\". Did you mean \"Learn Spanish\"?"
        );
    }

    #[test]
    fn users_match_by_email() {
        let c = ctx();
        assert_eq!(find_user(&c, "JANE@studio.io", "assignees").unwrap().id, "u1");
    }

    #[test]
    fn list_fields_resolve_per_element() {
        let c = ctx();
        let names = vec!["Jane".to_string(), "Zed".to_string(), "jane doe".to_string()];
        let users = resolve_users(&c, &names, "assignees");
        assert_eq!(users.ids, vec!["u1"]);
        assert_eq!(users.unresolved.len(), 1);
        assert_eq!(users.unresolved[0].value(), "Zed");
    }

    #[test]
    fn task_is_scoped_to_its_project() {
        let c = ctx();
        let action = ActionPayload::AssignTask {
            project_name: "Summer Gala".into(),
            task_title: "band".into(),
            assignees: vec!["John Smith".into()],
        };
        match resolve(&action, &c).unwrap() {
            ResolvedAction::AssignTask { project, task, assignees } => {
                assert_eq!(project.id, "p3");
                assert_eq!(task.id, "p3-t1");
                assert_eq!(assignees.ids, vec!["u2"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let c = ctx();
        let action = ActionPayload::DeleteProject {
            project_name: "market".into(),
        };
        assert_eq!(resolve(&action, &c), resolve(&action, &c));
    }

    #[test]
    fn quoted_list_joins_naturally() {
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(quoted_list(&items, "and"), "\"a\", \"b\" and \"c\"");
        assert_eq!(quoted_list(&items[..1], "or"), "\"a\"");
    }
}
