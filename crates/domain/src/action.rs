//! The action grammar.
//!
//! [`ActionPayload`] is a closed, tagged union decoded from model output.
//! [`ActionKind`] is the schema registry: one entry per variant carrying the
//! wire tag, a one-line description and an example object. The prompt is
//! rendered from the registry, so adding an action means adding a variant,
//! a registry entry and an executor branch.

use serde::{Deserialize, Deserializer, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPayload {
    CreateProject {
        project_details: ProjectDetails,
    },
    UpdateProject {
        project_name: String,
        updates: ProjectUpdates,
    },
    DeleteProject {
        project_name: String,
    },
    CreateTask {
        project_name: String,
        task_title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        due_date: Option<String>,
        #[serde(default, deserialize_with = "de_string_list")]
        assignees: Vec<String>,
    },
    AssignTask {
        project_name: String,
        task_title: String,
        #[serde(deserialize_with = "de_string_list")]
        assignees: Vec<String>,
    },
    UnassignTask {
        project_name: String,
        task_title: String,
        #[serde(deserialize_with = "de_string_list")]
        assignees: Vec<String>,
    },
    CreateGoal {
        goal_details: GoalDetails,
    },
    UpdateGoal {
        goal_title: String,
        updates: GoalUpdates,
    },
    CreateArticle {
        article_details: ArticleDetails,
    },
    UpdateArticle {
        article_title: String,
        updates: ArticleUpdates,
    },
    DeleteArticle {
        article_title: String,
    },
    CreateFolder {
        folder_name: String,
        #[serde(default)]
        parent_folder_name: Option<String>,
    },
    SearchExternal {
        query: String,
        #[serde(default)]
        search_type: SearchType,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_number")]
    pub budget: Option<f64>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub services: Vec<String>,
    /// Member display names or emails.
    #[serde(default, deserialize_with = "de_string_list")]
    pub members: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub tags: Vec<String>,
}

/// Merge-style project update: absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdates {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_number")]
    pub budget: Option<f64>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub add_members: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub remove_members: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub add_services: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub remove_services: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub add_tags: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub remove_tags: Vec<String>,
}

impl ProjectUpdates {
    /// True when no field would change anything.
    pub fn is_empty(&self) -> bool {
        self == &ProjectUpdates::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalDetails {
    pub title: String,
    #[serde(default, rename = "type")]
    pub goal_type: Option<String>,
    #[serde(default)]
    pub target: Option<u32>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalUpdates {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub goal_type: Option<String>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub target: Option<u32>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub add_tags: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub remove_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetails {
    pub title: String,
    /// HTML body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub header_image_query: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleUpdates {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub header_image_query: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Maps,
    Website,
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::CreateProject { .. } => ActionKind::CreateProject,
            ActionPayload::UpdateProject { .. } => ActionKind::UpdateProject,
            ActionPayload::DeleteProject { .. } => ActionKind::DeleteProject,
            ActionPayload::CreateTask { .. } => ActionKind::CreateTask,
            ActionPayload::AssignTask { .. } => ActionKind::AssignTask,
            ActionPayload::UnassignTask { .. } => ActionKind::UnassignTask,
            ActionPayload::CreateGoal { .. } => ActionKind::CreateGoal,
            ActionPayload::UpdateGoal { .. } => ActionKind::UpdateGoal,
            ActionPayload::CreateArticle { .. } => ActionKind::CreateArticle,
            ActionPayload::UpdateArticle { .. } => ActionKind::UpdateArticle,
            ActionPayload::DeleteArticle { .. } => ActionKind::DeleteArticle,
            ActionPayload::CreateFolder { .. } => ActionKind::CreateFolder,
            ActionPayload::SearchExternal { .. } => ActionKind::SearchExternal,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schema registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    CreateProject,
    UpdateProject,
    DeleteProject,
    CreateTask,
    AssignTask,
    UnassignTask,
    CreateGoal,
    UpdateGoal,
    CreateArticle,
    UpdateArticle,
    DeleteArticle,
    CreateFolder,
    SearchExternal,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::CreateProject,
        ActionKind::UpdateProject,
        ActionKind::DeleteProject,
        ActionKind::CreateTask,
        ActionKind::AssignTask,
        ActionKind::UnassignTask,
        ActionKind::CreateGoal,
        ActionKind::UpdateGoal,
        ActionKind::CreateArticle,
        ActionKind::UpdateArticle,
        ActionKind::DeleteArticle,
        ActionKind::CreateFolder,
        ActionKind::SearchExternal,
    ];

    /// The value of the `action` field on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::CreateProject => "CREATE_PROJECT",
            ActionKind::UpdateProject => "UPDATE_PROJECT",
            ActionKind::DeleteProject => "DELETE_PROJECT",
            ActionKind::CreateTask => "CREATE_TASK",
            ActionKind::AssignTask => "ASSIGN_TASK",
            ActionKind::UnassignTask => "UNASSIGN_TASK",
            ActionKind::CreateGoal => "CREATE_GOAL",
            ActionKind::UpdateGoal => "UPDATE_GOAL",
            ActionKind::CreateArticle => "CREATE_ARTICLE",
            ActionKind::UpdateArticle => "UPDATE_ARTICLE",
            ActionKind::DeleteArticle => "DELETE_ARTICLE",
            ActionKind::CreateFolder => "CREATE_FOLDER",
            ActionKind::SearchExternal => "SEARCH_EXTERNAL",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag.trim())
    }

    /// Irreversible or sensitive actions need an explicit affirmative turn.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            ActionKind::CreateTask | ActionKind::DeleteProject | ActionKind::DeleteArticle
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionKind::CreateProject => "Create a new project. Infer name, description, dates, budget, venue, services and members from a free-form brief.",
            ActionKind::UpdateProject => "Change fields of an existing project. Only include fields that change; use add_*/remove_* for members, services and tags.",
            ActionKind::DeleteProject => "Permanently delete a project. Requires confirmation.",
            ActionKind::CreateTask => "Add a task to a project, optionally assigning users. Requires confirmation.",
            ActionKind::AssignTask => "Assign users to an existing task of a project.",
            ActionKind::UnassignTask => "Remove users from an existing task of a project.",
            ActionKind::CreateGoal => "Create a personal or team goal.",
            ActionKind::UpdateGoal => "Change a goal's title, type, target or progress, or add/remove tags.",
            ActionKind::CreateArticle => "Write a knowledge-base article. Content is HTML; header_image_query optionally finds a header image.",
            ActionKind::UpdateArticle => "Change an existing article's title, HTML content, folder or header image.",
            ActionKind::DeleteArticle => "Permanently delete an article. Requires confirmation.",
            ActionKind::CreateFolder => "Create an article folder, optionally inside a parent folder.",
            ActionKind::SearchExternal => "Look up a business or place on maps (search_type \"maps\") or a website (search_type \"website\").",
        }
    }

    /// One canonical example object for the prompt.
    pub fn example(&self) -> &'static str {
        match self {
            ActionKind::CreateProject => r#"{"action": "CREATE_PROJECT", "project_details": {"name": "Summer Gala", "description": "Annual donor evening", "status": "Planning", "start_date": "2026-07-12", "end_date": "2026-07-12", "budget": 25000, "venue": "Riverside Hall", "services": ["Event Planning", "Catering"], "members": ["Jane Doe"], "tags": ["events"]}}"#,
            ActionKind::UpdateProject => r#"{"action": "UPDATE_PROJECT", "project_name": "Summer Gala", "updates": {"status": "Done", "add_members": ["John Smith"], "remove_services": ["Catering"]}}"#,
            ActionKind::DeleteProject => r#"{"action": "DELETE_PROJECT", "project_name": "Old Website Backup"}"#,
            ActionKind::CreateTask => r#"{"action": "CREATE_TASK", "project_name": "Summer Gala", "task_title": "Book the band", "description": "Jazz trio, 3 sets", "due_date": "2026-06-01", "assignees": ["Jane Doe"]}"#,
            ActionKind::AssignTask => r#"{"action": "ASSIGN_TASK", "project_name": "Summer Gala", "task_title": "Book the band", "assignees": ["John Smith"]}"#,
            ActionKind::UnassignTask => r#"{"action": "UNASSIGN_TASK", "project_name": "Summer Gala", "task_title": "Book the band", "assignees": ["Jane Doe"]}"#,
            ActionKind::CreateGoal => r#"{"action": "CREATE_GOAL", "goal_details": {"title": "Learn Guitar", "type": "habit", "target": 30, "tags": ["personal"]}}"#,
            ActionKind::UpdateGoal => r#"{"action": "UPDATE_GOAL", "goal_title": "Learn Guitar", "updates": {"progress": 12, "add_tags": ["music"]}}"#,
            ActionKind::CreateArticle => r#"{"action": "CREATE_ARTICLE", "article_details": {"title": "Onboarding Checklist", "content": "<h1>Welcome</h1><p>...</p>", "folder_name": "HR", "header_image_query": "office welcome", "tags": ["onboarding"]}}"#,
            ActionKind::UpdateArticle => r#"{"action": "UPDATE_ARTICLE", "article_title": "Onboarding Checklist", "updates": {"content": "<p>Updated steps</p>"}}"#,
            ActionKind::DeleteArticle => r#"{"action": "DELETE_ARTICLE", "article_title": "Onboarding Checklist"}"#,
            ActionKind::CreateFolder => r#"{"action": "CREATE_FOLDER", "folder_name": "Policies", "parent_folder_name": "HR"}"#,
            ActionKind::SearchExternal => r#"{"action": "SEARCH_EXTERNAL", "query": "Riverside Hall Portland", "search_type": "maps"}"#,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ── lenient deserializers ───────────────────────────────────────────

/// Accept either a list of strings or a single comma-separated string.
fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<String>),
        One(String),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(v) => v
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect(),
        OneOrMany::One(s) => s
            .split(',')
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty())
            .collect(),
        OneOrMany::Null(()) => Vec::new(),
    })
}

/// Accept `25000`, `"25000"`, `"$25,000"` or null.
fn de_lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_example_decodes_to_its_kind() {
        for kind in ActionKind::ALL {
            let payload: ActionPayload = serde_json::from_str(kind.example())
                .unwrap_or_else(|e| panic!("{kind} example failed to decode: {e}"));
            assert_eq!(payload.kind(), kind);
        }
    }

    #[test]
    fn tags_round_trip_through_from_tag() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ActionKind::from_tag("LAUNCH_ROCKET"), None);
    }

    #[test]
    fn confirmation_set_is_tasks_and_deletes() {
        let sensitive: Vec<_> = ActionKind::ALL
            .into_iter()
            .filter(|k| k.requires_confirmation())
            .collect();
        assert_eq!(
            sensitive,
            vec![
                ActionKind::DeleteProject,
                ActionKind::CreateTask,
                ActionKind::DeleteArticle
            ]
        );
    }

    #[test]
    fn assignees_accept_comma_separated_string() {
        let raw = r#"{"action": "ASSIGN_TASK", "project_name": "P", "task_title": "T", "assignees": "Ann, Bob"}"#;
        let payload: ActionPayload = serde_json::from_str(raw).unwrap();
        match payload {
            ActionPayload::AssignTask { assignees, .. } => assert_eq!(assignees, vec!["Ann", "Bob"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn budget_accepts_currency_string() {
        let raw = r#"{"name": "Gala", "budget": "$25,000"}"#;
        let details: ProjectDetails = serde_json::from_str(raw).unwrap();
        assert_eq!(details.budget, Some(25000.0));
    }

    #[test]
    fn update_with_only_status_is_not_empty() {
        let updates: ProjectUpdates = serde_json::from_str(r#"{"status": "Done"}"#).unwrap();
        assert!(!updates.is_empty());
        assert!(ProjectUpdates::default().is_empty());
    }
}
