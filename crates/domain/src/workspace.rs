//! Point-in-time snapshot of the caller's workspace.
//!
//! Built fresh for every conversational turn and only ever read afterwards.
//! Entity resolution runs exclusively against this snapshot.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entity summaries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskRef>,
    #[serde(default)]
    pub services: Vec<String>,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assigned_user_ids: Vec<String>,
}

/// A task nested under its project. `title` is only unique within the project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    #[serde(default)]
    pub assignee_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalSummary {
    pub id: String,
    pub title: String,
    #[serde(default, rename = "type")]
    pub goal_type: Option<String>,
    /// Completion count.
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub target: Option<u32>,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRef {
    /// Build a user reference from profile fields.
    ///
    /// `display_name` is `trim(first + " " + last)`, falling back to the
    /// email when both names are blank.
    pub fn from_profile(
        id: impl Into<String>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> Self {
        let full = format!(
            "{} {}",
            first_name.unwrap_or_default(),
            last_name.unwrap_or_default()
        );
        let full = full.trim();
        let display_name = if full.is_empty() {
            email.unwrap_or_default().to_owned()
        } else {
            full.to_owned()
        };
        Self {
            id: id.into(),
            display_name,
            email: email.map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Entity collections fetched for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Projects,
    Users,
    Goals,
    Tags,
    Articles,
    Folders,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Projects,
        Collection::Users,
        Collection::Goals,
        Collection::Tags,
        Collection::Articles,
        Collection::Folders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Users => "users",
            Collection::Goals => "goals",
            Collection::Tags => "tags",
            Collection::Articles => "articles",
            Collection::Folders => "folders",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceContext {
    pub projects: Vec<ProjectSummary>,
    pub users: Vec<UserRef>,
    pub goals: Vec<GoalSummary>,
    pub tags: Vec<TagRef>,
    pub articles: Vec<ArticleSummary>,
    pub folders: Vec<FolderRef>,
    pub available_services: Vec<String>,
    pub available_icons: Vec<String>,
    /// Collections whose query failed and were replaced by an empty list.
    #[serde(default)]
    pub degraded: Vec<Collection>,
}

impl WorkspaceContext {
    pub fn user_name(&self, user_id: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.display_name.as_str())
    }

    pub fn folder_name(&self, folder_id: &str) -> Option<&str> {
        self.folders
            .iter()
            .find(|f| f.id == folder_id)
            .map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_first_and_last() {
        let u = UserRef::from_profile("u1", Some("Ada"), Some("Lovelace"), Some("ada@x.io"));
        assert_eq!(u.display_name, "Ada Lovelace");
    }

    #[test]
    fn display_name_trims_missing_last_name() {
        let u = UserRef::from_profile("u1", Some("Ada"), None, None);
        assert_eq!(u.display_name, "Ada");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let u = UserRef::from_profile("u1", Some("  "), None, Some("ops@studio.io"));
        assert_eq!(u.display_name, "ops@studio.io");
    }

    #[test]
    fn goal_type_serializes_as_type() {
        let g = GoalSummary {
            id: "g1".into(),
            title: "Run 5k".into(),
            goal_type: Some("habit".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(v["type"], "habit");
    }
}
