//! Action executor.
//!
//! Turns a [`ResolvedAction`] into store mutations and a human-readable
//! outcome. The primary write of each action decides success; follow-up
//! steps (services, members, tags, assignees) run sequentially afterwards
//! and their failures are folded into the message as qualifying clauses.
//! Nothing is rolled back and no error escapes as `Err`.

use std::time::Instant;

use pp_domain::action::SearchType;
use pp_domain::error::Error;
use pp_domain::trace::TraceEvent;
use pp_workspace::{ArticleRecord, GoalRecord, ProjectRecord, TaskRecord, WorkspaceStore};

use super::resolver::{quoted_list, ResolutionError, ResolvedAction, ResolvedUsers};
use crate::skills::{format_place_markdown, ImageSearch, PlaceLookup};

/// The external collaborators an action may need besides the store.
pub struct Executor<'a> {
    pub store: &'a dyn WorkspaceStore,
    pub images: &'a dyn ImageSearch,
    pub places: &'a dyn PlaceLookup,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome aggregation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A primary success plus whatever went wrong afterwards.
#[derive(Debug, Default)]
struct Outcome {
    /// Sentence without the final period, e.g. `I created the project "X"`.
    done: String,
    /// Failed follow-up steps, e.g. `add the services: timeout`.
    problems: Vec<String>,
    /// Extra sentences (unresolved names, missing header image).
    notes: Vec<String>,
}

impl Outcome {
    fn new(done: impl Into<String>) -> Self {
        Self {
            done: done.into(),
            ..Default::default()
        }
    }

    fn problem(&mut self, step: impl Into<String>, err: &Error) {
        self.problems.push(format!("{}: {}", step.into(), reason(err)));
    }

    fn unresolved(&mut self, users: &ResolvedUsers) {
        self.notes
            .extend(users.unresolved.iter().map(ResolutionError::message));
    }

    fn render(&self) -> String {
        let mut out = self.done.clone();
        if !self.problems.is_empty() {
            out.push_str(", but I couldn't ");
            out.push_str(&self.problems.join("; and I couldn't "));
        }
        out.push('.');
        for note in &self.notes {
            out.push(' ');
            out.push_str(note);
        }
        out
    }
}

enum Report {
    Done(Outcome),
    /// The primary write failed; nothing was changed.
    Failed { what: String, err: Error },
    /// A plain answer with no write attempted.
    Say(String),
}

impl Report {
    fn failed(what: impl Into<String>, err: Error) -> Self {
        Report::Failed {
            what: what.into(),
            err,
        }
    }

    fn failed_steps(&self) -> usize {
        match self {
            Report::Done(o) => o.problems.len(),
            Report::Failed { .. } => 1,
            Report::Say(_) => 0,
        }
    }

    fn render(&self) -> String {
        match self {
            Report::Done(o) => o.render(),
            Report::Failed { what, err } => {
                format!("I failed to {what}. The database said: {}", reason(err))
            }
            Report::Say(s) => s.clone(),
        }
    }
}

/// The human-readable part of a store error.
fn reason(err: &Error) -> String {
    match err {
        Error::Store(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// `current ∪ add − remove`, case-insensitive, keeping first-seen order.
fn merge_set(current: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in current.iter().chain(add) {
        let removed = remove.iter().any(|r| r.eq_ignore_ascii_case(item));
        let seen = out.iter().any(|o| o.eq_ignore_ascii_case(item));
        if !removed && !seen {
            out.push(item.clone());
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Executor<'_> {
    /// Run `action` and describe what happened.
    pub async fn execute(&self, action: ResolvedAction) -> String {
        let started = Instant::now();
        let kind = kind_of(&action);
        let report = match action {
            ResolvedAction::CreateProject { details, members } => {
                self.create_project(details, members).await
            }
            ResolvedAction::UpdateProject {
                project,
                updates,
                add_members,
                remove_members,
            } => {
                self.update_project(project, updates, add_members, remove_members)
                    .await
            }
            ResolvedAction::DeleteProject { project } => {
                match self.store.delete_project(&project.id).await {
                    Ok(()) => Report::Done(Outcome::new(format!(
                        "I deleted the project \"{}\"",
                        project.name
                    ))),
                    Err(e) => Report::failed(format!("delete the project \"{}\"", project.name), e),
                }
            }
            ResolvedAction::CreateTask {
                project,
                title,
                description,
                due_date,
                assignees,
            } => {
                self.create_task(project, title, description, due_date, assignees)
                    .await
            }
            ResolvedAction::AssignTask {
                project,
                task,
                assignees,
            } => self.reassign(project, task, assignees, true).await,
            ResolvedAction::UnassignTask {
                project,
                task,
                assignees,
            } => self.reassign(project, task, assignees, false).await,
            ResolvedAction::CreateGoal { details } => self.create_goal(details).await,
            ResolvedAction::UpdateGoal { goal, updates } => self.update_goal(goal, updates).await,
            ResolvedAction::CreateArticle { details, folder } => {
                self.create_article(details, folder).await
            }
            ResolvedAction::UpdateArticle {
                article,
                updates,
                folder,
            } => self.update_article(article, updates, folder).await,
            ResolvedAction::DeleteArticle { article } => {
                match self.store.delete_article(&article.id).await {
                    Ok(()) => Report::Done(Outcome::new(format!(
                        "I deleted the article \"{}\"",
                        article.title
                    ))),
                    Err(e) => Report::failed(format!("delete the article \"{}\"", article.title), e),
                }
            }
            ResolvedAction::CreateFolder { name, .. } if name.is_empty() => {
                Report::Say("What should the new folder be called?".into())
            }
            ResolvedAction::CreateFolder { name, parent } => {
                match self
                    .store
                    .insert_folder(&name, parent.as_ref().map(|p| p.id.as_str()))
                    .await
                {
                    Ok(_) => Report::Done(Outcome::new(match &parent {
                        Some(p) => format!("I created the folder \"{name}\" inside \"{}\"", p.name),
                        None => format!("I created the folder \"{name}\""),
                    })),
                    Err(e) => Report::failed(format!("create the folder \"{name}\""), e),
                }
            }
            ResolvedAction::SearchExternal { query, search_type } => {
                self.search_external(query, search_type).await
            }
        };

        TraceEvent::ActionExecuted {
            action: kind.to_string(),
            failed_steps: report.failed_steps(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        report.render()
    }

    // ── projects ─────────────────────────────────────────────────────

    async fn create_project(
        &self,
        details: pp_domain::action::ProjectDetails,
        members: ResolvedUsers,
    ) -> Report {
        let name = details.name.trim().to_string();
        if name.is_empty() {
            return Report::Say("What should the new project be called?".into());
        }
        let record = ProjectRecord {
            name: name.clone(),
            description: non_blank(&details.description),
            status: non_blank(&details.status),
            start_date: non_blank(&details.start_date),
            end_date: non_blank(&details.end_date),
            budget: details.budget,
            venue: non_blank(&details.venue),
            icon: non_blank(&details.icon),
        };
        let id = match self.store.insert_project(&record).await {
            Ok(id) => id,
            Err(e) => return Report::failed(format!("create the project \"{name}\""), e),
        };

        let mut extras = Vec::new();
        let mut outcome = Outcome::default();

        let services = merge_set(&[], &details.services, &[]);
        if !services.is_empty() {
            match self.store.set_project_services(&id, &services).await {
                Ok(()) => extras.push(format!("services: {}", services.join(", "))),
                Err(e) => outcome.problem("add the services", &e),
            }
        }
        if !members.ids.is_empty() {
            match self.store.set_project_members(&id, &members.ids).await {
                Ok(()) => extras.push(format!("members: {}", members.names.join(", "))),
                Err(e) => outcome.problem("add the members", &e),
            }
        }
        let tags = merge_set(&[], &details.tags, &[]);
        if !tags.is_empty() {
            match self.store.set_project_tags(&id, &tags).await {
                Ok(()) => extras.push(format!("tags: {}", tags.join(", "))),
                Err(e) => outcome.problem("add the tags", &e),
            }
        }
        outcome.unresolved(&members);

        outcome.done = format!("I created the project \"{name}\"");
        if !extras.is_empty() {
            outcome.done.push_str(&format!(" ({})", extras.join("; ")));
        }
        Report::Done(outcome)
    }

    async fn update_project(
        &self,
        project: pp_domain::workspace::ProjectSummary,
        updates: pp_domain::action::ProjectUpdates,
        add_members: ResolvedUsers,
        remove_members: ResolvedUsers,
    ) -> Report {
        if updates.is_empty() {
            return Report::Say(format!(
                "There was nothing to change on the project \"{}\".",
                project.name
            ));
        }

        // Merge against the current row, not the turn's snapshot.
        let fresh = match self.store.project(&project.id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                return Report::Say(format!(
                    "The project \"{}\" no longer exists, so I didn't change anything.",
                    project.name
                ))
            }
            Err(e) => return Report::failed(format!("update the project \"{}\"", project.name), e),
        };

        let current = ProjectRecord::from_summary(&fresh);
        let mut record = current.clone();
        let mut changed: Vec<&str> = Vec::new();
        if let Some(v) = non_blank(&updates.name) {
            record.name = v;
        }
        if updates.description.is_some() {
            record.description = non_blank(&updates.description);
        }
        if let Some(v) = non_blank(&updates.status) {
            record.status = Some(v);
        }
        if let Some(v) = non_blank(&updates.start_date) {
            record.start_date = Some(v);
        }
        if let Some(v) = non_blank(&updates.end_date) {
            record.end_date = Some(v);
        }
        if updates.budget.is_some() {
            record.budget = updates.budget;
        }
        if let Some(v) = non_blank(&updates.venue) {
            record.venue = Some(v);
        }
        for (field, differs) in [
            ("name", record.name != current.name),
            ("description", record.description != current.description),
            ("status", record.status != current.status),
            ("start date", record.start_date != current.start_date),
            ("end date", record.end_date != current.end_date),
            ("budget", record.budget != current.budget),
            ("venue", record.venue != current.venue),
        ] {
            if differs {
                changed.push(field);
            }
        }

        if !changed.is_empty() {
            if let Err(e) = self.store.update_project(&fresh.id, &record).await {
                return Report::failed(format!("update the project \"{}\"", fresh.name), e);
            }
        }

        let mut outcome = Outcome::default();

        let services = merge_set(&fresh.services, &updates.add_services, &updates.remove_services);
        if services != fresh.services {
            match self.store.set_project_services(&fresh.id, &services).await {
                Ok(()) => changed.push("services"),
                Err(e) => outcome.problem("update the services", &e),
            }
        }

        let members = merge_set(&fresh.assigned_user_ids, &add_members.ids, &remove_members.ids);
        if members != fresh.assigned_user_ids {
            match self.store.set_project_members(&fresh.id, &members).await {
                Ok(()) => changed.push("members"),
                Err(e) => outcome.problem("update the members", &e),
            }
        }

        let tags = merge_set(&fresh.tags, &updates.add_tags, &updates.remove_tags);
        if tags != fresh.tags {
            match self.store.set_project_tags(&fresh.id, &tags).await {
                Ok(()) => changed.push("tags"),
                Err(e) => outcome.problem("update the tags", &e),
            }
        }

        outcome.unresolved(&add_members);
        outcome.unresolved(&remove_members);

        if changed.is_empty() && outcome.problems.is_empty() {
            let mut say = format!(
                "The project \"{}\" already looked like that, so nothing changed.",
                record.name
            );
            for note in &outcome.notes {
                say.push(' ');
                say.push_str(note);
            }
            return Report::Say(say);
        }
        outcome.done = format!("I updated the project \"{}\"", record.name);
        if !changed.is_empty() {
            outcome.done.push_str(&format!(" ({})", changed.join(", ")));
        }
        Report::Done(outcome)
    }

    // ── tasks ────────────────────────────────────────────────────────

    async fn create_task(
        &self,
        project: pp_domain::workspace::ProjectSummary,
        title: String,
        description: Option<String>,
        due_date: Option<String>,
        assignees: ResolvedUsers,
    ) -> Report {
        if title.is_empty() {
            return Report::Say(format!(
                "What should the new task in \"{}\" be called?",
                project.name
            ));
        }
        let record = TaskRecord {
            title: title.clone(),
            description: non_blank(&description),
            due_date: non_blank(&due_date),
        };
        let task_id = match self.store.insert_task(&project.id, &record).await {
            Ok(id) => id,
            Err(e) => {
                return Report::failed(
                    format!("add the task \"{title}\" to the project \"{}\"", project.name),
                    e,
                )
            }
        };

        let mut outcome = Outcome::new(format!(
            "I added the task \"{title}\" to the project \"{}\"",
            project.name
        ));
        if !assignees.ids.is_empty() {
            let who = quoted_list(&assignees.names, "and");
            match self.store.set_task_assignees(&task_id, &assignees.ids).await {
                Ok(()) => outcome.done.push_str(&format!(" and assigned it to {who}")),
                Err(e) => outcome.problem(format!("assign it to {who}"), &e),
            }
        }
        outcome.unresolved(&assignees);
        Report::Done(outcome)
    }

    async fn reassign(
        &self,
        project: pp_domain::workspace::ProjectSummary,
        task: pp_domain::workspace::TaskRef,
        users: ResolvedUsers,
        assign: bool,
    ) -> Report {
        let notes: Vec<String> = users.unresolved.iter().map(ResolutionError::message).collect();
        if users.ids.is_empty() {
            let mut say = format!("I didn't change who is assigned to \"{}\".", task.title);
            for note in notes {
                say.push(' ');
                say.push_str(&note);
            }
            return Report::Say(say);
        }

        let next = if assign {
            merge_set(&task.assignee_ids, &users.ids, &[])
        } else {
            merge_set(&task.assignee_ids, &[], &users.ids)
        };
        let who = quoted_list(&users.names, "and");
        if next == task.assignee_ids {
            let be = if users.ids.len() > 1 { "are" } else { "is" };
            let state = if assign { "already assigned to" } else { "not assigned to" };
            return Report::Say(format!("{who} {be} {state} \"{}\".", task.title));
        }

        let verb = if assign { "assign" } else { "unassign" };
        let what = if assign {
            format!("assign {who} to the task \"{}\"", task.title)
        } else {
            format!("remove {who} from the task \"{}\"", task.title)
        };
        match self.store.set_task_assignees(&task.id, &next).await {
            Ok(()) => {
                let mut outcome = Outcome::new(format!(
                    "I {verb}ed {who} {} the task \"{}\" in \"{}\"",
                    if assign { "to" } else { "from" },
                    task.title,
                    project.name
                ));
                outcome.notes = notes;
                Report::Done(outcome)
            }
            Err(e) => Report::failed(what, e),
        }
    }

    // ── goals ────────────────────────────────────────────────────────

    async fn create_goal(&self, details: pp_domain::action::GoalDetails) -> Report {
        let title = details.title.trim().to_string();
        if title.is_empty() {
            return Report::Say("What should the new goal be called?".into());
        }
        let record = GoalRecord {
            title: title.clone(),
            goal_type: non_blank(&details.goal_type),
            progress: 0,
            target: details.target,
        };
        let id = match self.store.insert_goal(&record).await {
            Ok(id) => id,
            Err(e) => return Report::failed(format!("create the goal \"{title}\""), e),
        };
        let mut outcome = Outcome::new(format!("I created the goal \"{title}\""));
        let tags = merge_set(&[], &details.tags, &[]);
        if !tags.is_empty() {
            if let Err(e) = self.store.set_goal_tags(&id, &tags).await {
                outcome.problem("add the tags", &e);
            }
        }
        Report::Done(outcome)
    }

    async fn update_goal(
        &self,
        goal: pp_domain::workspace::GoalSummary,
        updates: pp_domain::action::GoalUpdates,
    ) -> Report {
        let current = GoalRecord::from_summary(&goal);
        let mut record = current.clone();
        if let Some(v) = non_blank(&updates.title) {
            record.title = v;
        }
        if let Some(v) = non_blank(&updates.goal_type) {
            record.goal_type = Some(v);
        }
        if let Some(v) = updates.progress {
            record.progress = v;
        }
        if updates.target.is_some() {
            record.target = updates.target;
        }
        let tags = merge_set(&goal.tags, &updates.add_tags, &updates.remove_tags);

        if record == current && tags == goal.tags {
            return Report::Say(format!(
                "There was nothing to change on the goal \"{}\".",
                goal.title
            ));
        }
        if record != current {
            if let Err(e) = self.store.update_goal(&goal.id, &record).await {
                return Report::failed(format!("update the goal \"{}\"", goal.title), e);
            }
        }

        let mut outcome = Outcome::new(format!("I updated the goal \"{}\"", record.title));
        if record.progress != current.progress {
            match record.target {
                Some(target) => outcome
                    .done
                    .push_str(&format!(" (progress {}/{target})", record.progress)),
                None => outcome.done.push_str(&format!(" (progress {})", record.progress)),
            }
        }
        if tags != goal.tags {
            if let Err(e) = self.store.set_goal_tags(&goal.id, &tags).await {
                outcome.problem("update the tags", &e);
            }
        }
        Report::Done(outcome)
    }

    // ── articles ─────────────────────────────────────────────────────

    /// Look up a header image. Never fails the surrounding write.
    async fn header_image(&self, query: &Option<String>, outcome: &mut Outcome) -> Option<String> {
        let query = non_blank(query)?;
        match self.images.find_one(&query).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                outcome.notes.push(format!(
                    "I couldn't find a header image for \"{query}\", so the article has none."
                ));
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "header image search failed");
                outcome.notes.push(format!(
                    "The image search didn't work for \"{query}\", so the article has no header image."
                ));
                None
            }
        }
    }

    async fn create_article(
        &self,
        details: pp_domain::action::ArticleDetails,
        folder: Option<pp_domain::workspace::FolderRef>,
    ) -> Report {
        let title = details.title.trim().to_string();
        if title.is_empty() {
            return Report::Say("What should the new article be called?".into());
        }
        let mut outcome = Outcome::default();
        let header_image_url = self.header_image(&details.header_image_query, &mut outcome).await;
        let record = ArticleRecord {
            title: Some(title.clone()),
            content: Some(details.content.clone()),
            folder_id: folder.as_ref().map(|f| f.id.clone()),
            header_image_url: header_image_url.clone(),
        };
        let id = match self.store.insert_article(&record).await {
            Ok(id) => id,
            Err(e) => return Report::failed(format!("create the article \"{title}\""), e),
        };

        outcome.done = format!("I created the article \"{title}\"");
        if let Some(f) = &folder {
            outcome.done.push_str(&format!(" in the folder \"{}\"", f.name));
        }
        if header_image_url.is_some() {
            outcome.done.push_str(" with a header image");
        }
        let tags = merge_set(&[], &details.tags, &[]);
        if !tags.is_empty() {
            if let Err(e) = self.store.set_article_tags(&id, &tags).await {
                outcome.problem("add the tags", &e);
            }
        }
        Report::Done(outcome)
    }

    async fn update_article(
        &self,
        article: pp_domain::workspace::ArticleSummary,
        updates: pp_domain::action::ArticleUpdates,
        folder: Option<pp_domain::workspace::FolderRef>,
    ) -> Report {
        let mut outcome = Outcome::default();
        let header_image_url = self.header_image(&updates.header_image_query, &mut outcome).await;
        let record = ArticleRecord {
            title: non_blank(&updates.title),
            content: updates.content.clone().filter(|c| !c.trim().is_empty()),
            folder_id: folder.as_ref().map(|f| f.id.clone()),
            header_image_url,
        };
        if record == ArticleRecord::default() {
            let mut say = format!(
                "There was nothing to change on the article \"{}\".",
                article.title
            );
            for note in &outcome.notes {
                say.push(' ');
                say.push_str(note);
            }
            return Report::Say(say);
        }
        if let Err(e) = self.store.update_article(&article.id, &record).await {
            return Report::failed(format!("update the article \"{}\"", article.title), e);
        }
        let title = record.title.as_deref().unwrap_or(&article.title);
        outcome.done = format!("I updated the article \"{title}\"");
        if let Some(f) = &folder {
            outcome.done.push_str(&format!(" and moved it to \"{}\"", f.name));
        }
        Report::Done(outcome)
    }

    // ── enrichment ───────────────────────────────────────────────────

    async fn search_external(&self, query: String, search_type: SearchType) -> Report {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Report::Say("What should I look up?".into());
        }
        match self.places.lookup(&query).await {
            Ok(Some(place)) => {
                let mut text = format_place_markdown(&place);
                if search_type == SearchType::Website && place.website.is_none() {
                    text.push_str("\n\nI couldn't find a website for it.");
                }
                Report::Say(text)
            }
            Ok(None) => Report::Say(format!("I couldn't find anything for \"{query}\".")),
            Err(Error::Config(_)) => Report::Say(format!(
                "External search isn't set up, so I can't look up \"{query}\"."
            )),
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "place lookup failed");
                Report::Say(format!(
                    "I couldn't search for \"{query}\" right now: {}",
                    reason(&e)
                ))
            }
        }
    }
}

fn kind_of(action: &ResolvedAction) -> &'static str {
    match action {
        ResolvedAction::CreateProject { .. } => "CREATE_PROJECT",
        ResolvedAction::UpdateProject { .. } => "UPDATE_PROJECT",
        ResolvedAction::DeleteProject { .. } => "DELETE_PROJECT",
        ResolvedAction::CreateTask { .. } => "CREATE_TASK",
        ResolvedAction::AssignTask { .. } => "ASSIGN_TASK",
        ResolvedAction::UnassignTask { .. } => "UNASSIGN_TASK",
        ResolvedAction::CreateGoal { .. } => "CREATE_GOAL",
        ResolvedAction::UpdateGoal { .. } => "UPDATE_GOAL",
        ResolvedAction::CreateArticle { .. } => "CREATE_ARTICLE",
        ResolvedAction::UpdateArticle { .. } => "UPDATE_ARTICLE",
        ResolvedAction::DeleteArticle { .. } => "DELETE_ARTICLE",
        ResolvedAction::CreateFolder { .. } => "CREATE_FOLDER",
        ResolvedAction::SearchExternal { .. } => "SEARCH_EXTERNAL",
    }
}
