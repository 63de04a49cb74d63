use chrono::{DateTime, Utc};
use pp_domain::trace::TraceEvent;
use pp_domain::workspace::WorkspaceContext;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::preamble;
use crate::report::{PromptReport, SectionReport};
use crate::truncation::{self, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptStyle {
    Router,
    Chat,
}

/// Deterministic system-prompt builder.
///
/// Pure function of its inputs: the same snapshot, user and timestamp always
/// yield the same prompt.
pub struct PromptComposer {
    pub max_per_section: usize,
    pub total_max: usize,
}

impl PromptComposer {
    pub fn new(max_per_section: usize, total_max: usize) -> Self {
        Self {
            max_per_section,
            total_max,
        }
    }

    /// Render the system prompt for one routing call.
    pub fn compose(
        &self,
        ctx: &WorkspaceContext,
        user_display_name: &str,
        now: DateTime<Utc>,
    ) -> (String, PromptReport) {
        self.render(PromptStyle::Router, ctx, user_display_name, now)
    }

    /// Render the system prompt for a conversational turn: same `CONTEXT`,
    /// no action grammar.
    pub fn compose_chat(
        &self,
        ctx: &WorkspaceContext,
        user_display_name: &str,
        now: DateTime<Utc>,
    ) -> (String, PromptReport) {
        self.render(PromptStyle::Chat, ctx, user_display_name, now)
    }

    fn render(
        &self,
        style: PromptStyle,
        ctx: &WorkspaceContext,
        user_display_name: &str,
        now: DateTime<Utc>,
    ) -> (String, PromptReport) {
        let mut sections = vec![
            Section::new("summarizedProjects", to_items(&ctx.projects)),
            Section::new("summarizedUsers", to_items(&ctx.users)),
            Section::new("summarizedGoals", to_items(&ctx.goals)),
            Section::new("tags", to_items(&ctx.tags)),
            Section::new("articles", to_items(&ctx.articles)),
            Section::new("folders", to_items(&ctx.folders)),
        ];

        for section in sections.iter_mut() {
            let (kept, truncated) =
                truncation::truncate_items(std::mem::take(&mut section.items), self.max_per_section);
            section.items = kept;
            section.truncated_per_section = truncated;
        }
        truncation::apply_total_cap(&mut sections, self.total_max);

        let mut context = Map::new();
        let mut reports = Vec::with_capacity(sections.len());
        for section in sections {
            if !section.included {
                tracing::debug!(section = %section.name, raw_chars = section.raw_chars, "section dropped by total cap");
            }
            reports.push(SectionReport {
                name: section.name.clone(),
                raw_items: section.raw_items,
                injected_items: section.items.len(),
                raw_chars: section.raw_chars,
                injected_chars: section.chars(),
                truncated_per_section: section.truncated_per_section,
                truncated_total_cap: section.truncated_total_cap,
                included: section.included,
            });
            context.insert(section.name, Value::Array(section.items));
        }
        context.insert(
            "availableServices".into(),
            Value::Array(to_items(&ctx.available_services)),
        );
        context.insert(
            "availableIcons".into(),
            Value::Array(to_items(&ctx.available_icons)),
        );

        let context_json =
            serde_json::to_string_pretty(&Value::Object(context)).unwrap_or_else(|_| "{}".into());

        let mut prompt = match style {
            PromptStyle::Router => {
                let mut p = preamble::format_contract(user_display_name, now);
                p.push('\n');
                p.push_str(&preamble::format_action_grammar());
                p
            }
            PromptStyle::Chat => preamble::format_chat_preamble(user_display_name, now),
        };
        prompt.push('\n');
        prompt.push_str(&preamble::format_context_section(&context_json));

        let report = PromptReport {
            sections: reports,
            context_chars: context_json.len(),
            total_chars: prompt.len(),
        };

        TraceEvent::PromptComposed {
            total_chars: report.total_chars,
            sections_truncated: report.sections_truncated(),
            sections_excluded: report.sections_excluded(),
        }
        .emit();

        (prompt, report)
    }
}

fn to_items<T: Serialize>(items: &[T]) -> Vec<Value> {
    items
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pp_domain::workspace::{Collection, ProjectSummary, UserRef};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn project(name: &str) -> ProjectSummary {
        ProjectSummary {
            id: format!("p-{name}"),
            name: name.into(),
            status: Some("Planning".into()),
            ..Default::default()
        }
    }

    fn context_json(prompt: &str) -> Value {
        let start = prompt.find("=== CONTEXT ===\n").unwrap() + "=== CONTEXT ===\n".len();
        let end = prompt.find("\n=== END_CONTEXT ===").unwrap();
        serde_json::from_str(&prompt[start..end]).unwrap()
    }

    #[test]
    fn failed_goals_render_as_empty_list() {
        let ctx = WorkspaceContext {
            projects: vec![project("Alpha"), project("Beta"), project("Gamma")],
            degraded: vec![Collection::Goals],
            ..Default::default()
        };
        let (prompt, report) = PromptComposer::new(10_000, 50_000).compose(&ctx, "Ada", now());
        let json = context_json(&prompt);
        assert_eq!(json["summarizedGoals"], serde_json::json!([]));
        assert_eq!(json["summarizedProjects"].as_array().unwrap().len(), 3);
        assert_eq!(report.sections_excluded(), 0);
    }

    #[test]
    fn compose_is_deterministic() {
        let ctx = WorkspaceContext {
            projects: vec![project("Alpha")],
            users: vec![UserRef::from_profile("u1", Some("Ada"), None, None)],
            available_services: vec!["Catering".into()],
            ..Default::default()
        };
        let composer = PromptComposer::new(10_000, 50_000);
        let (a, _) = composer.compose(&ctx, "Ada", now());
        let (b, _) = composer.compose(&ctx, "Ada", now());
        assert_eq!(a, b);
        assert!(a.contains("CREATE_PROJECT"));
        assert!(a.contains("2026-05-04T12:00:00Z"));
        assert_eq!(context_json(&a)["availableServices"][0], "Catering");
    }

    #[test]
    fn chat_prompt_has_context_but_no_grammar() {
        let ctx = WorkspaceContext {
            projects: vec![project("Alpha")],
            ..Default::default()
        };
        let (prompt, _) = PromptComposer::new(10_000, 50_000).compose_chat(&ctx, "Ada", now());
        assert!(!prompt.contains("=== ACTIONS ==="));
        assert!(prompt.contains("Acting user: Ada"));
        assert_eq!(context_json(&prompt)["summarizedProjects"][0]["name"], "Alpha");
    }

    #[test]
    fn oversized_sections_are_cut_at_item_boundaries() {
        let ctx = WorkspaceContext {
            projects: (0..50).map(|i| project(&format!("Project {i}"))).collect(),
            ..Default::default()
        };
        let (prompt, report) = PromptComposer::new(1_000, 50_000).compose(&ctx, "Ada", now());
        let projects = &report.sections[0];
        assert!(projects.truncated_per_section);
        assert!(projects.injected_items < 50);
        assert!(projects.injected_chars <= 1_000);
        let json = context_json(&prompt);
        assert_eq!(
            json["summarizedProjects"].as_array().unwrap().len(),
            projects.injected_items
        );
    }
}
