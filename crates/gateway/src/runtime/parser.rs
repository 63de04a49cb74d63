//! Action Parser: pull one action object out of a completion.
//!
//! Completions come in three shapes: a fenced ```json block, a bare object
//! embedded in prose, or plain text. Fenced blocks are tried first, then
//! bare objects. Anything that fails to decode into a known action is "no
//! action" and the completion is shown to the user as-is.

use pp_domain::action::{ActionKind, ActionPayload};
use pp_domain::error::{Error, Result};
use pp_domain::trace::TraceEvent;
use regex::Regex;
use serde_json::Value;

/// Why a completion produced no action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoAction {
    /// No JSON-looking text at all.
    NoJson,
    /// A candidate was found but is not valid JSON.
    InvalidJson,
    /// Valid JSON without a string `action` field.
    NotAnAction,
    /// `action` names no known kind.
    UnknownAction(String),
    /// Known kind, but the fields do not fit its schema.
    SchemaMismatch { kind: ActionKind, detail: String },
}

impl NoAction {
    fn label(&self) -> String {
        match self {
            NoAction::NoJson => "no_json".into(),
            NoAction::InvalidJson => "invalid_json".into(),
            NoAction::NotAnAction => "not_an_action".into(),
            NoAction::UnknownAction(tag) => format!("unknown_action:{tag}"),
            NoAction::SchemaMismatch { kind, detail } => format!("schema_mismatch:{kind}:{detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Action(ActionPayload),
    NoAction(NoAction),
}

impl ParseOutcome {
    pub fn into_action(self) -> Option<ActionPayload> {
        match self {
            ParseOutcome::Action(a) => Some(a),
            ParseOutcome::NoAction(_) => None,
        }
    }
}

/// Holds the compiled fence pattern; built once at startup.
pub struct ActionParser {
    fence: Regex,
}

impl ActionParser {
    pub fn new() -> Result<Self> {
        let fence = Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```")
            .map_err(|e| Error::Other(format!("compiling fence pattern: {e}")))?;
        Ok(Self { fence })
    }

    pub fn parse_action(&self, completion: &str) -> Option<ActionPayload> {
        self.parse(completion).into_action()
    }

    /// Parse with the reason kept, and record the outcome as a trace event.
    pub fn parse(&self, completion: &str) -> ParseOutcome {
        let outcome = self.parse_inner(completion);
        match &outcome {
            ParseOutcome::Action(a) => TraceEvent::ActionParsed {
                action: Some(a.kind().to_string()),
                reason: "ok".into(),
            },
            ParseOutcome::NoAction(reason) => TraceEvent::ActionParsed {
                action: None,
                reason: reason.label(),
            },
        }
        .emit();
        outcome
    }

    fn parse_inner(&self, completion: &str) -> ParseOutcome {
        let mut candidates: Vec<&str> = self
            .fence
            .captures_iter(completion)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| s.starts_with('{'))
            .collect();
        candidates.extend(bare_objects(completion));

        if candidates.is_empty() {
            return ParseOutcome::NoAction(NoAction::NoJson);
        }

        // The first candidate that decodes wins; otherwise report the most
        // informative failure.
        let mut best = NoAction::InvalidJson;
        for candidate in candidates {
            match decode(candidate) {
                Ok(action) => return ParseOutcome::Action(action),
                Err(reason) => {
                    if rank(&reason) > rank(&best) {
                        best = reason;
                    }
                }
            }
        }
        ParseOutcome::NoAction(best)
    }
}

fn rank(reason: &NoAction) -> u8 {
    match reason {
        NoAction::NoJson => 0,
        NoAction::InvalidJson => 1,
        NoAction::NotAnAction => 2,
        NoAction::UnknownAction(_) => 3,
        NoAction::SchemaMismatch { .. } => 4,
    }
}

fn decode(candidate: &str) -> std::result::Result<ActionPayload, NoAction> {
    let mut value: Value = serde_json::from_str(candidate).map_err(|_| NoAction::InvalidJson)?;
    let tag = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or(NoAction::NotAnAction)?;
    let normalized = tag.trim().to_ascii_uppercase().replace([' ', '-'], "_");
    let kind = ActionKind::from_tag(&normalized).ok_or_else(|| NoAction::UnknownAction(tag.to_string()))?;
    value["action"] = Value::String(kind.tag().to_string());
    serde_json::from_value(value).map_err(|e| NoAction::SchemaMismatch {
        kind,
        detail: e.to_string(),
    })
}

/// Top-level `{...}` spans in `text`, found by brace matching that skips
/// over JSON string literals.
fn bare_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    out.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ActionParser {
        ActionParser::new().unwrap()
    }

    #[test]
    fn fenced_block_is_extracted() {
        let text = "Sure thing!\n```json\n{\"action\": \"DELETE_PROJECT\", \"project_name\": \"Old Website Backup\"}\n```\nDone.";
        let action = parser().parse_action(text).unwrap();
        assert_eq!(
            action,
            ActionPayload::DeleteProject {
                project_name: "Old Website Backup".into()
            }
        );
    }

    #[test]
    fn bare_object_in_prose_is_extracted() {
        let text = r#"Creating it now: {"action": "CREATE_FOLDER", "folder_name": "Policies {2026}"} ok"#;
        match parser().parse_action(text).unwrap() {
            ActionPayload::CreateFolder { folder_name, .. } => assert_eq!(folder_name, "Policies {2026}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_no_action() {
        let p = parser();
        let text = "You have 3 projects in Planning.";
        assert_eq!(p.parse(text), ParseOutcome::NoAction(NoAction::NoJson));
    }

    #[test]
    fn malformed_json_degrades_to_no_action() {
        let text = "```json\n{\"action\": \"DELETE_PROJECT\", \"project_name\": }\n```";
        assert_eq!(parser().parse(text), ParseOutcome::NoAction(NoAction::InvalidJson));
    }

    #[test]
    fn unknown_action_is_no_action() {
        let text = r#"{"action": "LAUNCH_ROCKET", "target": "moon"}"#;
        assert_eq!(
            parser().parse(text),
            ParseOutcome::NoAction(NoAction::UnknownAction("LAUNCH_ROCKET".into()))
        );
    }

    #[test]
    fn schema_mismatch_is_no_action() {
        let text = r#"{"action": "DELETE_PROJECT"}"#;
        assert!(matches!(
            parser().parse(text),
            ParseOutcome::NoAction(NoAction::SchemaMismatch { kind: ActionKind::DeleteProject, .. })
        ));
    }

    #[test]
    fn lowercase_tag_is_normalized() {
        let text = r#"{"action": "delete_article", "article_title": "Old Memo"}"#;
        assert_eq!(
            parser().parse_action(text),
            Some(ActionPayload::DeleteArticle {
                article_title: "Old Memo".into()
            })
        );
    }

    #[test]
    fn fenced_block_without_language_tag() {
        let text = "```\n{\"action\": \"CREATE_GOAL\", \"goal_details\": {\"title\": \"Run 5k\"}}\n```";
        assert!(matches!(
            parser().parse_action(text),
            Some(ActionPayload::CreateGoal { .. })
        ));
    }

    #[test]
    fn parsing_is_deterministic() {
        let p = parser();
        let text = r#"{"action": "ASSIGN_TASK", "project_name": "Gala", "task_title": "Band", "assignees": ["Ann"]}"#;
        assert_eq!(p.parse(text), p.parse(text));
    }
}
