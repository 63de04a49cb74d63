//! Two-phase confirmation.
//!
//! Per user: `Idle -> AwaitingConfirmation{pending_action} -> Idle`. A
//! sensitive action is parked with a deterministic question; the next turn
//! either confirms it (executed without another model call) or is treated
//! as a brand-new request.

use chrono::{DateTime, Utc};
use pp_domain::action::ActionPayload;
use pp_domain::conversation::{ConversationState, ConversationTurn, Sender};
use pp_domain::error::Result;
use pp_domain::trace::TraceEvent;
use pp_sessions::ConversationStateStore;

use super::resolver::quoted_list;

const AFFIRMATIVE_PHRASES: &[&str] = &[
    "yes", "y", "yeah", "yep", "yup", "ya", "sure", "ok", "okay", "k", "proceed", "confirm",
    "confirmed", "correct", "absolutely", "definitely", "affirmative", "approved", "go ahead",
    "do it", "go for it", "please do", "sounds good", "of course", "that's right", "thats right",
    "right", "si", "oui", "ja",
];

const NEGATIONS: &[&str] = &[
    "no", "not", "don't", "dont", "cancel", "stop", "wait", "never", "nope", "hold",
];

/// Whether `text` reads as a plain affirmative reply.
///
/// The message must open with an affirmative phrase and contain no
/// negation. "Yes, delete it" counts; "yes but not now" does not.
pub fn is_affirmative(text: &str) -> bool {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' || c.is_whitespace() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.is_empty() || words.len() > 12 {
        return false;
    }
    if words.iter().any(|w| NEGATIONS.contains(w)) {
        return false;
    }
    AFFIRMATIVE_PHRASES.iter().any(|phrase| {
        let phrase_words: Vec<&str> = phrase.split_whitespace().collect();
        words.len() >= phrase_words.len() && words[..phrase_words.len()] == phrase_words[..]
    })
}

/// The question asked before a sensitive action runs.
pub fn question_for(action: &ActionPayload) -> String {
    match action {
        ActionPayload::DeleteProject { project_name } => format!(
            "Are you sure you want to permanently delete the project \"{project_name}\"? \
             This cannot be undone. Reply \"yes\" to confirm."
        ),
        ActionPayload::DeleteArticle { article_title } => format!(
            "Are you sure you want to permanently delete the article \"{article_title}\"? \
             This cannot be undone. Reply \"yes\" to confirm."
        ),
        ActionPayload::CreateTask {
            project_name,
            task_title,
            due_date,
            assignees,
            ..
        } => {
            let mut q = format!("Should I add the task \"{task_title}\" to the project \"{project_name}\"");
            if !assignees.is_empty() {
                q.push_str(&format!(", assigned to {}", quoted_list(assignees, "and")));
            }
            if let Some(due) = due_date.as_deref().filter(|d| !d.trim().is_empty()) {
                q.push_str(&format!(", due {due}"));
            }
            q.push_str("? Reply \"yes\" to confirm.");
            q
        }
        other => format!(
            "Should I go ahead with {}? Reply \"yes\" to confirm.",
            other.kind()
        ),
    }
}

/// The entity a sensitive action targets, as named in the payload.
fn target_name(action: &ActionPayload) -> Option<&str> {
    match action {
        ActionPayload::DeleteProject { project_name } => Some(project_name.as_str()),
        ActionPayload::DeleteArticle { article_title } => Some(article_title.as_str()),
        ActionPayload::CreateTask { task_title, .. } => Some(task_title.as_str()),
        _ => None,
    }
}

/// Whether the previous assistant turn asked the user about `action`.
///
/// Used when the model ran its own confirmation round in prose and then
/// emitted a sensitive action after the user's affirmative reply. The
/// question must end in `?` and name the action's target.
pub fn model_asked_for_confirmation(history: &[ConversationTurn], action: &ActionPayload) -> bool {
    let Some(target) = target_name(action).map(|t| t.trim().to_lowercase()) else {
        return false;
    };
    if target.is_empty() {
        return false;
    }
    history
        .last()
        .map(|t| {
            t.sender == Sender::Assistant
                && t.content.trim_end().ends_with('?')
                && t.content.to_lowercase().contains(&target)
        })
        .unwrap_or(false)
}

/// What to do with a user's parked action given their new message.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingDecision {
    /// Nothing was pending.
    Idle,
    /// The user confirmed; run the parked action.
    Confirmed(ActionPayload),
    /// The parked action was dropped; process the message as a new request.
    Discarded,
}

/// Settle any parked action for `user_id` against the incoming `text`.
/// The user is always back to `Idle` afterwards, and a parked action is
/// handed out at most once.
pub fn settle_pending(
    states: &ConversationStateStore,
    user_id: &str,
    text: &str,
    now: DateTime<Utc>,
    ttl_secs: u64,
) -> Result<PendingDecision> {
    let state = states.take(user_id)?;
    let ConversationState::AwaitingConfirmation { pending_action, .. } = &state else {
        return Ok(PendingDecision::Idle);
    };
    let action = pending_action.kind().to_string();

    let (decision, reason) = if state.is_expired(now, ttl_secs) {
        (PendingDecision::Discarded, "expired")
    } else if is_affirmative(text) {
        (PendingDecision::Confirmed(pending_action.clone()), "affirmative")
    } else {
        (PendingDecision::Discarded, "new_request")
    };

    TraceEvent::ConfirmationResolved {
        user_id: user_id.to_string(),
        action,
        confirmed: matches!(decision, PendingDecision::Confirmed(_)),
        reason: reason.to_string(),
    }
    .emit();
    Ok(decision)
}

/// Park `action` for `user_id` and return the question to show.
pub fn hold(
    states: &ConversationStateStore,
    user_id: &str,
    action: ActionPayload,
    now: DateTime<Utc>,
) -> Result<String> {
    let question = question_for(&action);
    TraceEvent::ConfirmationPending {
        user_id: user_id.to_string(),
        action: action.kind().to_string(),
    }
    .emit();
    states.set(
        user_id,
        ConversationState::AwaitingConfirmation {
            pending_action: action,
            question: question.clone(),
            created_at: now,
        },
    )?;
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn delete() -> ActionPayload {
        ActionPayload::DeleteProject {
            project_name: "Old Website Backup".into(),
        }
    }

    #[test]
    fn affirmatives_are_recognized() {
        for text in ["yes", "Yes!", "ok", "OK, go ahead", "yes, delete it", "Go ahead please", "sure thing", "Do it."] {
            assert!(is_affirmative(text), "{text:?} should be affirmative");
        }
    }

    #[test]
    fn non_affirmatives_are_rejected() {
        for text in ["no", "yes but not now", "wait", "", "what about Summer Gala?", "delete Marketing Q3 instead", "don't"] {
            assert!(!is_affirmative(text), "{text:?} should not be affirmative");
        }
    }

    #[test]
    fn question_is_prose_not_json() {
        let q = question_for(&delete());
        assert!(q.contains("Old Website Backup"));
        assert!(!q.trim_start().starts_with('{'));
    }

    #[test]
    fn task_question_names_assignees_and_due_date() {
        let q = question_for(&ActionPayload::CreateTask {
            project_name: "Summer Gala".into(),
            task_title: "Book the band".into(),
            description: None,
            due_date: Some("2026-06-01".into()),
            assignees: vec!["Jane Doe".into(), "John Smith".into()],
        });
        assert_eq!(
            q,
            "Should I add the task \"Book the band\" to the project \"Summer Gala\", assigned to \
             \"Jane Doe\" and \"John Smith\", due 2026-06-01? Reply \"yes\" to confirm."
        );
    }

    #[test]
    fn hold_then_affirm_confirms_once() {
        let dir = tempfile::tempdir().unwrap();
        let states = ConversationStateStore::new(dir.path()).unwrap();
        let now = Utc::now();

        hold(&states, "u1", delete(), now).unwrap();
        assert_eq!(
            settle_pending(&states, "u1", "yes", now, 1800).unwrap(),
            PendingDecision::Confirmed(delete())
        );
        assert_eq!(
            settle_pending(&states, "u1", "yes", now, 1800).unwrap(),
            PendingDecision::Idle
        );
    }

    #[test]
    fn concurrent_yes_replies_confirm_once() {
        let dir = tempfile::tempdir().unwrap();
        let states = std::sync::Arc::new(ConversationStateStore::new(dir.path()).unwrap());
        let now = Utc::now();

        for _ in 0..20 {
            hold(&states, "u1", delete(), now).unwrap();
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let states = states.clone();
                    std::thread::spawn(move || settle_pending(&states, "u1", "yes", now, 1800).unwrap())
                })
                .collect();
            let confirmed = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|d| matches!(d, PendingDecision::Confirmed(_)))
                .count();
            assert_eq!(confirmed, 1);
        }
    }

    #[test]
    fn other_message_discards_pending() {
        let dir = tempfile::tempdir().unwrap();
        let states = ConversationStateStore::new(dir.path()).unwrap();
        let now = Utc::now();

        hold(&states, "u1", delete(), now).unwrap();
        assert_eq!(
            settle_pending(&states, "u1", "actually, list my goals", now, 1800).unwrap(),
            PendingDecision::Discarded
        );
        assert!(states.get("u1").is_idle());
    }

    #[test]
    fn expired_pending_is_discarded_even_if_affirmed() {
        let dir = tempfile::tempdir().unwrap();
        let states = ConversationStateStore::new(dir.path()).unwrap();
        let then = Utc::now() - Duration::hours(2);

        hold(&states, "u1", delete(), then).unwrap();
        assert_eq!(
            settle_pending(&states, "u1", "yes", Utc::now(), 1800).unwrap(),
            PendingDecision::Discarded
        );
    }

    #[test]
    fn model_question_is_detected_from_history() {
        let history = vec![
            ConversationTurn::user("delete the old backup project"),
            ConversationTurn::assistant("Do you want me to delete \"Old Website Backup\"?"),
        ];
        assert!(model_asked_for_confirmation(&history, &delete()));
        assert!(!model_asked_for_confirmation(&history[..1], &delete()));
    }

    #[test]
    fn unrelated_question_does_not_count_as_confirmation() {
        let history = vec![
            ConversationTurn::user("how many projects do I have?"),
            ConversationTurn::assistant("You have 4 projects. Anything else I can help with?"),
        ];
        assert!(!model_asked_for_confirmation(&history, &delete()));
    }
}
