//! Fixed prompt text: the behavioral contract and the action grammar.

use chrono::{DateTime, Utc};
use pp_domain::action::ActionKind;

/// Behavioral contract. Reproduced verbatim in every routing prompt.
const CONTRACT: &str = "\
You are an action-oriented workspace assistant. For every user message decide \
between exactly one of:
  (a) emitting exactly ONE JSON action object from the ACTIONS list below,
  (b) asking a short natural-language question (confirmation or clarification),
  (c) answering in natural language.

RULES
1. Sensitive actions (CREATE_TASK, DELETE_PROJECT, DELETE_ARTICLE) need two-phase \
confirmation. First reply with a question that restates the proposed action. Only \
after the user's NEXT message is an affirmative (\"yes\", \"ok\", \"proceed\") emit the \
action JSON, and then emit ONLY the JSON with no other text.
2. Every other action may be emitted directly. If the request could refer to more \
than one entity (for example two projects whose names both match), ask which one \
the user means and name the candidates. Never guess.
3. Resolve references such as \"this project\", \"that task\" or an answer to your \
previous question using the whole conversation, not just the latest message.
4. Attached documents arrive as extracted text appended to the user's message; \
audio arrives already transcribed; images are attached for you to look at.
5. A free-form project brief is enough to create a project: infer name, \
description, dates, budget, venue, services (from availableServices) and members \
(from summarizedUsers) from the prose.
6. When answering questions, reference concrete projects, tasks, goals, users and \
articles from CONTEXT by name. If something is not in CONTEXT, say it does not \
exist. Never invent entities.
7. Use exact names from CONTEXT in action payloads. Dates are YYYY-MM-DD. When you \
emit an action, output the JSON object only, optionally inside a ```json fence.";

/// Conversational features answer only; they never emit actions.
const CHAT_CONTRACT: &str = "\
You are a friendly workspace assistant. Answer the user's message in natural \
language, using the conversation so far and the CONTEXT below. Reference concrete \
projects, tasks, goals, users and articles by name; if something is not in CONTEXT, \
say so instead of inventing it. You cannot change anything in the workspace from \
this conversation, so never output JSON actions.";

/// Render the contract, addressed to the acting user and anchored in time.
pub fn format_contract(user_display_name: &str, now: DateTime<Utc>) -> String {
    format!("{CONTRACT}\n\n{}", format_session(user_display_name, now))
}

/// Render the conversational preamble.
pub fn format_chat_preamble(user_display_name: &str, now: DateTime<Utc>) -> String {
    format!("{CHAT_CONTRACT}\n\n{}", format_session(user_display_name, now))
}

fn format_session(user_display_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "\
=== SESSION ===
Acting user: {user_display_name}
Current time: {now} (UTC). Today is {weekday}, {date}.
=== END_SESSION ===
",
        now = now.format("%Y-%m-%dT%H:%M:%SZ"),
        weekday = now.format("%A"),
        date = now.format("%Y-%m-%d"),
    )
}

/// Render the action grammar: one description and example per kind.
pub fn format_action_grammar() -> String {
    let mut out = String::from("=== ACTIONS ===\n");
    for kind in ActionKind::ALL {
        let confirm = if kind.requires_confirmation() {
            " [confirm first]"
        } else {
            ""
        };
        out.push_str(&format!(
            "- {tag}{confirm}: {desc}\n  Example: {example}\n",
            tag = kind.tag(),
            desc = kind.description(),
            example = kind.example(),
        ));
    }
    out.push_str("=== END_ACTIONS ===\n");
    out
}

/// Wrap the serialized context JSON.
pub fn format_context_section(context_json: &str) -> String {
    format!(
        "\
=== CONTEXT ===
{context_json}
=== END_CONTEXT ===
"
    )
}
