//! Both stores share one state directory and survive a restart.

use chrono::Utc;
use pp_domain::action::ActionPayload;
use pp_domain::conversation::{ConversationState, ConversationTurn, Sender};
use pp_sessions::{ConversationStateStore, HistoryStore};

#[tokio::test]
async fn history_and_pending_state_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let history = HistoryStore::new(dir.path()).unwrap();
        let states = ConversationStateStore::new(dir.path()).unwrap();
        history
            .append_async(
                "u1",
                &[
                    ConversationTurn::user("delete Old Website Backup"),
                    ConversationTurn::assistant("Are you sure? Reply \"yes\" to confirm."),
                ],
            )
            .await
            .unwrap();
        states
            .set(
                "u1",
                ConversationState::AwaitingConfirmation {
                    pending_action: ActionPayload::DeleteProject {
                        project_name: "Old Website Backup".into(),
                    },
                    question: "Are you sure?".into(),
                    created_at: Utc::now(),
                },
            )
            .unwrap();
    }

    let history = HistoryStore::new(dir.path()).unwrap();
    let states = ConversationStateStore::new(dir.path()).unwrap();

    let turns = history.recent_async("u1", 20).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].sender, Sender::User);
    assert_eq!(turns[1].sender, Sender::Assistant);

    assert_eq!(states.pending_count(), 1);
    match states.get("u1") {
        ConversationState::AwaitingConfirmation { pending_action, .. } => assert_eq!(
            pending_action,
            ActionPayload::DeleteProject {
                project_name: "Old Website Backup".into()
            }
        ),
        other => panic!("expected a pending action, got {other:?}"),
    }
    assert!(states.get("u2").is_idle());
}
