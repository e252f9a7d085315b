mod support;

use support::{three_tasks, ScriptedStore};
use taskview::board::{columns, BoardTransitionController, DragEvent, TransitionState};
use taskview::error::Error;
use taskview::notify::{NotificationKind, NotificationLevel};
use taskview::task::{TaskCollection, TaskStatus};

fn status(collection: &TaskCollection, id: &str) -> TaskStatus {
    collection.get(id).expect("task").status
}

#[tokio::test]
async fn failed_move_rolls_back_with_one_notification() {
    let store = ScriptedStore::new(three_tasks());
    store.fail_updates_for("t-1", "connection reset");
    let mut collection = TaskCollection::new(three_tasks());
    let mut board = BoardTransitionController::new();

    let state = board
        .request_move(&mut collection, &store, "t-1", TaskStatus::Open, TaskStatus::InProgress)
        .await
        .expect("move attempted");

    assert_eq!(status(&collection, "t-1"), TaskStatus::Open);
    assert_eq!(store.update_calls(), vec![("t-1".to_string(), TaskStatus::InProgress)]);
    match &state {
        TransitionState::RolledBack {
            restored,
            notification,
            ..
        } => {
            assert_eq!(*restored, TaskStatus::Open);
            assert_eq!(notification.kind, NotificationKind::MoveFailed);
            assert_eq!(notification.level, NotificationLevel::Error);
            assert_eq!(notification.task_id.as_deref(), Some("t-1"));
            assert!(notification.message.contains("connection reset"));
        }
        other => panic!("unexpected state: {other:?}"),
    }
    assert!(board.pending("t-1").is_none());
}

#[tokio::test]
async fn no_op_move_makes_no_request() {
    let store = ScriptedStore::new(three_tasks());
    let mut collection = TaskCollection::new(three_tasks());
    let mut board = BoardTransitionController::new();

    let err = board
        .request_move(&mut collection, &store, "t-1", TaskStatus::Open, TaskStatus::Open)
        .await
        .expect_err("no-op move");
    assert!(matches!(err, Error::NoOpMove { .. }));
    assert!(err.is_validation());
    assert!(store.update_calls().is_empty());
}

#[tokio::test]
async fn confirmed_move_keeps_target_and_refreshes_record() {
    let store = ScriptedStore::new(three_tasks());
    let mut collection = TaskCollection::new(three_tasks());
    let mut board = BoardTransitionController::new();

    let state = board
        .request_move(&mut collection, &store, "t-2", TaskStatus::InProgress, TaskStatus::Resolved)
        .await
        .expect("move");
    assert!(matches!(state, TransitionState::Confirmed { .. }));
    assert_eq!(status(&collection, "t-2"), TaskStatus::Resolved);
    assert!(state.notification().is_none());

    let grouped = columns(&collection);
    let resolved: Vec<&str> = grouped[2].1.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(resolved, vec!["t-2", "t-3"]);
}

#[test]
fn latest_move_wins_over_earlier_answer() {
    let mut collection = TaskCollection::new(three_tasks());
    let mut board = BoardTransitionController::new();

    let first = board
        .begin_move(&mut collection, "t-1", TaskStatus::Open, TaskStatus::InProgress)
        .expect("first");
    let second = board
        .begin_move(&mut collection, "t-1", TaskStatus::InProgress, TaskStatus::Closed)
        .expect("second");

    let second_state = board.settle(&mut collection, second, Err(Error::Transport("rejected".to_string())));
    assert!(matches!(
        second_state,
        TransitionState::RolledBack {
            restored: TaskStatus::InProgress,
            ..
        }
    ));

    let first_state = board.settle(&mut collection, first, Ok(three_tasks()[0].clone()));
    assert!(matches!(first_state, TransitionState::Superseded { .. }));
    assert_eq!(status(&collection, "t-1"), TaskStatus::InProgress);
    assert_eq!(board.pending_count(), 0);
}

#[test]
fn authorization_failure_rolls_back_like_transport() {
    let mut collection = TaskCollection::new(three_tasks());
    let mut board = BoardTransitionController::new();
    let ticket = board
        .begin_move(&mut collection, "t-3", TaskStatus::Resolved, TaskStatus::Closed)
        .expect("begin");
    let err = Error::Authorization("session expired".to_string());
    assert!(err.is_transport());

    let state = board.settle(&mut collection, ticket, Err(err));
    assert!(state.notification().is_some());
    assert_eq!(status(&collection, "t-3"), TaskStatus::Resolved);
}

#[test]
fn drag_events_outside_columns_do_nothing() {
    let mut collection = TaskCollection::new(three_tasks());
    let mut board = BoardTransitionController::new();
    let dropped_outside = DragEvent {
        task_id: "t-1".to_string(),
        source_column: TaskStatus::Open,
        target_column: None,
    };
    assert_eq!(dropped_outside.target(), None);
    assert!(board
        .begin_drag(&mut collection, &dropped_outside)
        .expect("outside")
        .is_none());

    let real = DragEvent {
        target_column: Some(TaskStatus::Closed),
        ..dropped_outside
    };
    let ticket = board.begin_drag(&mut collection, &real).expect("drag").expect("ticket");
    assert_eq!(ticket.to, TaskStatus::Closed);
    assert_eq!(status(&collection, "t-1"), TaskStatus::Closed);
}
