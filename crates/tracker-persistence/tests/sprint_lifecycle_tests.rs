use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::{tempdir, TempDir};
use tracker_core::ErrorKind;
use tracker_domain::*;
use tracker_persistence::SqliteStore;

const OWNER: &str = "owner@example.com";

fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("tracker.db"));
    (dir, store)
}

fn sprint(name: &str, auto_start: bool) -> NewSprint {
    let start = Utc::now();
    NewSprint {
        name: name.to_string(),
        goal: None,
        start_date: start,
        end_date: start + Duration::days(14),
        auto_start,
    }
}

async fn board_with_backlog(store: &SqliteStore) -> (Board, Backlog) {
    let board = store
        .create_board(OWNER, NewBoard::new("Sensors", "SENS"))
        .await
        .unwrap();
    let backlog = store.get_backlog(OWNER, board.id).await.unwrap();
    (board, backlog)
}

async fn ticket_in(store: &SqliteStore, board: &Board, sprint_id: SprintId, title: &str) -> Ticket {
    store
        .create_ticket(
            OWNER,
            board.id,
            NewTicket {
                sprint_id: Some(sprint_id),
                ..NewTicket::titled(title)
            },
        )
        .await
        .unwrap()
}

async fn mark_done(store: &SqliteStore, ticket: &Ticket) {
    store
        .update_ticket(
            OWNER,
            ticket.id,
            TicketUpdate {
                status: Some(TicketStatus::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_auto_start_closes_previous_and_migrates_unfinished() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;

    let first = store
        .create_sprint(OWNER, board.id, sprint("Sprint 1", true))
        .await
        .unwrap();
    assert_eq!(first.sprint.number, 1);
    assert_eq!(first.sprint.status, SprintStatus::Active);
    assert!(first.closed_sprint.is_none());

    let open = ticket_in(&store, &board, first.sprint.id, "Open").await;
    let review = ticket_in(&store, &board, first.sprint.id, "Review").await;
    let done = ticket_in(&store, &board, first.sprint.id, "Done").await;
    mark_done(&store, &done).await;

    let second = store
        .create_sprint(OWNER, board.id, sprint("Sprint 2", true))
        .await
        .unwrap();
    assert_eq!(second.sprint.number, 2);
    assert_eq!(second.sprint.status, SprintStatus::Active);
    assert_eq!(second.moved_ticket_count, 2);
    let closed = second.closed_sprint.unwrap();
    assert_eq!(closed.id, first.sprint.id);
    assert_eq!(closed.status, SprintStatus::Completed);

    let reloaded = store.get_sprint(OWNER, first.sprint.id).await.unwrap();
    assert_eq!(reloaded.status, SprintStatus::Completed);

    let moved: Vec<_> = store
        .get_sprint_tickets(OWNER, second.sprint.id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert!(moved.contains(&open.id));
    assert!(moved.contains(&review.id));
    assert!(!moved.contains(&done.id));

    let stayed = store.get_sprint_tickets(OWNER, first.sprint.id).await.unwrap();
    assert_eq!(stayed.len(), 1);
    assert_eq!(stayed[0].id, done.id);

    let current = store.get_current_sprint(OWNER, board.id).await.unwrap();
    assert_eq!(current.map(|s| s.id), Some(second.sprint.id));
}

#[tokio::test]
async fn test_planned_sprint_does_not_close_active() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;

    let active = store
        .create_sprint(OWNER, board.id, sprint("Now", true))
        .await
        .unwrap();
    let planned = store
        .create_sprint(OWNER, board.id, sprint("Later", false))
        .await
        .unwrap();
    assert_eq!(planned.sprint.status, SprintStatus::Planned);
    assert!(planned.closed_sprint.is_none());

    let still_active = store.get_sprint(OWNER, active.sprint.id).await.unwrap();
    assert_eq!(still_active.status, SprintStatus::Active);
}

#[tokio::test]
async fn test_start_requires_planned_and_no_active_sprint() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;

    let active = store
        .create_sprint(OWNER, board.id, sprint("Now", true))
        .await
        .unwrap();
    let planned = store
        .create_sprint(OWNER, board.id, sprint("Later", false))
        .await
        .unwrap();

    let err = store.start_sprint(OWNER, planned.sprint.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = store.start_sprint(OWNER, active.sprint.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    store
        .complete_sprint(OWNER, active.sprint.id, CompletionPolicy::Keep)
        .await
        .unwrap();
    let started = store.start_sprint(OWNER, planned.sprint.id).await.unwrap();
    assert_eq!(started.status, SprintStatus::Active);
    // Planned dates are kept on start
    assert_eq!(started.start_date, planned.sprint.start_date);
}

#[tokio::test]
async fn test_complete_is_only_valid_from_active() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;

    let planned = store
        .create_sprint(OWNER, board.id, sprint("Later", false))
        .await
        .unwrap();
    let err = store
        .complete_sprint(OWNER, planned.sprint.id, CompletionPolicy::Keep)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    store.start_sprint(OWNER, planned.sprint.id).await.unwrap();
    store
        .complete_sprint(OWNER, planned.sprint.id, CompletionPolicy::Keep)
        .await
        .unwrap();
    let err = store
        .complete_sprint(OWNER, planned.sprint.id, CompletionPolicy::Keep)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_complete_to_backlog_moves_unfinished_only() {
    let (_dir, store) = open_store();
    let (board, backlog) = board_with_backlog(&store).await;
    let active = store
        .create_sprint(OWNER, board.id, sprint("Now", true))
        .await
        .unwrap()
        .sprint;

    let open = ticket_in(&store, &board, active.id, "Open").await;
    let done = ticket_in(&store, &board, active.id, "Done").await;
    mark_done(&store, &done).await;

    let transition = store
        .complete_sprint(OWNER, active.id, CompletionPolicy::Backlog)
        .await
        .unwrap();
    assert_eq!(transition.sprint.status, SprintStatus::Completed);
    assert_eq!(transition.moved_ticket_count, 1);

    let open = store.get_ticket(OWNER, open.id).await.unwrap();
    assert_eq!(open.backlog_id, Some(backlog.id));
    assert_eq!(open.sprint_id, None);

    let done = store.get_ticket(OWNER, done.id).await.unwrap();
    assert_eq!(done.sprint_id, Some(active.id));
    assert_eq!(done.backlog_id, None);
}

#[tokio::test]
async fn test_complete_to_next_sprint() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    let active = store
        .create_sprint(OWNER, board.id, sprint("Now", true))
        .await
        .unwrap()
        .sprint;
    let next = store
        .create_sprint(OWNER, board.id, sprint("Next", false))
        .await
        .unwrap()
        .sprint;
    let open = ticket_in(&store, &board, active.id, "Open").await;

    let err = store
        .complete_sprint(OWNER, active.id, CompletionPolicy::NextSprint(active.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let transition = store
        .complete_sprint(OWNER, active.id, CompletionPolicy::NextSprint(next.id))
        .await
        .unwrap();
    assert_eq!(transition.moved_ticket_count, 1);
    let open = store.get_ticket(OWNER, open.id).await.unwrap();
    assert_eq!(open.sprint_id, Some(next.id));
}

#[tokio::test]
async fn test_next_sprint_target_must_share_board() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    let other = store
        .create_board(OWNER, NewBoard::new("Other", "OTH"))
        .await
        .unwrap();
    let active = store
        .create_sprint(OWNER, board.id, sprint("Now", true))
        .await
        .unwrap()
        .sprint;
    let foreign = store
        .create_sprint(OWNER, other.id, sprint("Elsewhere", false))
        .await
        .unwrap()
        .sprint;

    let err = store
        .complete_sprint(OWNER, active.id, CompletionPolicy::NextSprint(foreign.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    // Nothing was committed
    let active = store.get_sprint(OWNER, active.id).await.unwrap();
    assert_eq!(active.status, SprintStatus::Active);
}

#[tokio::test]
async fn test_completed_target_rolls_back_completion() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    let first = store
        .create_sprint(OWNER, board.id, sprint("Sprint 1", true))
        .await
        .unwrap()
        .sprint;
    store
        .complete_sprint(OWNER, first.id, CompletionPolicy::Backlog)
        .await
        .unwrap();
    let second = store
        .create_sprint(OWNER, board.id, sprint("Sprint 2", true))
        .await
        .unwrap()
        .sprint;
    let open = ticket_in(&store, &board, second.id, "Still open").await;

    let err = store
        .complete_sprint(OWNER, second.id, CompletionPolicy::NextSprint(first.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let second = store.get_sprint(OWNER, second.id).await.unwrap();
    assert_eq!(second.status, SprintStatus::Active);
    let open = store.get_ticket(OWNER, open.id).await.unwrap();
    assert_eq!(open.sprint_id, Some(second.id));
    assert_eq!(open.backlog_id, None);

    let third = store
        .create_sprint(OWNER, board.id, sprint("Sprint 3", false))
        .await
        .unwrap()
        .sprint;
    assert_eq!(third.number, 3);
    let next = store
        .create_ticket(OWNER, board.id, NewTicket::titled("After"))
        .await
        .unwrap();
    assert_eq!(next.key, "SENS-2");
}

#[tokio::test]
async fn test_delete_sprint_returns_tickets_to_backlog() {
    let (_dir, store) = open_store();
    let (board, backlog) = board_with_backlog(&store).await;
    let planned = store
        .create_sprint(OWNER, board.id, sprint("Later", false))
        .await
        .unwrap()
        .sprint;
    let ticket = ticket_in(&store, &board, planned.id, "Scheduled").await;

    store.delete_sprint(OWNER, planned.id).await.unwrap();

    let err = store.get_sprint(OWNER, planned.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let ticket = store.get_ticket(OWNER, ticket.id).await.unwrap();
    assert_eq!(ticket.backlog_id, Some(backlog.id));
    assert_eq!(ticket.sprint_id, None);
}

#[tokio::test]
async fn test_sprint_numbers_are_never_reused() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    store
        .create_sprint(OWNER, board.id, sprint("One", false))
        .await
        .unwrap();
    let two = store
        .create_sprint(OWNER, board.id, sprint("Two", false))
        .await
        .unwrap()
        .sprint;
    store.delete_sprint(OWNER, two.id).await.unwrap();

    let three = store
        .create_sprint(OWNER, board.id, sprint("Three", false))
        .await
        .unwrap()
        .sprint;
    assert_eq!(three.number, 3);

    let numbers: Vec<u32> = store
        .list_sprints(OWNER, board.id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.number)
        .collect();
    assert_eq!(numbers, vec![1, 3]);
}

#[tokio::test]
async fn test_update_sprint_validates_window() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    let planned = store
        .create_sprint(OWNER, board.id, sprint("Later", false))
        .await
        .unwrap()
        .sprint;

    let err = store
        .update_sprint(
            OWNER,
            planned.id,
            SprintUpdate {
                end_date: Some(planned.start_date - Duration::days(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let renamed = store
        .update_sprint(
            OWNER,
            planned.id,
            SprintUpdate {
                name: Some("Hardening".to_string()),
                goal: FieldUpdate::Set("Zero P1 bugs".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Hardening");
    assert_eq!(renamed.goal.as_deref(), Some("Zero P1 bugs"));
    assert_eq!(renamed.status, SprintStatus::Planned);
}

#[tokio::test]
async fn test_invalid_window_rejected_before_transaction() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    let start = Utc::now();
    let err = store
        .create_sprint(
            OWNER,
            board.id,
            NewSprint {
                end_date: start,
                start_date: start,
                ..sprint("Zero length", false)
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(store.list_sprints(OWNER, board.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_auto_start_leaves_one_active_sprint() {
    let (_dir, store) = open_store();
    let store = Arc::new(store);
    let (board, _) = board_with_backlog(&store).await;
    let board_id = board.id;
    const N: usize = 8;

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .create_sprint(OWNER, board_id, sprint(&format!("Sprint {}", i), true))
                    .await
            })
        })
        .collect();
    for joined in futures::future::join_all(handles).await {
        joined.unwrap().unwrap();
    }

    let sprints = store.list_sprints(OWNER, board_id).await.unwrap();
    assert_eq!(sprints.len(), N);
    let active: Vec<_> = sprints.iter().filter(|s| s.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].number as usize, N);
    let numbers: Vec<u32> = sprints.iter().map(|s| s.number).collect();
    assert_eq!(numbers, (1..=N as u32).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_sprint_mutations_require_member_role() {
    let (_dir, store) = open_store();
    let (board, _) = board_with_backlog(&store).await;
    store
        .add_member(OWNER, board.id, "viewer@example.com", Role::Viewer)
        .await
        .unwrap();

    let err = store
        .create_sprint("viewer@example.com", board.id, sprint("Nope", true))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store
        .create_sprint("stranger@example.com", board.id, sprint("Nope", true))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // Viewers can still read
    assert!(store
        .list_sprints("viewer@example.com", board.id)
        .await
        .unwrap()
        .is_empty());
}
