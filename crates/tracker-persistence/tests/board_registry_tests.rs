use chrono::{Duration, Utc};
use tempfile::{tempdir, TempDir};
use tracker_core::ErrorKind;
use tracker_domain::*;
use tracker_persistence::{SqliteStore, StoreOptions};

const OWNER: &str = "owner@example.com";
const ADMIN: &str = "admin@example.com";
const MEMBER: &str = "member@example.com";
const VIEWER: &str = "viewer@example.com";

fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("tracker.db"));
    (dir, store)
}

async fn board_with_team(store: &SqliteStore) -> Board {
    let board = store
        .create_board(OWNER, NewBoard::new("Platform", "PLAT"))
        .await
        .unwrap();
    for (user, role) in [(ADMIN, Role::Admin), (MEMBER, Role::Member), (VIEWER, Role::Viewer)] {
        store.add_member(OWNER, board.id, user, role).await.unwrap();
    }
    board
}

#[tokio::test]
async fn test_create_board_sets_up_backlog_and_owner() {
    let (_dir, store) = open_store();
    let board = store
        .create_board(
            OWNER,
            NewBoard {
                description: Some("Shared services".to_string()),
                ..NewBoard::new("Platform", "PLAT")
            },
        )
        .await
        .unwrap();
    assert_eq!(board.color, "#3B82F6");
    assert_eq!(board.ticket_counter, 0);

    let backlog = store.get_backlog(OWNER, board.id).await.unwrap();
    assert_eq!(backlog.board_id, board.id);

    let members = store.list_members(OWNER, board.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, OWNER);
    assert_eq!(members[0].role, Role::Owner);

    let listed = store.list_boards(OWNER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description.as_deref(), Some("Shared services"));
    assert!(store.list_boards("nobody@example.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_prefix_is_conflict() {
    let (_dir, store) = open_store();
    store
        .create_board(OWNER, NewBoard::new("Platform", "PLAT"))
        .await
        .unwrap();
    let err = store
        .create_board(ADMIN, NewBoard::new("Platform again", "PLAT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_invalid_input_is_validation_error() {
    let (_dir, store) = open_store();
    for prefix in ["", "plat", "TOOLONG", "P1"] {
        let err = store
            .create_board(OWNER, NewBoard::new("Platform", prefix))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "prefix {:?}", prefix);
    }
    let err = store
        .create_board("", NewBoard::new("Platform", "PLAT"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_ancestors_are_root_first() {
    let (_dir, store) = open_store();
    let root = store
        .create_board(OWNER, NewBoard::new("Company", "CO"))
        .await
        .unwrap();
    let mid = store
        .create_board(OWNER, NewBoard::new("Platform", "PLAT").under(root.id))
        .await
        .unwrap();
    let leaf = store
        .create_board(OWNER, NewBoard::new("Storage", "STOR").under(mid.id))
        .await
        .unwrap();

    assert!(store.get_ancestors(OWNER, root.id).await.unwrap().is_empty());
    let chain: Vec<_> = store
        .get_ancestors(OWNER, leaf.id)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(chain, vec![root.id, mid.id]);

    let hierarchy = store.get_hierarchy(OWNER, mid.id).await.unwrap();
    assert_eq!(hierarchy.parent.map(|b| b.id), Some(root.id));
    assert_eq!(hierarchy.children.len(), 1);
    assert_eq!(hierarchy.children[0].id, leaf.id);

    let children = store.get_children(OWNER, root.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, mid.id);
}

#[tokio::test]
async fn test_reparent_rejects_cycles() {
    let (_dir, store) = open_store();
    let root = store
        .create_board(OWNER, NewBoard::new("Company", "CO"))
        .await
        .unwrap();
    let child = store
        .create_board(OWNER, NewBoard::new("Platform", "PLAT").under(root.id))
        .await
        .unwrap();
    let grandchild = store
        .create_board(OWNER, NewBoard::new("Storage", "STOR").under(child.id))
        .await
        .unwrap();

    let err = store
        .update_board(
            OWNER,
            root.id,
            BoardUpdate {
                parent_board_id: FieldUpdate::Set(grandchild.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = store
        .update_board(
            OWNER,
            root.id,
            BoardUpdate {
                parent_board_id: FieldUpdate::Set(root.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let moved = store
        .update_board(
            OWNER,
            grandchild.id,
            BoardUpdate {
                name: Some("Object storage".to_string()),
                parent_board_id: FieldUpdate::Set(root.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.parent_board_id, Some(root.id));
    assert_eq!(moved.prefix, "STOR");
    assert_eq!(moved.name, "Object storage");
}

#[tokio::test]
async fn test_ancestor_walk_respects_depth_limit() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::with_options(
        dir.path().join("tracker.db"),
        StoreOptions {
            max_hierarchy_depth: 2,
            ..StoreOptions::default()
        },
    );
    let a = store.create_board(OWNER, NewBoard::new("A", "A")).await.unwrap();
    let b = store
        .create_board(OWNER, NewBoard::new("B", "B").under(a.id))
        .await
        .unwrap();
    let c = store
        .create_board(OWNER, NewBoard::new("C", "C").under(b.id))
        .await
        .unwrap();
    let d = store
        .create_board(OWNER, NewBoard::new("D", "D").under(c.id))
        .await
        .unwrap();

    assert_eq!(store.get_ancestors(OWNER, c.id).await.unwrap().len(), 2);
    let err = store.get_ancestors(OWNER, d.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_child_board_requires_membership_on_parent() {
    let (_dir, store) = open_store();
    let parent = board_with_team(&store).await;

    let err = store
        .create_board(VIEWER, NewBoard::new("Side project", "SIDE").under(parent.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store
        .create_board("stranger@example.com", NewBoard::new("Side", "SIDE").under(parent.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let child = store
        .create_board(MEMBER, NewBoard::new("Team board", "TEAM").under(parent.id))
        .await
        .unwrap();
    let members = store.list_members(MEMBER, child.id).await.unwrap();
    assert_eq!(members[0].role, Role::Owner);
}

#[tokio::test]
async fn test_role_gates_for_board_operations() {
    let (_dir, store) = open_store();
    let board = board_with_team(&store).await;
    let rename = || BoardUpdate {
        name: Some("Renamed".to_string()),
        ..Default::default()
    };

    let err = store.update_board(MEMBER, board.id, rename()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    store.update_board(ADMIN, board.id, rename()).await.unwrap();

    let err = store.delete_board(ADMIN, board.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store
        .add_member(MEMBER, board.id, "new@example.com", Role::Viewer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store
        .update_member_role(ADMIN, board.id, MEMBER, Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store.get_board("stranger@example.com", board.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    store.get_board(VIEWER, board.id).await.unwrap();
}

#[tokio::test]
async fn test_member_rules_protect_owner() {
    let (_dir, store) = open_store();
    let board = board_with_team(&store).await;

    let err = store
        .add_member(OWNER, board.id, "new@example.com", Role::Owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = store
        .add_member(OWNER, board.id, MEMBER, Role::Viewer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = store.remove_member(ADMIN, board.id, OWNER).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = store
        .update_member_role(OWNER, board.id, OWNER, Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let promoted = store
        .update_member_role(OWNER, board.id, MEMBER, Role::Admin)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);

    store.remove_member(ADMIN, board.id, VIEWER).await.unwrap();
    let err = store.get_board(VIEWER, board.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = store
        .remove_member(OWNER, board.id, "nobody@example.com")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_board_cascades_and_detaches_children() {
    let (_dir, store) = open_store();
    let board = store
        .create_board(OWNER, NewBoard::new("Doomed", "DOOM"))
        .await
        .unwrap();
    let child = store
        .create_board(OWNER, NewBoard::new("Survivor", "SURV").under(board.id))
        .await
        .unwrap();
    let backlog = store.get_backlog(OWNER, board.id).await.unwrap();
    let start = Utc::now();
    let sprint = store
        .create_sprint(
            OWNER,
            board.id,
            NewSprint {
                name: "Last".to_string(),
                goal: None,
                start_date: start,
                end_date: start + Duration::days(7),
                auto_start: true,
            },
        )
        .await
        .unwrap()
        .sprint;
    let parent = store
        .create_ticket(OWNER, board.id, NewTicket::titled("Parent"))
        .await
        .unwrap();
    let sub = store
        .create_sub_ticket(OWNER, parent.id, NewTicket::titled("Sub"))
        .await
        .unwrap();

    store.delete_board(OWNER, board.id).await.unwrap();

    let not_found = |e: tracker_core::TrackerError| assert_eq!(e.kind(), ErrorKind::NotFound);
    not_found(store.get_board(OWNER, board.id).await.unwrap_err());
    not_found(store.get_backlog(OWNER, board.id).await.unwrap_err());
    not_found(store.get_backlog_tickets(OWNER, backlog.id).await.unwrap_err());
    not_found(store.get_sprint(OWNER, sprint.id).await.unwrap_err());
    not_found(store.get_ticket(OWNER, parent.id).await.unwrap_err());
    not_found(store.get_ticket(OWNER, sub.id).await.unwrap_err());

    let survivor = store.get_board(OWNER, child.id).await.unwrap();
    assert!(survivor.is_root());
    assert!(store.get_ancestors(OWNER, child.id).await.unwrap().is_empty());
}
