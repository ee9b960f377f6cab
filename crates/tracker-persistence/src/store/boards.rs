//! Board registry: board rows, their backlog, hierarchy walks and
//! membership management.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{
    ensure_no_cycle, Action, Backlog, Board, BoardHierarchy, BoardId, BoardMember, BoardUpdate,
    FieldUpdate, NewBoard, Role, WalkGuard, WalkStep,
};

use super::access::guard;
use super::lock::{lock, LockScope};
use super::rows::{row_to_backlog, row_to_board, row_to_member, rows_to, BOARD_COLUMNS};
use super::sqlite_store::db_err;

pub(crate) async fn fetch_board(conn: &mut SqliteConnection, id: BoardId) -> TrackerResult<Board> {
    let row = sqlx::query(&format!("SELECT {} FROM boards WHERE id = ?", BOARD_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TrackerError::not_found("Board", id))?;
    row_to_board(&row)
}

pub(crate) async fn fetch_backlog(
    conn: &mut SqliteConnection,
    board_id: BoardId,
) -> TrackerResult<Backlog> {
    let row = sqlx::query("SELECT id, board_id FROM backlogs WHERE board_id = ?")
        .bind(board_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TrackerError::not_found("Backlog for board", board_id))?;
    row_to_backlog(&row)
}

pub(crate) async fn fetch_backlog_by_id(
    conn: &mut SqliteConnection,
    id: tracker_domain::BacklogId,
) -> TrackerResult<Backlog> {
    let row = sqlx::query("SELECT id, board_id FROM backlogs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TrackerError::not_found("Backlog", id))?;
    row_to_backlog(&row)
}

async fn fetch_member(
    conn: &mut SqliteConnection,
    board_id: BoardId,
    user_id: &str,
) -> TrackerResult<BoardMember> {
    let row = sqlx::query(
        "SELECT board_id, user_id, role, created_at FROM board_members
         WHERE board_id = ? AND user_id = ?",
    )
    .bind(board_id.to_string())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or_else(|| {
        TrackerError::NotFound(format!("Member '{}' on board {}", user_id, board_id))
    })?;
    row_to_member(&row)
}

async fn insert_member(conn: &mut SqliteConnection, member: &BoardMember) -> TrackerResult<()> {
    sqlx::query(
        "INSERT INTO board_members (board_id, user_id, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(member.board_id.to_string())
    .bind(&member.user_id)
    .bind(member.role.as_str())
    .bind(member.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|e| match db_err(e) {
        TrackerError::Conflict(_) => TrackerError::Conflict(format!(
            "User '{}' is already a member of board {}",
            member.user_id, member.board_id
        )),
        other => other,
    })?;
    Ok(())
}

/// Creates the board, its backlog and the creator's OWNER membership.
pub(crate) async fn create(
    conn: &mut SqliteConnection,
    actor: &str,
    new: NewBoard,
) -> TrackerResult<Board> {
    if let Some(parent_id) = new.parent_board_id {
        lock(conn, LockScope::Board(parent_id)).await?;
        guard(conn, parent_id, actor, Action::CreateChildBoard).await?;
    }

    let mut board = Board::new(
        new.name.clone(),
        new.prefix.clone(),
        new.effective_color().to_string(),
        new.parent_board_id,
    );
    board.description = new.description;

    // Step 1: board row
    sqlx::query(
        "INSERT INTO boards (id, name, prefix, color, description, parent_board_id,
                             ticket_counter, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(board.id.to_string())
    .bind(&board.name)
    .bind(&board.prefix)
    .bind(&board.color)
    .bind(&board.description)
    .bind(board.parent_board_id.map(|id| id.to_string()))
    .bind(board.created_at.to_rfc3339())
    .bind(board.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|e| match db_err(e) {
        TrackerError::Conflict(_) => {
            TrackerError::Conflict(format!("Board prefix '{}' is already in use", board.prefix))
        }
        other => other,
    })?;

    // Step 2: backlog
    let backlog = Backlog::new(board.id);
    sqlx::query("INSERT INTO backlogs (id, board_id) VALUES (?, ?)")
        .bind(backlog.id.to_string())
        .bind(backlog.board_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    // Step 3: owner membership
    insert_member(conn, &BoardMember::new(board.id, actor.to_string(), Role::Owner)).await?;

    Ok(board)
}

pub(crate) async fn update(
    conn: &mut SqliteConnection,
    actor: &str,
    id: BoardId,
    updates: BoardUpdate,
    max_depth: usize,
) -> TrackerResult<Board> {
    lock(conn, LockScope::Board(id)).await?;
    guard(conn, id, actor, Action::UpdateBoard).await?;
    let mut board = fetch_board(conn, id).await?;

    if let FieldUpdate::Set(new_parent) = updates.parent_board_id {
        fetch_board(conn, new_parent).await?;
        guard(conn, new_parent, actor, Action::CreateChildBoard).await?;
        let chain: Vec<_> = ancestors(conn, new_parent, max_depth)
            .await?
            .into_iter()
            .map(|b| b.id)
            .collect();
        ensure_no_cycle(id, new_parent, &chain, "Board")?;
    }

    board.update(updates);
    sqlx::query(
        "UPDATE boards SET name = ?, color = ?, description = ?, parent_board_id = ?,
                           updated_at = ?
         WHERE id = ?",
    )
    .bind(&board.name)
    .bind(&board.color)
    .bind(&board.description)
    .bind(board.parent_board_id.map(|p| p.to_string()))
    .bind(board.updated_at.to_rfc3339())
    .bind(board.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(board)
}

/// Removes the board and everything it owns. Direct children become roots.
pub(crate) async fn delete(conn: &mut SqliteConnection, actor: &str, id: BoardId) -> TrackerResult<()> {
    lock(conn, LockScope::Board(id)).await?;
    guard(conn, id, actor, Action::DeleteBoard).await?;
    let key = id.to_string();

    // Step 1: tickets (sub-tickets cascade through parent_id)
    let tickets = sqlx::query("DELETE FROM tickets WHERE board_id = ?")
        .bind(&key)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?
        .rows_affected();

    // Step 2: sprints and backlog
    sqlx::query("DELETE FROM sprints WHERE board_id = ?")
        .bind(&key)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    sqlx::query("DELETE FROM backlogs WHERE board_id = ?")
        .bind(&key)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    // Step 3: members
    sqlx::query("DELETE FROM board_members WHERE board_id = ?")
        .bind(&key)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    // Step 4: detach children
    let detached = sqlx::query(
        "UPDATE boards SET parent_board_id = NULL, updated_at = ? WHERE parent_board_id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(&key)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?
    .rows_affected();

    // Step 5: the board itself
    sqlx::query("DELETE FROM boards WHERE id = ?")
        .bind(&key)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    tracing::debug!(
        "Board {} delete removed {} tickets, detached {} child boards",
        id,
        tickets,
        detached
    );
    Ok(())
}

/// Boards the user holds any membership on.
pub(crate) async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> TrackerResult<Vec<Board>> {
    let rows = sqlx::query(
        "SELECT b.id, b.name, b.prefix, b.color, b.description, b.parent_board_id,
                b.ticket_counter, b.created_at, b.updated_at
         FROM boards b
         JOIN board_members m ON m.board_id = b.id
         WHERE m.user_id = ?
         ORDER BY b.created_at, b.prefix",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_board)
}

pub(crate) async fn children(
    conn: &mut SqliteConnection,
    board_id: BoardId,
) -> TrackerResult<Vec<Board>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM boards WHERE parent_board_id = ? ORDER BY created_at, prefix",
        BOARD_COLUMNS
    ))
    .bind(board_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_board)
}

/// Direct children the user is a member of.
pub(crate) async fn visible_children(
    conn: &mut SqliteConnection,
    board_id: BoardId,
    user_id: &str,
) -> TrackerResult<Vec<Board>> {
    let rows = sqlx::query(
        "SELECT b.id, b.name, b.prefix, b.color, b.description, b.parent_board_id,
                b.ticket_counter, b.created_at, b.updated_at
         FROM boards b
         JOIN board_members m ON m.board_id = b.id
         WHERE b.parent_board_id = ? AND m.user_id = ?
         ORDER BY b.created_at, b.prefix",
    )
    .bind(board_id.to_string())
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_board)
}

pub(crate) async fn hierarchy(
    conn: &mut SqliteConnection,
    board_id: BoardId,
) -> TrackerResult<BoardHierarchy> {
    let board = fetch_board(conn, board_id).await?;
    let parent = match board.parent_board_id {
        Some(parent_id) => Some(fetch_board(conn, parent_id).await?),
        None => None,
    };
    let children = children(conn, board_id).await?;
    Ok(BoardHierarchy {
        board,
        parent,
        children,
    })
}

/// Parent chain of `board_id`, root first, excluding the board itself.
pub(crate) async fn ancestors(
    conn: &mut SqliteConnection,
    board_id: BoardId,
    max_depth: usize,
) -> TrackerResult<Vec<Board>> {
    let mut walk = WalkGuard::new(board_id, max_depth);
    let mut chain = Vec::new();
    let mut next = fetch_board(conn, board_id).await?.parent_board_id;

    while let Some(parent_id) = next {
        match walk.visit(parent_id) {
            WalkStep::Continue => {}
            WalkStep::Cycle => {
                tracing::warn!("Board hierarchy above {} loops at {}", board_id, parent_id);
                return Err(TrackerError::InvalidState(format!(
                    "Board hierarchy above {} contains a cycle",
                    board_id
                )));
            }
            WalkStep::TooDeep => {
                tracing::warn!("Board hierarchy above {} exceeds {} levels", board_id, max_depth);
                return Err(TrackerError::InvalidState(format!(
                    "Board hierarchy above {} is deeper than {} levels",
                    board_id, max_depth
                )));
            }
        }
        let parent = fetch_board(conn, parent_id).await?;
        next = parent.parent_board_id;
        chain.push(parent);
    }

    chain.reverse();
    Ok(chain)
}

pub(crate) async fn add_member(
    conn: &mut SqliteConnection,
    actor: &str,
    board_id: BoardId,
    user_id: &str,
    role: Role,
) -> TrackerResult<BoardMember> {
    lock(conn, LockScope::Board(board_id)).await?;
    guard(conn, board_id, actor, Action::ManageMembers).await?;

    let member = BoardMember::new(board_id, user_id.to_string(), role);
    insert_member(conn, &member).await?;
    Ok(member)
}

pub(crate) async fn remove_member(
    conn: &mut SqliteConnection,
    actor: &str,
    board_id: BoardId,
    user_id: &str,
) -> TrackerResult<()> {
    lock(conn, LockScope::Board(board_id)).await?;
    guard(conn, board_id, actor, Action::ManageMembers).await?;

    let target = fetch_member(conn, board_id, user_id).await?;
    if target.is_owner() {
        return Err(TrackerError::InvalidState(format!(
            "The owner of board {} cannot be removed",
            board_id
        )));
    }

    sqlx::query("DELETE FROM board_members WHERE board_id = ? AND user_id = ?")
        .bind(board_id.to_string())
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub(crate) async fn update_member_role(
    conn: &mut SqliteConnection,
    actor: &str,
    board_id: BoardId,
    user_id: &str,
    role: Role,
) -> TrackerResult<BoardMember> {
    lock(conn, LockScope::Board(board_id)).await?;
    guard(conn, board_id, actor, Action::ChangeMemberRole).await?;

    let mut target = fetch_member(conn, board_id, user_id).await?;
    if target.is_owner() {
        return Err(TrackerError::InvalidState(format!(
            "The OWNER role on board {} cannot be revoked",
            board_id
        )));
    }

    sqlx::query("UPDATE board_members SET role = ? WHERE board_id = ? AND user_id = ?")
        .bind(role.as_str())
        .bind(board_id.to_string())
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    target.role = role;
    Ok(target)
}

pub(crate) async fn list_members(
    conn: &mut SqliteConnection,
    board_id: BoardId,
) -> TrackerResult<Vec<BoardMember>> {
    let rows = sqlx::query(
        "SELECT board_id, user_id, role, created_at FROM board_members
         WHERE board_id = ? ORDER BY created_at, user_id",
    )
    .bind(board_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_member)
}
