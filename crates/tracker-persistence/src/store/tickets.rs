//! Ticket store: creation with key allocation, placement exclusivity,
//! sub-ticket hierarchy and the board-hierarchy view.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{
    ensure_no_cycle, Action, BacklogId, BoardId, FieldUpdate, NewTicket, Placement, SprintId,
    SprintStatus, Ticket, TicketId, TicketQuery, TicketUpdate, WalkGuard, WalkStep,
};

use super::access::guard;
use super::boards::{fetch_backlog, fetch_backlog_by_id, visible_children};
use super::keys::{allocate_sub_ticket_key, allocate_ticket_key};
use super::lock::{lock, LockScope};
use super::rows::{row_to_ticket, rows_to, TICKET_COLUMNS};
use super::sprints::fetch_sprint;
use super::sqlite_store::db_err;

pub(crate) async fn fetch_ticket(conn: &mut SqliteConnection, id: TicketId) -> TrackerResult<Ticket> {
    let row = sqlx::query(&format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TrackerError::not_found("Ticket", id))?;
    row_to_ticket(&row)
}

/// Check that `requested` lives on `board_id`, defaulting to the board
/// backlog. Completed sprints take no new work.
async fn resolve_placement(
    conn: &mut SqliteConnection,
    board_id: BoardId,
    requested: Option<Placement>,
) -> TrackerResult<Placement> {
    match requested {
        None => Ok(Placement::Backlog(fetch_backlog(conn, board_id).await?.id)),
        Some(Placement::Backlog(backlog_id)) => {
            let backlog = fetch_backlog_by_id(conn, backlog_id).await?;
            if backlog.board_id != board_id {
                return Err(TrackerError::InvalidState(format!(
                    "Backlog {} belongs to another board",
                    backlog_id
                )));
            }
            Ok(Placement::Backlog(backlog_id))
        }
        Some(Placement::Sprint(sprint_id)) => {
            let sprint = fetch_sprint(conn, sprint_id).await?;
            if sprint.board_id != board_id {
                return Err(TrackerError::InvalidState(format!(
                    "Sprint {} belongs to another board",
                    sprint_id
                )));
            }
            if sprint.status == SprintStatus::Completed {
                return Err(TrackerError::InvalidState(format!(
                    "Sprint {} is completed and accepts no tickets",
                    sprint.number
                )));
            }
            Ok(Placement::Sprint(sprint_id))
        }
    }
}

/// Position after the last ticket in the container.
async fn next_position(conn: &mut SqliteConnection, placement: Placement) -> TrackerResult<i64> {
    let (column, id) = match placement {
        Placement::Backlog(id) => ("backlog_id", id),
        Placement::Sprint(id) => ("sprint_id", id),
    };
    let (position,): (i64,) = sqlx::query_as(&format!(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM tickets WHERE {} = ?",
        column
    ))
    .bind(id.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(position)
}

async fn insert_ticket(conn: &mut SqliteConnection, ticket: &Ticket) -> TrackerResult<()> {
    sqlx::query(
        "INSERT INTO tickets (id, key, board_id, backlog_id, sprint_id, parent_id, title,
                              description, status, priority, story_points, position,
                              creator_id, assignee_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(ticket.id.to_string())
    .bind(&ticket.key)
    .bind(ticket.board_id.to_string())
    .bind(ticket.backlog_id.map(|id| id.to_string()))
    .bind(ticket.sprint_id.map(|id| id.to_string()))
    .bind(ticket.parent_id.map(|id| id.to_string()))
    .bind(&ticket.title)
    .bind(&ticket.description)
    .bind(ticket.status.as_str())
    .bind(ticket.priority.as_str())
    .bind(ticket.story_points.map(i64::from))
    .bind(ticket.order)
    .bind(&ticket.creator_id)
    .bind(&ticket.assignee_id)
    .bind(ticket.created_at.to_rfc3339())
    .bind(ticket.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn save_ticket(conn: &mut SqliteConnection, ticket: &Ticket) -> TrackerResult<()> {
    sqlx::query(
        "UPDATE tickets SET backlog_id = ?, sprint_id = ?, parent_id = ?, title = ?,
                            description = ?, status = ?, priority = ?, story_points = ?,
                            position = ?, assignee_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(ticket.backlog_id.map(|id| id.to_string()))
    .bind(ticket.sprint_id.map(|id| id.to_string()))
    .bind(ticket.parent_id.map(|id| id.to_string()))
    .bind(&ticket.title)
    .bind(&ticket.description)
    .bind(ticket.status.as_str())
    .bind(ticket.priority.as_str())
    .bind(ticket.story_points.map(i64::from))
    .bind(ticket.order)
    .bind(&ticket.assignee_id)
    .bind(ticket.updated_at.to_rfc3339())
    .bind(ticket.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Parent chain of a ticket, nearest first.
async fn ticket_ancestors(
    conn: &mut SqliteConnection,
    ticket_id: TicketId,
    max_depth: usize,
) -> TrackerResult<Vec<TicketId>> {
    let mut walk = WalkGuard::new(ticket_id, max_depth);
    let mut chain = Vec::new();
    let mut next = fetch_ticket(conn, ticket_id).await?.parent_id;

    while let Some(parent_id) = next {
        match walk.visit(parent_id) {
            WalkStep::Continue => {}
            WalkStep::Cycle | WalkStep::TooDeep => {
                tracing::warn!("Ticket parent chain above {} stopped at {}", ticket_id, parent_id);
                return Err(TrackerError::InvalidState(format!(
                    "Ticket parent chain above {} is cyclic or deeper than {} levels",
                    ticket_id, max_depth
                )));
            }
        }
        chain.push(parent_id);
        next = fetch_ticket(conn, parent_id).await?.parent_id;
    }
    Ok(chain)
}

fn ensure_same_board(parent: &Ticket, board_id: BoardId) -> TrackerResult<()> {
    if parent.board_id != board_id {
        return Err(TrackerError::InvalidState(format!(
            "Parent ticket {} belongs to another board",
            parent.key
        )));
    }
    Ok(())
}

/// Shared by `create` and `create_sub`: the board lock and membership
/// check have already happened.
async fn create_locked(
    conn: &mut SqliteConnection,
    actor: &str,
    board_id: BoardId,
    new: NewTicket,
    max_depth: usize,
) -> TrackerResult<Ticket> {
    let requested = new.requested_placement()?;

    let (key, inherited) = match new.parent_id {
        Some(parent_id) => {
            let parent = fetch_ticket(conn, parent_id).await?;
            ensure_same_board(&parent, board_id)?;
            let key = allocate_sub_ticket_key(conn, parent_id, max_depth).await?;
            (key, parent.placement())
        }
        None => (allocate_ticket_key(conn, board_id).await?, None),
    };

    // An inherited container follows the parent, even into a completed sprint
    let placement = match (requested, inherited) {
        (None, Some(inherited)) => inherited,
        (requested, _) => resolve_placement(conn, board_id, requested).await?,
    };
    let order = next_position(conn, placement).await?;
    let ticket = Ticket::new(key, board_id, placement, &new, actor.to_string(), order);
    insert_ticket(conn, &ticket).await?;
    Ok(ticket)
}

pub(crate) async fn create(
    conn: &mut SqliteConnection,
    actor: &str,
    board_id: BoardId,
    new: NewTicket,
    max_depth: usize,
) -> TrackerResult<Ticket> {
    lock(conn, LockScope::Board(board_id)).await?;
    guard(conn, board_id, actor, Action::MutateTicket).await?;
    create_locked(conn, actor, board_id, new, max_depth).await
}

/// Sub-ticket under `parent_id`, inheriting its current container unless
/// one is named.
pub(crate) async fn create_sub(
    conn: &mut SqliteConnection,
    actor: &str,
    parent_id: TicketId,
    mut new: NewTicket,
    max_depth: usize,
) -> TrackerResult<Ticket> {
    let board_id = lock(conn, LockScope::Ticket(parent_id)).await?;
    guard(conn, board_id, actor, Action::MutateTicket).await?;
    new.parent_id = Some(parent_id);
    create_locked(conn, actor, board_id, new, max_depth).await
}

pub(crate) async fn update(
    conn: &mut SqliteConnection,
    actor: &str,
    id: TicketId,
    mut updates: TicketUpdate,
    max_depth: usize,
) -> TrackerResult<Ticket> {
    let board_id = lock(conn, LockScope::Ticket(id)).await?;
    guard(conn, board_id, actor, Action::MutateTicket).await?;
    let mut ticket = fetch_ticket(conn, id).await?;

    if let FieldUpdate::Set(parent_id) = updates.parent_id {
        let parent = fetch_ticket(conn, parent_id).await?;
        ensure_same_board(&parent, board_id)?;
        let chain = ticket_ancestors(conn, parent_id, max_depth).await?;
        ensure_no_cycle(id, parent_id, &chain, "Ticket")?;
    }

    if let Some(target) = updates.placement {
        let target = resolve_placement(conn, board_id, Some(target)).await?;
        updates.placement = Some(target);
        if ticket.placement() != Some(target) {
            ticket.order = next_position(conn, target).await?;
        }
    }

    ticket.apply(&updates);
    save_ticket(conn, &ticket).await?;
    Ok(ticket)
}

pub(crate) async fn move_to(
    conn: &mut SqliteConnection,
    actor: &str,
    id: TicketId,
    target: Placement,
) -> TrackerResult<Ticket> {
    let board_id = lock(conn, LockScope::Ticket(id)).await?;
    guard(conn, board_id, actor, Action::MutateTicket).await?;
    let mut ticket = fetch_ticket(conn, id).await?;

    let target = resolve_placement(conn, board_id, Some(target)).await?;
    if ticket.placement() != Some(target) {
        ticket.order = next_position(conn, target).await?;
    }
    ticket.place(target);
    save_ticket(conn, &ticket).await?;
    Ok(ticket)
}

pub(crate) async fn update_order(
    conn: &mut SqliteConnection,
    actor: &str,
    id: TicketId,
    order: i64,
) -> TrackerResult<Ticket> {
    let board_id = lock(conn, LockScope::Ticket(id)).await?;
    guard(conn, board_id, actor, Action::MutateTicket).await?;
    let mut ticket = fetch_ticket(conn, id).await?;

    ticket.order = order;
    ticket.updated_at = Utc::now();
    save_ticket(conn, &ticket).await?;
    Ok(ticket)
}

/// Deletes the ticket; sub-tickets go with it through the parent_id cascade.
pub(crate) async fn delete(conn: &mut SqliteConnection, actor: &str, id: TicketId) -> TrackerResult<u64> {
    let board_id = lock(conn, LockScope::Ticket(id)).await?;
    guard(conn, board_id, actor, Action::MutateTicket).await?;

    let (before,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE board_id = ?")
        .bind(board_id.to_string())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    sqlx::query("DELETE FROM tickets WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    let (after,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE board_id = ?")
        .bind(board_id.to_string())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;

    Ok((before - after) as u64)
}

pub(crate) async fn by_backlog(
    conn: &mut SqliteConnection,
    backlog_id: BacklogId,
) -> TrackerResult<Vec<Ticket>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tickets WHERE backlog_id = ? ORDER BY position, key",
        TICKET_COLUMNS
    ))
    .bind(backlog_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_ticket)
}

pub(crate) async fn by_sprint(
    conn: &mut SqliteConnection,
    sprint_id: SprintId,
) -> TrackerResult<Vec<Ticket>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tickets WHERE sprint_id = ? ORDER BY position, key",
        TICKET_COLUMNS
    ))
    .bind(sprint_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_ticket)
}

/// Tickets for a board, optionally widened to the immediate child boards
/// the caller can see. Across child boards a sprint is matched by number
/// and the backlog view is every unscheduled ticket.
pub(crate) async fn with_hierarchy(
    conn: &mut SqliteConnection,
    actor: &str,
    query: TicketQuery,
) -> TrackerResult<Vec<Ticket>> {
    let filter = Placement::from_parts(query.backlog_id, query.sprint_id)?;

    let mut boards = vec![query.board_id];
    if query.include_child_boards {
        boards.extend(
            visible_children(conn, query.board_id, actor)
                .await?
                .into_iter()
                .map(|b| b.id),
        );
    }

    let mut sql: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM tickets WHERE board_id IN (", TICKET_COLUMNS));
    {
        let mut ids = sql.separated(", ");
        for id in &boards {
            ids.push_bind(id.to_string());
        }
    }
    sql.push(")");

    match filter {
        None => {}
        Some(Placement::Backlog(backlog_id)) => {
            let backlog = fetch_backlog_by_id(conn, backlog_id).await?;
            if backlog.board_id != query.board_id {
                return Err(TrackerError::InvalidState(format!(
                    "Backlog {} belongs to another board",
                    backlog_id
                )));
            }
            if query.include_child_boards {
                sql.push(" AND backlog_id IS NOT NULL AND sprint_id IS NULL");
            } else {
                sql.push(" AND backlog_id = ").push_bind(backlog_id.to_string());
            }
        }
        Some(Placement::Sprint(sprint_id)) => {
            let sprint = fetch_sprint(conn, sprint_id).await?;
            if sprint.board_id != query.board_id {
                return Err(TrackerError::InvalidState(format!(
                    "Sprint {} belongs to another board",
                    sprint_id
                )));
            }
            if query.include_child_boards {
                sql.push(" AND (sprint_id = ")
                    .push_bind(sprint_id.to_string())
                    .push(" OR sprint_id IN (SELECT id FROM sprints WHERE number = ")
                    .push_bind(i64::from(sprint.number))
                    .push(" AND board_id IN (");
                {
                    let mut ids = sql.separated(", ");
                    for id in boards.iter().skip(1) {
                        ids.push_bind(id.to_string());
                    }
                }
                // `IN ()` with no children still needs a valid list
                if boards.len() == 1 {
                    sql.push("NULL");
                }
                sql.push(")))");
            } else {
                sql.push(" AND sprint_id = ").push_bind(sprint_id.to_string());
            }
        }
    }
    sql.push(" ORDER BY position, key");

    let rows = sql.build().fetch_all(&mut *conn).await.map_err(db_err)?;
    rows_to(&rows, row_to_ticket)
}
