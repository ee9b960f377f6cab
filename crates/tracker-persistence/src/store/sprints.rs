//! Sprint engine. Each lifecycle change is one transaction script; the
//! named steps below run after the board lock is held.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{
    Action, BoardId, CompletionPolicy, NewSprint, Sprint, SprintId, SprintStatus,
    SprintTransition, SprintUpdate,
};

use super::access::guard;
use super::boards::fetch_backlog;
use super::lock::{lock, LockScope};
use super::rows::{row_to_sprint, rows_to, SPRINT_COLUMNS};
use super::sqlite_store::db_err;

pub(crate) async fn fetch_sprint(conn: &mut SqliteConnection, id: SprintId) -> TrackerResult<Sprint> {
    let row = sqlx::query(&format!("SELECT {} FROM sprints WHERE id = ?", SPRINT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TrackerError::not_found("Sprint", id))?;
    row_to_sprint(&row)
}

pub(crate) async fn fetch_active(
    conn: &mut SqliteConnection,
    board_id: BoardId,
) -> TrackerResult<Option<Sprint>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sprints WHERE board_id = ? AND status = 'ACTIVE'",
        SPRINT_COLUMNS
    ))
    .bind(board_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;
    row.as_ref().map(row_to_sprint).transpose()
}

pub(crate) async fn list(conn: &mut SqliteConnection, board_id: BoardId) -> TrackerResult<Vec<Sprint>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sprints WHERE board_id = ? ORDER BY number",
        SPRINT_COLUMNS
    ))
    .bind(board_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;
    rows_to(&rows, row_to_sprint)
}

/// Sprint numbers come from a per-board counter so a deleted sprint's
/// number is never handed out again.
async fn allocate_number(conn: &mut SqliteConnection, board_id: BoardId) -> TrackerResult<u32> {
    let row = sqlx::query(
        "UPDATE boards SET sprint_counter = sprint_counter + 1 WHERE id = ? RETURNING sprint_counter",
    )
    .bind(board_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or_else(|| TrackerError::not_found("Board", board_id))?;
    let number: i64 = row.try_get("sprint_counter").map_err(db_err)?;
    Ok(number as u32)
}

async fn save_sprint(conn: &mut SqliteConnection, sprint: &Sprint) -> TrackerResult<()> {
    sqlx::query(
        "UPDATE sprints SET name = ?, goal = ?, status = ?, start_date = ?, end_date = ?,
                            updated_at = ?
         WHERE id = ?",
    )
    .bind(&sprint.name)
    .bind(&sprint.goal)
    .bind(sprint.status.as_str())
    .bind(sprint.start_date.to_rfc3339())
    .bind(sprint.end_date.to_rfc3339())
    .bind(sprint.updated_at.to_rfc3339())
    .bind(sprint.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| match db_err(e) {
        TrackerError::Conflict(_) => TrackerError::Conflict(format!(
            "Another sprint is already active on board {}",
            sprint.board_id
        )),
        other => other,
    })?;
    Ok(())
}

/// Re-point every unfinished ticket of `from` to `to_sprint`, or to the
/// backlog when `to_sprint` is `None`. DONE tickets never move.
async fn migrate_unfinished(
    conn: &mut SqliteConnection,
    from: &Sprint,
    to_sprint: Option<SprintId>,
) -> TrackerResult<usize> {
    let now = Utc::now().to_rfc3339();
    let result = match to_sprint {
        Some(target) => {
            sqlx::query(
                "UPDATE tickets SET sprint_id = ?, backlog_id = NULL, updated_at = ?
                 WHERE sprint_id = ? AND status <> 'DONE'",
            )
            .bind(target.to_string())
            .bind(&now)
            .bind(from.id.to_string())
            .execute(&mut *conn)
            .await
        }
        None => {
            let backlog = fetch_backlog(conn, from.board_id).await?;
            sqlx::query(
                "UPDATE tickets SET sprint_id = NULL, backlog_id = ?, updated_at = ?
                 WHERE sprint_id = ? AND status <> 'DONE'",
            )
            .bind(backlog.id.to_string())
            .bind(&now)
            .bind(from.id.to_string())
            .execute(&mut *conn)
            .await
        }
    };
    Ok(result.map_err(db_err)?.rows_affected() as usize)
}

pub(crate) async fn create(
    conn: &mut SqliteConnection,
    actor: &str,
    board_id: BoardId,
    new: NewSprint,
) -> TrackerResult<SprintTransition> {
    lock(conn, LockScope::Board(board_id)).await?;
    guard(conn, board_id, actor, Action::MutateSprint).await?;
    let number = allocate_number(conn, board_id).await?;

    // Step 1: close the previous active sprint
    let closed_sprint = if new.auto_start {
        match fetch_active(conn, board_id).await? {
            Some(mut previous) => {
                previous.complete()?;
                save_sprint(conn, &previous).await?;
                Some(previous)
            }
            None => None,
        }
    } else {
        None
    };

    // Step 2: open the new sprint
    let sprint = Sprint::new(board_id, number, &new);
    sqlx::query(
        "INSERT INTO sprints (id, board_id, number, name, goal, status, start_date, end_date,
                              created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(sprint.id.to_string())
    .bind(sprint.board_id.to_string())
    .bind(i64::from(sprint.number))
    .bind(&sprint.name)
    .bind(&sprint.goal)
    .bind(sprint.status.as_str())
    .bind(sprint.start_date.to_rfc3339())
    .bind(sprint.end_date.to_rfc3339())
    .bind(sprint.created_at.to_rfc3339())
    .bind(sprint.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    // Step 3: migrate unfinished work
    let moved_ticket_count = match closed_sprint {
        Some(ref previous) => migrate_unfinished(conn, previous, Some(sprint.id)).await?,
        None => 0,
    };

    Ok(SprintTransition {
        sprint,
        closed_sprint,
        moved_ticket_count,
    })
}

pub(crate) async fn start(conn: &mut SqliteConnection, actor: &str, id: SprintId) -> TrackerResult<Sprint> {
    let board_id = lock(conn, LockScope::Sprint(id)).await?;
    guard(conn, board_id, actor, Action::MutateSprint).await?;
    let mut sprint = fetch_sprint(conn, id).await?;
    sprint.ensure_can_start()?;

    if let Some(active) = fetch_active(conn, board_id).await? {
        return Err(TrackerError::Conflict(format!(
            "Sprint {} is already active on this board",
            active.number
        )));
    }

    sprint.start()?;
    save_sprint(conn, &sprint).await?;
    Ok(sprint)
}

pub(crate) async fn complete(
    conn: &mut SqliteConnection,
    actor: &str,
    id: SprintId,
    policy: CompletionPolicy,
) -> TrackerResult<SprintTransition> {
    let board_id = lock(conn, LockScope::Sprint(id)).await?;
    guard(conn, board_id, actor, Action::MutateSprint).await?;
    let mut sprint = fetch_sprint(conn, id).await?;
    sprint.ensure_can_complete()?;

    if let CompletionPolicy::NextSprint(target_id) = policy {
        if target_id == id {
            return Err(TrackerError::InvalidState(format!(
                "Sprint {} cannot hand its tickets to itself",
                sprint.number
            )));
        }
        let target = fetch_sprint(conn, target_id).await?;
        if target.board_id != board_id {
            return Err(TrackerError::InvalidState(format!(
                "Target sprint {} belongs to another board",
                target_id
            )));
        }
        if target.status == SprintStatus::Completed {
            return Err(TrackerError::InvalidState(format!(
                "Target sprint {} is already completed",
                target.number
            )));
        }
    }

    // Step 1: close the sprint
    sprint.complete()?;
    save_sprint(conn, &sprint).await?;

    // Step 2: redistribute unfinished work
    let moved_ticket_count = match policy {
        CompletionPolicy::Backlog => migrate_unfinished(conn, &sprint, None).await?,
        CompletionPolicy::NextSprint(target) => {
            migrate_unfinished(conn, &sprint, Some(target)).await?
        }
        CompletionPolicy::Keep => 0,
    };

    Ok(SprintTransition {
        sprint,
        closed_sprint: None,
        moved_ticket_count,
    })
}

pub(crate) async fn update(
    conn: &mut SqliteConnection,
    actor: &str,
    id: SprintId,
    updates: SprintUpdate,
) -> TrackerResult<Sprint> {
    let board_id = lock(conn, LockScope::Sprint(id)).await?;
    guard(conn, board_id, actor, Action::MutateSprint).await?;
    let mut sprint = fetch_sprint(conn, id).await?;

    sprint.update(updates)?;
    save_sprint(conn, &sprint).await?;
    Ok(sprint)
}

/// Deletes the sprint after returning its tickets to the board backlog.
pub(crate) async fn delete(conn: &mut SqliteConnection, actor: &str, id: SprintId) -> TrackerResult<usize> {
    let board_id = lock(conn, LockScope::Sprint(id)).await?;
    guard(conn, board_id, actor, Action::MutateSprint).await?;
    let backlog = fetch_backlog(conn, board_id).await?;

    let moved = sqlx::query(
        "UPDATE tickets SET sprint_id = NULL, backlog_id = ?, updated_at = ? WHERE sprint_id = ?",
    )
    .bind(backlog.id.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?
    .rows_affected();

    sqlx::query("DELETE FROM sprints WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    Ok(moved as usize)
}
