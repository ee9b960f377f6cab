//! Write-first board locks.
//!
//! SQLite allows a single writer. A deferred transaction that reads before
//! it writes can fail to upgrade when another writer commits in between, so
//! every mutating script starts by bumping `lock_version` on the owning
//! board row. That statement takes the write lock (waiting out the busy
//! timeout if needed) before any invariant is read.

use sqlx::{Row, SqliteConnection};
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{BacklogId, BoardId, SprintId, TicketId};

use super::rows::parse_uuid;
use super::sqlite_store::db_err;

/// The row a mutation is addressed to; the lock lands on its board.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LockScope {
    Board(BoardId),
    Sprint(SprintId),
    Ticket(TicketId),
    Backlog(BacklogId),
}

impl LockScope {
    fn entity(self) -> (&'static str, uuid::Uuid) {
        match self {
            Self::Board(id) => ("Board", id),
            Self::Sprint(id) => ("Sprint", id),
            Self::Ticket(id) => ("Ticket", id),
            Self::Backlog(id) => ("Backlog", id),
        }
    }

    fn statement(self) -> &'static str {
        match self {
            Self::Board(_) => {
                "UPDATE boards SET lock_version = lock_version + 1 WHERE id = ? RETURNING id"
            }
            Self::Sprint(_) => {
                "UPDATE boards SET lock_version = lock_version + 1
                 WHERE id = (SELECT board_id FROM sprints WHERE id = ?) RETURNING id"
            }
            Self::Ticket(_) => {
                "UPDATE boards SET lock_version = lock_version + 1
                 WHERE id = (SELECT board_id FROM tickets WHERE id = ?) RETURNING id"
            }
            Self::Backlog(_) => {
                "UPDATE boards SET lock_version = lock_version + 1
                 WHERE id = (SELECT board_id FROM backlogs WHERE id = ?) RETURNING id"
            }
        }
    }
}

/// Lock the board owning `scope` and return its id. Must be the first
/// statement of the transaction.
pub(crate) async fn lock(conn: &mut SqliteConnection, scope: LockScope) -> TrackerResult<BoardId> {
    let (what, id) = scope.entity();
    let row = sqlx::query(scope.statement())
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| TrackerError::not_found(what, id))?;

    let board_id = parse_uuid(&row.try_get::<String, _>("id").map_err(db_err)?)?;
    tracing::debug!("Locked board {} for {} {}", board_id, what, id);
    Ok(board_id)
}
