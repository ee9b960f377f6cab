//! Ticket key allocation. Counters only move through a single
//! increment-and-read statement inside the caller's transaction.

use sqlx::{Row, SqliteConnection};
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::key::{parse_key, sub_ticket_key, ticket_key};
use tracker_domain::{BoardId, TicketId};

use super::sqlite_store::db_err;

/// Next `PREFIX-n` for the board.
pub(crate) async fn allocate_ticket_key(
    conn: &mut SqliteConnection,
    board_id: BoardId,
) -> TrackerResult<String> {
    let row = sqlx::query(
        "UPDATE boards SET ticket_counter = ticket_counter + 1
         WHERE id = ? RETURNING prefix, ticket_counter",
    )
    .bind(board_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or_else(|| TrackerError::not_found("Board", board_id))?;

    let prefix: String = row.try_get("prefix").map_err(db_err)?;
    let counter: i64 = row.try_get("ticket_counter").map_err(db_err)?;
    let key = ticket_key(&prefix, counter as u32);
    tracing::debug!("Allocated key {} on board {}", key, board_id);
    Ok(key)
}

/// Next `PARENT.n` under `parent_id`. Ordinals come from the parent's own
/// counter, so deleting a child never frees its ordinal.
pub(crate) async fn allocate_sub_ticket_key(
    conn: &mut SqliteConnection,
    parent_id: TicketId,
    max_depth: usize,
) -> TrackerResult<String> {
    let row = sqlx::query(
        "UPDATE tickets SET child_counter = child_counter + 1
         WHERE id = ? RETURNING key, child_counter",
    )
    .bind(parent_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or_else(|| TrackerError::not_found("Ticket", parent_id))?;

    let parent_key: String = row.try_get("key").map_err(db_err)?;
    let ordinal: i64 = row.try_get("child_counter").map_err(db_err)?;
    let key = sub_ticket_key(&parent_key, ordinal as u32);

    if parse_key(&key)?.depth() > max_depth {
        return Err(TrackerError::InvalidState(format!(
            "Sub-ticket {} would exceed the nesting limit of {}",
            key, max_depth
        )));
    }

    tracing::debug!("Allocated sub-ticket key {} under {}", key, parent_id);
    Ok(key)
}
