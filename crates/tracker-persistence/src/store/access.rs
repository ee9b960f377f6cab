use sqlx::SqliteConnection;
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{authorize, Action, BoardId, BoardMember};

use super::rows::row_to_member;
use super::sqlite_store::db_err;

/// Resolve the caller's membership on `board_id`. A missing board is
/// `NotFound`; an existing board without a membership row is `Forbidden`.
pub(crate) async fn verify_membership(
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
    .map_err(db_err)?;

    if let Some(row) = row {
        return row_to_member(&row);
    }

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM boards WHERE id = ?")
        .bind(board_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    match exists {
        Some(_) => Err(TrackerError::Forbidden(format!(
            "User '{}' is not a member of board {}",
            user_id, board_id
        ))),
        None => Err(TrackerError::not_found("Board", board_id)),
    }
}

/// Membership check plus the action's minimum role.
pub(crate) async fn guard(
    conn: &mut SqliteConnection,
    board_id: BoardId,
    user_id: &str,
    action: Action,
) -> TrackerResult<BoardMember> {
    let membership = verify_membership(conn, board_id, user_id).await?;
    authorize(&membership, action)?;
    Ok(membership)
}
