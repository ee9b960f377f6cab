use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{Backlog, Board, BoardMember, Sprint, Ticket};
use uuid::Uuid;

use super::sqlite_store::db_err;

pub(crate) const BOARD_COLUMNS: &str =
    "id, name, prefix, color, description, parent_board_id, ticket_counter, created_at, updated_at";

pub(crate) const SPRINT_COLUMNS: &str =
    "id, board_id, number, name, goal, status, start_date, end_date, created_at, updated_at";

pub(crate) const TICKET_COLUMNS: &str = "id, key, board_id, backlog_id, sprint_id, parent_id, \
     title, description, status, priority, story_points, position, creator_id, assignee_id, \
     created_at, updated_at";

pub(crate) fn parse_uuid(value: &str) -> TrackerResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| TrackerError::Serialization(format!("Invalid id '{}': {}", value, e)))
}

fn parse_opt_uuid(value: Option<String>) -> TrackerResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

fn parse_time(value: &str) -> TrackerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TrackerError::Serialization(format!("Invalid timestamp '{}': {}", value, e)))
}

fn text(row: &SqliteRow, column: &str) -> TrackerResult<String> {
    row.try_get::<String, _>(column).map_err(db_err)
}

fn opt_text(row: &SqliteRow, column: &str) -> TrackerResult<Option<String>> {
    row.try_get::<Option<String>, _>(column).map_err(db_err)
}

pub(crate) fn row_to_board(row: &SqliteRow) -> TrackerResult<Board> {
    Ok(Board {
        id: parse_uuid(&text(row, "id")?)?,
        name: text(row, "name")?,
        prefix: text(row, "prefix")?,
        color: text(row, "color")?,
        description: opt_text(row, "description")?,
        parent_board_id: parse_opt_uuid(opt_text(row, "parent_board_id")?)?,
        ticket_counter: row.try_get::<i64, _>("ticket_counter").map_err(db_err)? as u32,
        created_at: parse_time(&text(row, "created_at")?)?,
        updated_at: parse_time(&text(row, "updated_at")?)?,
    })
}

pub(crate) fn row_to_member(row: &SqliteRow) -> TrackerResult<BoardMember> {
    Ok(BoardMember {
        board_id: parse_uuid(&text(row, "board_id")?)?,
        user_id: text(row, "user_id")?,
        role: text(row, "role")?.parse()?,
        created_at: parse_time(&text(row, "created_at")?)?,
    })
}

pub(crate) fn row_to_backlog(row: &SqliteRow) -> TrackerResult<Backlog> {
    Ok(Backlog {
        id: parse_uuid(&text(row, "id")?)?,
        board_id: parse_uuid(&text(row, "board_id")?)?,
    })
}

pub(crate) fn row_to_sprint(row: &SqliteRow) -> TrackerResult<Sprint> {
    Ok(Sprint {
        id: parse_uuid(&text(row, "id")?)?,
        board_id: parse_uuid(&text(row, "board_id")?)?,
        number: row.try_get::<i64, _>("number").map_err(db_err)? as u32,
        name: text(row, "name")?,
        goal: opt_text(row, "goal")?,
        status: text(row, "status")?.parse()?,
        start_date: parse_time(&text(row, "start_date")?)?,
        end_date: parse_time(&text(row, "end_date")?)?,
        created_at: parse_time(&text(row, "created_at")?)?,
        updated_at: parse_time(&text(row, "updated_at")?)?,
    })
}

pub(crate) fn row_to_ticket(row: &SqliteRow) -> TrackerResult<Ticket> {
    Ok(Ticket {
        id: parse_uuid(&text(row, "id")?)?,
        key: text(row, "key")?,
        board_id: parse_uuid(&text(row, "board_id")?)?,
        backlog_id: parse_opt_uuid(opt_text(row, "backlog_id")?)?,
        sprint_id: parse_opt_uuid(opt_text(row, "sprint_id")?)?,
        parent_id: parse_opt_uuid(opt_text(row, "parent_id")?)?,
        title: text(row, "title")?,
        description: opt_text(row, "description")?,
        status: text(row, "status")?.parse()?,
        priority: text(row, "priority")?.parse()?,
        story_points: row
            .try_get::<Option<i64>, _>("story_points")
            .map_err(db_err)?
            .map(|p| p as u8),
        order: row.try_get::<i64, _>("position").map_err(db_err)?,
        creator_id: text(row, "creator_id")?,
        assignee_id: opt_text(row, "assignee_id")?,
        created_at: parse_time(&text(row, "created_at")?)?,
        updated_at: parse_time(&text(row, "updated_at")?)?,
    })
}

pub(crate) fn rows_to<T>(
    rows: &[SqliteRow],
    convert: fn(&SqliteRow) -> TrackerResult<T>,
) -> TrackerResult<Vec<T>> {
    rows.iter().map(convert).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        let err = parse_uuid("not-a-uuid").unwrap_err();
        assert!(matches!(err, TrackerError::Serialization(_)));
        assert!(parse_uuid(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn test_parse_time_roundtrips_rfc3339() {
        let now = Utc::now();
        let parsed = parse_time(&now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
        assert!(parse_time("yesterday").is_err());
    }
}
