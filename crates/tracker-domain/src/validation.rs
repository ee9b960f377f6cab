//! Input checks applied before any transaction is opened.

use chrono::{DateTime, Utc};
use tracker_core::{TrackerError, TrackerResult};

pub const MAX_PREFIX_LEN: usize = 5;
pub const MAX_BOARD_NAME_LEN: usize = 100;
pub const MAX_SPRINT_NAME_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_STORY_POINTS: u8 = 100;

/// `^[A-Z]{1,5}$`
pub fn validate_prefix(prefix: &str) -> TrackerResult<()> {
    let valid = !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LEN
        && prefix.chars().all(|c| c.is_ascii_uppercase());
    if valid {
        Ok(())
    } else {
        Err(TrackerError::Validation(format!(
            "Board prefix '{}' must be 1-{} uppercase letters",
            prefix, MAX_PREFIX_LEN
        )))
    }
}

fn validate_length(field: &str, value: &str, max: usize) -> TrackerResult<()> {
    let len = value.chars().count();
    if value.trim().is_empty() || len > max {
        return Err(TrackerError::Validation(format!(
            "{} must be 1-{} characters (got {})",
            field, max, len
        )));
    }
    Ok(())
}

pub fn validate_board_name(name: &str) -> TrackerResult<()> {
    validate_length("Board name", name, MAX_BOARD_NAME_LEN)
}

pub fn validate_sprint_name(name: &str) -> TrackerResult<()> {
    validate_length("Sprint name", name, MAX_SPRINT_NAME_LEN)
}

pub fn validate_title(title: &str) -> TrackerResult<()> {
    validate_length("Ticket title", title, MAX_TITLE_LEN)
}

pub fn validate_story_points(points: Option<u8>) -> TrackerResult<()> {
    match points {
        Some(p) if p > MAX_STORY_POINTS => Err(TrackerError::Validation(format!(
            "Story points must be between 0 and {} (got {})",
            MAX_STORY_POINTS, p
        ))),
        _ => Ok(()),
    }
}

pub fn validate_sprint_window(start: DateTime<Utc>, end: DateTime<Utc>) -> TrackerResult<()> {
    if end > start {
        Ok(())
    } else {
        Err(TrackerError::Validation(format!(
            "Sprint end date {} must be after start date {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )))
    }
}

pub fn validate_user_id(user_id: &str) -> TrackerResult<()> {
    if user_id.trim().is_empty() {
        Err(TrackerError::Validation("User id must not be empty".to_string()))
    } else {
        Ok(())
    }
}
