use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracker_core::{TrackerError, TrackerResult};
use uuid::Uuid;

use crate::board::{BacklogId, BoardId};
use crate::field_update::FieldUpdate;
use crate::member::UserId;
use crate::placement::Placement;
use crate::sprint::SprintId;

pub type TicketId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Todo,
    InProgress,
    InReview,
    Done,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Done => "DONE",
        }
    }

    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

impl FromStr for TicketStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "IN_REVIEW" => Ok(Self::InReview),
            "DONE" => Ok(Self::Done),
            other => Err(TrackerError::Validation(format!(
                "Unknown ticket status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl FromStr for TicketPriority {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            other => Err(TrackerError::Validation(format!(
                "Unknown ticket priority '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub key: String,
    pub board_id: BoardId,
    #[serde(default)]
    pub backlog_id: Option<BacklogId>,
    #[serde(default)]
    pub sprint_id: Option<SprintId>,
    #[serde(default)]
    pub parent_id: Option<TicketId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(default)]
    pub story_points: Option<u8>,
    pub order: i64,
    pub creator_id: UserId,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(
        key: String,
        board_id: BoardId,
        placement: Placement,
        new: &NewTicket,
        creator_id: UserId,
        order: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            board_id,
            backlog_id: placement.backlog_id(),
            sprint_id: placement.sprint_id(),
            parent_id: new.parent_id,
            title: new.title.clone(),
            description: new.description.clone(),
            status: new.status.unwrap_or(TicketStatus::Todo),
            priority: new.priority.unwrap_or(TicketPriority::Medium),
            story_points: new.story_points,
            order,
            creator_id,
            assignee_id: new.assignee_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn placement(&self) -> Option<Placement> {
        match (self.backlog_id, self.sprint_id) {
            (Some(backlog), None) => Some(Placement::Backlog(backlog)),
            (None, Some(sprint)) => Some(Placement::Sprint(sprint)),
            _ => None,
        }
    }

    /// Setting one container always clears the other.
    pub fn place(&mut self, placement: Placement) {
        self.backlog_id = placement.backlog_id();
        self.sprint_id = placement.sprint_id();
        self.updated_at = Utc::now();
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// Apply field changes. Placement and parent must already be validated
    /// against the other rows by the caller.
    pub fn apply(&mut self, updates: &TicketUpdate) {
        if let Some(ref title) = updates.title {
            self.title = title.clone();
        }
        updates.description.clone().apply_to(&mut self.description);
        if let Some(status) = updates.status {
            self.status = status;
        }
        if let Some(priority) = updates.priority {
            self.priority = priority;
        }
        updates.story_points.clone().apply_to(&mut self.story_points);
        updates.assignee_id.clone().apply_to(&mut self.assignee_id);
        updates.parent_id.clone().apply_to(&mut self.parent_id);
        if let Some(placement) = updates.placement {
            self.backlog_id = placement.backlog_id();
            self.sprint_id = placement.sprint_id();
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a ticket. `backlog_id` and `sprint_id` are mutually
/// exclusive; naming neither places the ticket in the board backlog.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub story_points: Option<u8>,
    pub assignee_id: Option<UserId>,
    pub backlog_id: Option<BacklogId>,
    pub sprint_id: Option<SprintId>,
    pub parent_id: Option<TicketId>,
}

impl NewTicket {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn requested_placement(&self) -> TrackerResult<Option<Placement>> {
        Placement::from_parts(self.backlog_id, self.sprint_id)
    }
}

/// Partial update for Ticket.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: FieldUpdate<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub story_points: FieldUpdate<u8>,
    pub assignee_id: FieldUpdate<UserId>,
    pub parent_id: FieldUpdate<TicketId>,
    pub placement: Option<Placement>,
}

impl TicketUpdate {
    /// Build the container part of an update from raw ids. Both present in
    /// one update is rejected.
    pub fn with_container(
        mut self,
        backlog_id: Option<BacklogId>,
        sprint_id: Option<SprintId>,
    ) -> TrackerResult<Self> {
        self.placement = Placement::from_parts(backlog_id, sprint_id)?;
        Ok(self)
    }
}
