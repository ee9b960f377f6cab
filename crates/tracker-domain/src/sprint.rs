use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracker_core::{TrackerError, TrackerResult};
use uuid::Uuid;

use crate::board::BoardId;
use crate::field_update::FieldUpdate;

pub type SprintId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
}

impl SprintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
        }
    }
}

impl FromStr for SprintStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLANNED" => Ok(Self::Planned),
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(TrackerError::Validation(format!(
                "Unknown sprint status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: SprintId,
    pub board_id: BoardId,
    pub number: u32,
    pub name: String,
    #[serde(default)]
    pub goal: Option<String>,
    pub status: SprintStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sprint {
    pub fn new(board_id: BoardId, number: u32, new: &NewSprint) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            board_id,
            number,
            name: new.name.clone(),
            goal: new.goal.clone(),
            status: if new.auto_start {
                SprintStatus::Active
            } else {
                SprintStatus::Planned
            },
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SprintStatus::Active
    }

    /// PLANNED -> ACTIVE
    pub fn ensure_can_start(&self) -> TrackerResult<()> {
        match self.status {
            SprintStatus::Planned => Ok(()),
            other => Err(TrackerError::InvalidState(format!(
                "Sprint {} is {} and cannot be started",
                self.number, other
            ))),
        }
    }

    /// ACTIVE -> COMPLETED
    pub fn ensure_can_complete(&self) -> TrackerResult<()> {
        match self.status {
            SprintStatus::Active => Ok(()),
            SprintStatus::Completed => Err(TrackerError::InvalidState(format!(
                "Sprint {} is already completed",
                self.number
            ))),
            SprintStatus::Planned => Err(TrackerError::InvalidState(format!(
                "Sprint {} has not been started",
                self.number
            ))),
        }
    }

    pub fn start(&mut self) -> TrackerResult<()> {
        self.ensure_can_start()?;
        self.status = SprintStatus::Active;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self) -> TrackerResult<()> {
        self.ensure_can_complete()?;
        self.status = SprintStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply partial changes; the resulting window must stay valid.
    pub fn update(&mut self, updates: SprintUpdate) -> TrackerResult<()> {
        let start = updates.start_date.unwrap_or(self.start_date);
        let end = updates.end_date.unwrap_or(self.end_date);
        crate::validation::validate_sprint_window(start, end)?;

        if let Some(name) = updates.name {
            self.name = name;
        }
        updates.goal.apply_to(&mut self.goal);
        self.start_date = start;
        self.end_date = end;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Input for creating a sprint.
#[derive(Debug, Clone)]
pub struct NewSprint {
    pub name: String,
    pub goal: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_start: bool,
}

/// Partial update struct for Sprint. Status is driven only by the
/// lifecycle operations.
#[derive(Debug, Clone, Default)]
pub struct SprintUpdate {
    pub name: Option<String>,
    pub goal: FieldUpdate<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// What happens to unfinished tickets when a sprint completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "target", rename_all = "kebab-case")]
pub enum CompletionPolicy {
    Backlog,
    NextSprint(SprintId),
    Keep,
}

impl CompletionPolicy {
    pub fn parse(policy: &str, target: Option<SprintId>) -> TrackerResult<Self> {
        match (policy.to_ascii_lowercase().as_str(), target) {
            ("backlog", None) => Ok(Self::Backlog),
            ("keep", None) => Ok(Self::Keep),
            ("next-sprint", Some(target)) => Ok(Self::NextSprint(target)),
            ("next-sprint", None) => Err(TrackerError::Validation(
                "next-sprint policy requires a target sprint".to_string(),
            )),
            ("backlog" | "keep", Some(_)) => Err(TrackerError::Validation(format!(
                "{} policy does not take a target sprint",
                policy
            ))),
            (other, _) => Err(TrackerError::Validation(format!(
                "Unknown completion policy '{}'. Use backlog, next-sprint or keep",
                other
            ))),
        }
    }
}

/// Outcome of a lifecycle operation that moves tickets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintTransition {
    pub sprint: Sprint,
    #[serde(default)]
    pub closed_sprint: Option<Sprint>,
    pub moved_ticket_count: usize,
}
