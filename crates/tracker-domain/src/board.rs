use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::field_update::FieldUpdate;

pub type BoardId = Uuid;
pub type BacklogId = Uuid;

pub const DEFAULT_BOARD_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub prefix: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_board_id: Option<BoardId>,
    #[serde(default)]
    pub ticket_counter: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(name: String, prefix: String, color: String, parent_board_id: Option<BoardId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            prefix,
            color,
            description: None,
            parent_board_id,
            ticket_counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_board_id.is_none()
    }

    /// Apply partial changes. Prefix and counter are never touched here:
    /// issued keys are derived from them.
    pub fn update(&mut self, updates: BoardUpdate) {
        if let Some(name) = updates.name {
            self.name = name;
        }
        if let Some(color) = updates.color {
            self.color = color;
        }
        updates.description.apply_to(&mut self.description);
        updates.parent_board_id.apply_to(&mut self.parent_board_id);
        self.updated_at = Utc::now();
    }
}

/// Partial update for Board
#[derive(Debug, Clone, Default)]
pub struct BoardUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: FieldUpdate<String>,
    pub parent_board_id: FieldUpdate<BoardId>,
}

impl BoardUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.color.is_none()
            && !self.description.is_change()
            && !self.parent_board_id.is_change()
    }
}

/// Input for creating a board.
#[derive(Debug, Clone, Default)]
pub struct NewBoard {
    pub name: String,
    pub prefix: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub parent_board_id: Option<BoardId>,
}

impl NewBoard {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn under(mut self, parent_board_id: BoardId) -> Self {
        self.parent_board_id = Some(parent_board_id);
        self
    }

    pub fn effective_color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_BOARD_COLOR)
    }
}

/// The single unplaced-ticket container of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlog {
    pub id: BacklogId,
    pub board_id: BoardId,
}

impl Backlog {
    pub fn new(board_id: BoardId) -> Self {
        Self {
            id: Uuid::new_v4(),
            board_id,
        }
    }
}

/// A board together with its immediate neighbours in the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardHierarchy {
    pub board: Board,
    pub parent: Option<Board>,
    pub children: Vec<Board>,
}
