use serde::{Deserialize, Serialize};
use tracker_core::{TrackerError, TrackerResult};

use crate::board::BacklogId;
use crate::sprint::SprintId;

/// The single container a ticket lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "container", content = "id", rename_all = "snake_case")]
pub enum Placement {
    Backlog(BacklogId),
    Sprint(SprintId),
}

impl Placement {
    /// Combine the nullable column pair. `None` means the caller named no
    /// container.
    pub fn from_parts(
        backlog_id: Option<BacklogId>,
        sprint_id: Option<SprintId>,
    ) -> TrackerResult<Option<Self>> {
        match (backlog_id, sprint_id) {
            (Some(_), Some(_)) => Err(TrackerError::Validation(
                "A ticket can target either a backlog or a sprint, not both".to_string(),
            )),
            (Some(backlog), None) => Ok(Some(Self::Backlog(backlog))),
            (None, Some(sprint)) => Ok(Some(Self::Sprint(sprint))),
            (None, None) => Ok(None),
        }
    }

    pub fn backlog_id(self) -> Option<BacklogId> {
        match self {
            Self::Backlog(id) => Some(id),
            Self::Sprint(_) => None,
        }
    }

    pub fn sprint_id(self) -> Option<SprintId> {
        match self {
            Self::Sprint(id) => Some(id),
            Self::Backlog(_) => None,
        }
    }
}
