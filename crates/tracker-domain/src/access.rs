//! Capability checks.
//!
//! Every entry point names the [`Action`] it performs; the action decides the
//! minimum [`Role`] and [`require_min_role`] compares it against the caller's
//! membership.

use tracker_core::{TrackerError, TrackerResult};

use crate::member::{BoardMember, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewBoard,
    CreateChildBoard,
    UpdateBoard,
    DeleteBoard,
    ManageMembers,
    ChangeMemberRole,
    MutateSprint,
    MutateTicket,
}

impl Action {
    pub fn min_role(self) -> Role {
        match self {
            Self::ViewBoard => Role::Viewer,
            Self::CreateChildBoard | Self::MutateSprint | Self::MutateTicket => Role::Member,
            Self::UpdateBoard | Self::ManageMembers => Role::Admin,
            Self::DeleteBoard | Self::ChangeMemberRole => Role::Owner,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::ViewBoard => "view this board",
            Self::CreateChildBoard => "create a child board",
            Self::UpdateBoard => "update this board",
            Self::DeleteBoard => "delete this board",
            Self::ManageMembers => "manage members",
            Self::ChangeMemberRole => "change member roles",
            Self::MutateSprint => "modify sprints",
            Self::MutateTicket => "modify tickets",
        }
    }
}

pub fn require_min_role(membership: &BoardMember, minimum: Role) -> TrackerResult<()> {
    if membership.role.at_least(minimum) {
        Ok(())
    } else {
        Err(TrackerError::Forbidden(format!(
            "role {} is below required {} on board {}",
            membership.role, minimum, membership.board_id
        )))
    }
}

pub fn authorize(membership: &BoardMember, action: Action) -> TrackerResult<()> {
    require_min_role(membership, action.min_role()).map_err(|_| {
        TrackerError::Forbidden(format!(
            "{} may not {} (requires {})",
            membership.role,
            action.describe(),
            action.min_role()
        ))
    })
}
