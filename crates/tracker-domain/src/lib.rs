pub mod access;
pub mod board;
pub mod field_update;
pub mod hierarchy;
pub mod key;
pub mod member;
pub mod operations;
pub mod placement;
pub mod sprint;
pub mod ticket;
pub mod validation;

pub use access::{authorize, require_min_role, Action};
pub use board::{Backlog, BacklogId, Board, BoardHierarchy, BoardId, BoardUpdate, NewBoard};
pub use field_update::FieldUpdate;
pub use hierarchy::{ensure_no_cycle, WalkGuard, WalkStep};
pub use member::{BoardMember, Role, UserId};
pub use operations::{TicketQuery, TrackerOperations};
pub use placement::Placement;
pub use sprint::{
    CompletionPolicy, NewSprint, Sprint, SprintId, SprintStatus, SprintTransition, SprintUpdate,
};
pub use ticket::{NewTicket, Ticket, TicketId, TicketPriority, TicketStatus, TicketUpdate};
