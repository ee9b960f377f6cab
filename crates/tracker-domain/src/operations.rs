use async_trait::async_trait;
use tracker_core::TrackerResult;

use crate::{
    Backlog, BacklogId, Board, BoardHierarchy, BoardId, BoardMember, BoardUpdate,
    CompletionPolicy, NewBoard, NewSprint, NewTicket, Placement, Role, Sprint, SprintId,
    SprintTransition, SprintUpdate, Ticket, TicketId, TicketUpdate,
};

/// Filter for the board-hierarchy ticket view.
#[derive(Debug, Default, Clone)]
pub struct TicketQuery {
    pub board_id: BoardId,
    pub include_child_boards: bool,
    pub sprint_id: Option<SprintId>,
    pub backlog_id: Option<BacklogId>,
}

impl TicketQuery {
    pub fn for_board(board_id: BoardId) -> Self {
        Self {
            board_id,
            ..Default::default()
        }
    }
}

/// The operation catalog. Every call names the authenticated user it acts
/// for; membership and role checks happen behind this trait.
#[async_trait]
pub trait TrackerOperations {
    // Board operations
    async fn create_board(&self, actor: &str, board: NewBoard) -> TrackerResult<Board>;
    async fn update_board(&self, actor: &str, id: BoardId, updates: BoardUpdate)
        -> TrackerResult<Board>;
    async fn delete_board(&self, actor: &str, id: BoardId) -> TrackerResult<()>;
    async fn list_boards(&self, actor: &str) -> TrackerResult<Vec<Board>>;
    async fn get_board(&self, actor: &str, id: BoardId) -> TrackerResult<Board>;
    async fn get_backlog(&self, actor: &str, board_id: BoardId) -> TrackerResult<Backlog>;
    async fn get_children(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<Board>>;
    async fn get_hierarchy(&self, actor: &str, board_id: BoardId)
        -> TrackerResult<BoardHierarchy>;
    async fn get_ancestors(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<Board>>;

    // Membership operations
    async fn add_member(
        &self,
        actor: &str,
        board_id: BoardId,
        user_id: &str,
        role: Role,
    ) -> TrackerResult<BoardMember>;
    async fn remove_member(&self, actor: &str, board_id: BoardId, user_id: &str)
        -> TrackerResult<()>;
    async fn update_member_role(
        &self,
        actor: &str,
        board_id: BoardId,
        user_id: &str,
        role: Role,
    ) -> TrackerResult<BoardMember>;
    async fn list_members(&self, actor: &str, board_id: BoardId)
        -> TrackerResult<Vec<BoardMember>>;

    // Sprint operations
    async fn create_sprint(
        &self,
        actor: &str,
        board_id: BoardId,
        sprint: NewSprint,
    ) -> TrackerResult<SprintTransition>;
    async fn start_sprint(&self, actor: &str, id: SprintId) -> TrackerResult<Sprint>;
    async fn complete_sprint(
        &self,
        actor: &str,
        id: SprintId,
        policy: CompletionPolicy,
    ) -> TrackerResult<SprintTransition>;
    async fn update_sprint(&self, actor: &str, id: SprintId, updates: SprintUpdate)
        -> TrackerResult<Sprint>;
    async fn delete_sprint(&self, actor: &str, id: SprintId) -> TrackerResult<()>;
    async fn list_sprints(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<Sprint>>;
    async fn get_current_sprint(&self, actor: &str, board_id: BoardId)
        -> TrackerResult<Option<Sprint>>;
    async fn get_sprint(&self, actor: &str, id: SprintId) -> TrackerResult<Sprint>;

    // Ticket operations
    async fn create_ticket(&self, actor: &str, board_id: BoardId, ticket: NewTicket)
        -> TrackerResult<Ticket>;
    async fn create_sub_ticket(
        &self,
        actor: &str,
        parent_id: TicketId,
        ticket: NewTicket,
    ) -> TrackerResult<Ticket>;
    async fn update_ticket(&self, actor: &str, id: TicketId, updates: TicketUpdate)
        -> TrackerResult<Ticket>;
    async fn move_ticket(&self, actor: &str, id: TicketId, target: Placement)
        -> TrackerResult<Ticket>;
    async fn update_ticket_order(&self, actor: &str, id: TicketId, order: i64)
        -> TrackerResult<Ticket>;
    async fn delete_ticket(&self, actor: &str, id: TicketId) -> TrackerResult<()>;
    async fn get_ticket(&self, actor: &str, id: TicketId) -> TrackerResult<Ticket>;
    async fn get_backlog_tickets(&self, actor: &str, backlog_id: BacklogId)
        -> TrackerResult<Vec<Ticket>>;
    async fn get_sprint_tickets(&self, actor: &str, sprint_id: SprintId)
        -> TrackerResult<Vec<Ticket>>;
    async fn get_tickets_with_hierarchy(&self, actor: &str, query: TicketQuery)
        -> TrackerResult<Vec<Ticket>>;
}
