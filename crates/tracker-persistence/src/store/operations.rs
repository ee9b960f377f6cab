//! [`TrackerOperations`] over [`SqliteStore`].
//!
//! Input validation runs before a transaction is opened. Each mutation is a
//! single transaction: begin, run the component script, commit. Any `?`
//! drops the transaction and rolls it back.

use async_trait::async_trait;
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::validation::{
    validate_board_name, validate_prefix, validate_sprint_name, validate_sprint_window,
    validate_story_points, validate_title, validate_user_id,
};
use tracker_domain::{
    Action, Backlog, BacklogId, Board, BoardHierarchy, BoardId, BoardMember, BoardUpdate,
    CompletionPolicy, NewBoard, NewSprint, NewTicket, Placement, Role, Sprint, SprintId,
    SprintTransition, SprintUpdate, Ticket, TicketId, TicketQuery, TicketUpdate,
    TrackerOperations,
};

use super::access::guard;
use super::sqlite_store::{db_err, SqliteStore};
use super::{boards, sprints, tickets};

fn validate_new_ticket(ticket: &NewTicket) -> TrackerResult<()> {
    validate_title(&ticket.title)?;
    validate_story_points(ticket.story_points)?;
    ticket.requested_placement()?;
    Ok(())
}

fn validate_ticket_update(updates: &TicketUpdate) -> TrackerResult<()> {
    if let Some(ref title) = updates.title {
        validate_title(title)?;
    }
    validate_story_points(updates.story_points.set_value().copied())
}

fn validate_grantable(role: Role) -> TrackerResult<()> {
    if role == Role::Owner {
        return Err(TrackerError::Validation(
            "The OWNER role cannot be granted".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl TrackerOperations for SqliteStore {
    async fn create_board(&self, actor: &str, board: NewBoard) -> TrackerResult<Board> {
        validate_user_id(actor)?;
        validate_board_name(&board.name)?;
        validate_prefix(&board.prefix)?;

        let mut tx = self.begin().await?;
        let created = boards::create(&mut tx, actor, board).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Created board {} ({})", created.prefix, created.id);
        Ok(created)
    }

    async fn update_board(
        &self,
        actor: &str,
        id: BoardId,
        updates: BoardUpdate,
    ) -> TrackerResult<Board> {
        validate_user_id(actor)?;
        if let Some(ref name) = updates.name {
            validate_board_name(name)?;
        }

        let mut tx = self.begin().await?;
        let board =
            boards::update(&mut tx, actor, id, updates, self.options().max_hierarchy_depth).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Updated board {}", board.prefix);
        Ok(board)
    }

    async fn delete_board(&self, actor: &str, id: BoardId) -> TrackerResult<()> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        boards::delete(&mut tx, actor, id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Deleted board {}", id);
        Ok(())
    }

    async fn list_boards(&self, actor: &str) -> TrackerResult<Vec<Board>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        boards::list_for_user(&mut conn, actor).await
    }

    async fn get_board(&self, actor: &str, id: BoardId) -> TrackerResult<Board> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        let board = boards::fetch_board(&mut conn, id).await?;
        guard(&mut conn, id, actor, Action::ViewBoard).await?;
        Ok(board)
    }

    async fn get_backlog(&self, actor: &str, board_id: BoardId) -> TrackerResult<Backlog> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        boards::fetch_backlog(&mut conn, board_id).await
    }

    async fn get_children(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<Board>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        boards::children(&mut conn, board_id).await
    }

    async fn get_hierarchy(&self, actor: &str, board_id: BoardId) -> TrackerResult<BoardHierarchy> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        boards::hierarchy(&mut conn, board_id).await
    }

    async fn get_ancestors(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<Board>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        boards::ancestors(&mut conn, board_id, self.options().max_hierarchy_depth).await
    }

    async fn add_member(
        &self,
        actor: &str,
        board_id: BoardId,
        user_id: &str,
        role: Role,
    ) -> TrackerResult<BoardMember> {
        validate_user_id(actor)?;
        validate_user_id(user_id)?;
        validate_grantable(role)?;

        let mut tx = self.begin().await?;
        let member = boards::add_member(&mut tx, actor, board_id, user_id, role).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Added {} to board {} as {}", user_id, board_id, role);
        Ok(member)
    }

    async fn remove_member(&self, actor: &str, board_id: BoardId, user_id: &str) -> TrackerResult<()> {
        validate_user_id(actor)?;
        validate_user_id(user_id)?;

        let mut tx = self.begin().await?;
        boards::remove_member(&mut tx, actor, board_id, user_id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Removed {} from board {}", user_id, board_id);
        Ok(())
    }

    async fn update_member_role(
        &self,
        actor: &str,
        board_id: BoardId,
        user_id: &str,
        role: Role,
    ) -> TrackerResult<BoardMember> {
        validate_user_id(actor)?;
        validate_user_id(user_id)?;
        validate_grantable(role)?;

        let mut tx = self.begin().await?;
        let member = boards::update_member_role(&mut tx, actor, board_id, user_id, role).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Changed role of {} on board {} to {}", user_id, board_id, role);
        Ok(member)
    }

    async fn list_members(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<BoardMember>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        boards::list_members(&mut conn, board_id).await
    }

    async fn create_sprint(
        &self,
        actor: &str,
        board_id: BoardId,
        sprint: NewSprint,
    ) -> TrackerResult<SprintTransition> {
        validate_user_id(actor)?;
        validate_sprint_name(&sprint.name)?;
        validate_sprint_window(sprint.start_date, sprint.end_date)?;

        let mut tx = self.begin().await?;
        let transition = sprints::create(&mut tx, actor, board_id, sprint).await?;
        tx.commit().await.map_err(db_err)?;

        match transition.closed_sprint {
            Some(ref closed) => tracing::info!(
                "Opened sprint {} on board {}, closed sprint {} and moved {} tickets",
                transition.sprint.number,
                board_id,
                closed.number,
                transition.moved_ticket_count
            ),
            None => tracing::info!(
                "Opened sprint {} on board {}",
                transition.sprint.number,
                board_id
            ),
        }
        Ok(transition)
    }

    async fn start_sprint(&self, actor: &str, id: SprintId) -> TrackerResult<Sprint> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        let sprint = sprints::start(&mut tx, actor, id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Started sprint {} on board {}", sprint.number, sprint.board_id);
        Ok(sprint)
    }

    async fn complete_sprint(
        &self,
        actor: &str,
        id: SprintId,
        policy: CompletionPolicy,
    ) -> TrackerResult<SprintTransition> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        let transition = sprints::complete(&mut tx, actor, id, policy).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!(
            "Completed sprint {} on board {} ({:?}), moved {} tickets",
            transition.sprint.number,
            transition.sprint.board_id,
            policy,
            transition.moved_ticket_count
        );
        Ok(transition)
    }

    async fn update_sprint(
        &self,
        actor: &str,
        id: SprintId,
        updates: SprintUpdate,
    ) -> TrackerResult<Sprint> {
        validate_user_id(actor)?;
        if let Some(ref name) = updates.name {
            validate_sprint_name(name)?;
        }

        let mut tx = self.begin().await?;
        let sprint = sprints::update(&mut tx, actor, id, updates).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(sprint)
    }

    async fn delete_sprint(&self, actor: &str, id: SprintId) -> TrackerResult<()> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        let moved = sprints::delete(&mut tx, actor, id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Deleted sprint {}, returned {} tickets to the backlog", id, moved);
        Ok(())
    }

    async fn list_sprints(&self, actor: &str, board_id: BoardId) -> TrackerResult<Vec<Sprint>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        sprints::list(&mut conn, board_id).await
    }

    async fn get_current_sprint(
        &self,
        actor: &str,
        board_id: BoardId,
    ) -> TrackerResult<Option<Sprint>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, board_id, actor, Action::ViewBoard).await?;
        sprints::fetch_active(&mut conn, board_id).await
    }

    async fn get_sprint(&self, actor: &str, id: SprintId) -> TrackerResult<Sprint> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        let sprint = sprints::fetch_sprint(&mut conn, id).await?;
        guard(&mut conn, sprint.board_id, actor, Action::ViewBoard).await?;
        Ok(sprint)
    }

    async fn create_ticket(
        &self,
        actor: &str,
        board_id: BoardId,
        ticket: NewTicket,
    ) -> TrackerResult<Ticket> {
        validate_user_id(actor)?;
        validate_new_ticket(&ticket)?;

        let mut tx = self.begin().await?;
        let created = tickets::create(
            &mut tx,
            actor,
            board_id,
            ticket,
            self.options().max_hierarchy_depth,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Created ticket {}", created.key);
        Ok(created)
    }

    async fn create_sub_ticket(
        &self,
        actor: &str,
        parent_id: TicketId,
        ticket: NewTicket,
    ) -> TrackerResult<Ticket> {
        validate_user_id(actor)?;
        validate_new_ticket(&ticket)?;

        let mut tx = self.begin().await?;
        let created = tickets::create_sub(
            &mut tx,
            actor,
            parent_id,
            ticket,
            self.options().max_hierarchy_depth,
        )
        .await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Created sub-ticket {}", created.key);
        Ok(created)
    }

    async fn update_ticket(
        &self,
        actor: &str,
        id: TicketId,
        updates: TicketUpdate,
    ) -> TrackerResult<Ticket> {
        validate_user_id(actor)?;
        validate_ticket_update(&updates)?;

        let mut tx = self.begin().await?;
        let ticket =
            tickets::update(&mut tx, actor, id, updates, self.options().max_hierarchy_depth)
                .await?;
        tx.commit().await.map_err(db_err)?;
        Ok(ticket)
    }

    async fn move_ticket(&self, actor: &str, id: TicketId, target: Placement) -> TrackerResult<Ticket> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        let ticket = tickets::move_to(&mut tx, actor, id, target).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Moved ticket {} to {:?}", ticket.key, target);
        Ok(ticket)
    }

    async fn update_ticket_order(&self, actor: &str, id: TicketId, order: i64) -> TrackerResult<Ticket> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        let ticket = tickets::update_order(&mut tx, actor, id, order).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(ticket)
    }

    async fn delete_ticket(&self, actor: &str, id: TicketId) -> TrackerResult<()> {
        validate_user_id(actor)?;

        let mut tx = self.begin().await?;
        let removed = tickets::delete(&mut tx, actor, id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!("Deleted ticket {} ({} rows including sub-tickets)", id, removed);
        Ok(())
    }

    async fn get_ticket(&self, actor: &str, id: TicketId) -> TrackerResult<Ticket> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        let ticket = tickets::fetch_ticket(&mut conn, id).await?;
        guard(&mut conn, ticket.board_id, actor, Action::ViewBoard).await?;
        Ok(ticket)
    }

    async fn get_backlog_tickets(&self, actor: &str, backlog_id: BacklogId) -> TrackerResult<Vec<Ticket>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        let backlog = boards::fetch_backlog_by_id(&mut conn, backlog_id).await?;
        guard(&mut conn, backlog.board_id, actor, Action::ViewBoard).await?;
        tickets::by_backlog(&mut conn, backlog_id).await
    }

    async fn get_sprint_tickets(&self, actor: &str, sprint_id: SprintId) -> TrackerResult<Vec<Ticket>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        let sprint = sprints::fetch_sprint(&mut conn, sprint_id).await?;
        guard(&mut conn, sprint.board_id, actor, Action::ViewBoard).await?;
        tickets::by_sprint(&mut conn, sprint_id).await
    }

    async fn get_tickets_with_hierarchy(
        &self,
        actor: &str,
        query: TicketQuery,
    ) -> TrackerResult<Vec<Ticket>> {
        validate_user_id(actor)?;
        let mut conn = self.acquire().await?;
        guard(&mut conn, query.board_id, actor, Action::ViewBoard).await?;
        tickets::with_hierarchy(&mut conn, actor, query).await
    }
}
