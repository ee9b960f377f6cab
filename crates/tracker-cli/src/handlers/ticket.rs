use crate::cli::{TicketAction, TicketFields, TicketUpdateArgs};
use crate::context::CliContext;
use crate::output;
use tracker_core::{TrackerError, TrackerResult};
use tracker_domain::{
    BacklogId, FieldUpdate, NewTicket, Placement, SprintId, TicketId, TicketQuery, TicketUpdate,
    TrackerOperations,
};

pub async fn handle(ctx: &CliContext, action: TicketAction) -> TrackerResult<()> {
    let store = &ctx.store;
    let actor = ctx.actor();
    match action {
        TicketAction::Create {
            board_id,
            parent_id,
            fields,
        } => {
            let ticket = store
                .create_ticket(actor, board_id, new_ticket(fields, parent_id))
                .await?;
            output::output_success(&ticket);
        }
        TicketAction::Sub { parent_id, fields } => {
            let ticket = store
                .create_sub_ticket(actor, parent_id, new_ticket(fields, None))
                .await?;
            output::output_success(&ticket);
        }
        TicketAction::Get { id } => {
            output::output_success(store.get_ticket(actor, id).await?);
        }
        TicketAction::List {
            backlog_id,
            sprint_id,
        } => {
            let tickets = match container(backlog_id, sprint_id)? {
                Placement::Sprint(sprint_id) => store.get_sprint_tickets(actor, sprint_id).await?,
                Placement::Backlog(backlog_id) => {
                    store.get_backlog_tickets(actor, backlog_id).await?
                }
            };
            output::output_list(tickets);
        }
        TicketAction::Tree {
            board_id,
            include_children,
            sprint_id,
            backlog_id,
        } => {
            let query = TicketQuery {
                board_id,
                include_child_boards: include_children,
                sprint_id,
                backlog_id,
            };
            output::output_list(store.get_tickets_with_hierarchy(actor, query).await?);
        }
        TicketAction::Update(args) => {
            let (id, updates) = ticket_update(args)?;
            output::output_success(store.update_ticket(actor, id, updates).await?);
        }
        TicketAction::Move {
            id,
            backlog_id,
            sprint_id,
        } => {
            let target = container(backlog_id, sprint_id)?;
            output::output_success(store.move_ticket(actor, id, target).await?);
        }
        TicketAction::Order { id, order } => {
            output::output_success(store.update_ticket_order(actor, id, order).await?);
        }
        TicketAction::Delete { id } => {
            store.delete_ticket(actor, id).await?;
            output::output_success(serde_json::json!({"deleted": id.to_string()}));
        }
    }
    Ok(())
}

/// Exactly one of the two flags must name the container.
fn container(
    backlog_id: Option<BacklogId>,
    sprint_id: Option<SprintId>,
) -> TrackerResult<Placement> {
    Placement::from_parts(backlog_id, sprint_id)?.ok_or_else(|| {
        TrackerError::Validation("Either --backlog-id or --sprint-id is required".into())
    })
}

fn new_ticket(fields: TicketFields, parent_id: Option<TicketId>) -> NewTicket {
    NewTicket {
        title: fields.title,
        description: fields.description,
        status: fields.status,
        priority: fields.priority,
        story_points: fields.points,
        assignee_id: fields.assignee,
        backlog_id: fields.backlog_id,
        sprint_id: fields.sprint_id,
        parent_id,
    }
}

fn ticket_update(args: TicketUpdateArgs) -> TrackerResult<(TicketId, TicketUpdate)> {
    let updates = TicketUpdate {
        title: args.title,
        description: FieldUpdate::from_flags(args.description, args.clear_description),
        status: args.status,
        priority: args.priority,
        story_points: FieldUpdate::from_flags(args.points, args.clear_points),
        assignee_id: FieldUpdate::from_flags(args.assignee, args.clear_assignee),
        parent_id: FieldUpdate::from_flags(args.parent_id, args.clear_parent),
        placement: None,
    }
    .with_container(args.backlog_id, args.sprint_id)?;
    Ok((args.id, updates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::ErrorKind;
    use uuid::Uuid;

    #[test]
    fn test_container_requires_one_flag() {
        let err = container(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let id = Uuid::new_v4();
        assert_eq!(container(None, Some(id)).unwrap(), Placement::Sprint(id));
        assert_eq!(container(Some(id), None).unwrap(), Placement::Backlog(id));
    }
}
