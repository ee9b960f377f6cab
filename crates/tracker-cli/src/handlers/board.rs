use crate::cli::{BoardAction, BoardUpdateArgs};
use crate::context::CliContext;
use crate::output;
use tracker_core::TrackerResult;
use tracker_domain::{BoardUpdate, FieldUpdate, NewBoard, TrackerOperations};

pub async fn handle(ctx: &CliContext, action: BoardAction) -> TrackerResult<()> {
    let store = &ctx.store;
    let actor = ctx.actor();
    match action {
        BoardAction::Create {
            name,
            prefix,
            color,
            description,
            parent_id,
        } => {
            let board = store
                .create_board(
                    actor,
                    NewBoard {
                        name,
                        prefix,
                        color,
                        description,
                        parent_board_id: parent_id,
                    },
                )
                .await?;
            output::output_success(&board);
        }
        BoardAction::List => {
            output::output_list(store.list_boards(actor).await?);
        }
        BoardAction::Get { id } => {
            output::output_success(store.get_board(actor, id).await?);
        }
        BoardAction::Update(args) => {
            let id = args.id;
            let board = store.update_board(actor, id, board_update(args)).await?;
            output::output_success(&board);
        }
        BoardAction::Delete { id } => {
            store.delete_board(actor, id).await?;
            output::output_success(serde_json::json!({"deleted": id.to_string()}));
        }
        BoardAction::Backlog { id } => {
            output::output_success(store.get_backlog(actor, id).await?);
        }
        BoardAction::Children { id } => {
            output::output_list(store.get_children(actor, id).await?);
        }
        BoardAction::Hierarchy { id } => {
            output::output_success(store.get_hierarchy(actor, id).await?);
        }
        BoardAction::Ancestors { id } => {
            output::output_list(store.get_ancestors(actor, id).await?);
        }
        BoardAction::Members { id } => {
            output::output_list(store.list_members(actor, id).await?);
        }
        BoardAction::AddMember { id, user_id, role } => {
            output::output_success(store.add_member(actor, id, &user_id, role).await?);
        }
        BoardAction::RemoveMember { id, user_id } => {
            store.remove_member(actor, id, &user_id).await?;
            output::output_success(serde_json::json!({
                "board_id": id.to_string(),
                "removed": user_id,
            }));
        }
        BoardAction::SetRole { id, user_id, role } => {
            output::output_success(store.update_member_role(actor, id, &user_id, role).await?);
        }
    }
    Ok(())
}

fn board_update(args: BoardUpdateArgs) -> BoardUpdate {
    BoardUpdate {
        name: args.name,
        color: args.color,
        description: FieldUpdate::from_flags(args.description, args.clear_description),
        parent_board_id: FieldUpdate::from_flags(args.parent_id, args.detach),
    }
}
