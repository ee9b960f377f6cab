use crate::cli::{SprintAction, SprintUpdateArgs};
use crate::context::CliContext;
use crate::output;
use tracker_core::TrackerResult;
use tracker_domain::{CompletionPolicy, FieldUpdate, NewSprint, SprintUpdate, TrackerOperations};

pub async fn handle(ctx: &CliContext, action: SprintAction) -> TrackerResult<()> {
    let store = &ctx.store;
    let actor = ctx.actor();
    match action {
        SprintAction::Create {
            board_id,
            name,
            goal,
            start_date,
            end_date,
            auto_start,
        } => {
            let transition = store
                .create_sprint(
                    actor,
                    board_id,
                    NewSprint {
                        name,
                        goal,
                        start_date,
                        end_date,
                        auto_start,
                    },
                )
                .await?;
            output::output_success(&transition);
        }
        SprintAction::List { board_id } => {
            output::output_list(store.list_sprints(actor, board_id).await?);
        }
        SprintAction::Get { id } => {
            output::output_success(store.get_sprint(actor, id).await?);
        }
        SprintAction::Current { board_id } => {
            output::output_success(store.get_current_sprint(actor, board_id).await?);
        }
        SprintAction::Start { id } => {
            output::output_success(store.start_sprint(actor, id).await?);
        }
        SprintAction::Complete {
            id,
            policy,
            target_sprint_id,
        } => {
            let policy = CompletionPolicy::parse(&policy, target_sprint_id)?;
            output::output_success(store.complete_sprint(actor, id, policy).await?);
        }
        SprintAction::Update(args) => {
            let id = args.id;
            output::output_success(store.update_sprint(actor, id, sprint_update(args)).await?);
        }
        SprintAction::Delete { id } => {
            store.delete_sprint(actor, id).await?;
            output::output_success(serde_json::json!({"deleted": id.to_string()}));
        }
    }
    Ok(())
}

fn sprint_update(args: SprintUpdateArgs) -> SprintUpdate {
    SprintUpdate {
        name: args.name,
        goal: FieldUpdate::from_flags(args.goal, args.clear_goal),
        start_date: args.start_date,
        end_date: args.end_date,
    }
}
