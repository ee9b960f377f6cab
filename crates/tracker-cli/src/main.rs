mod cli;
mod context;
mod handlers;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use context::CliContext;
use tracing_subscriber::EnvFilter;
use tracker_core::TrackerResult;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(log_path) = std::env::var("TRACKER_DEBUG_LOG") {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "tracker", &mut std::io::stdout());
        return Ok(());
    }

    if let Err(e) = run(cli).await {
        output::output_error(&e);
    }
    Ok(())
}

async fn run(cli: Cli) -> TrackerResult<()> {
    let ctx = CliContext::open(cli.database, cli.user)?;

    let result = match cli.command {
        Commands::Board(board_cmd) => handlers::board::handle(&ctx, board_cmd.action).await,
        Commands::Sprint(sprint_cmd) => handlers::sprint::handle(&ctx, sprint_cmd.action).await,
        Commands::Ticket(ticket_cmd) => handlers::ticket::handle(&ctx, ticket_cmd.action).await,
        Commands::Completions { .. } => Ok(()),
    };

    ctx.store.close().await;
    result
}
