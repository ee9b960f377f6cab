use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracker_domain::{Role, TicketPriority, TicketStatus};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Boards, backlogs, sprints and tickets from the terminal", long_about = None)]
#[command(
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TRACKER_BUILD_COMMIT"), ")")
)]
pub struct Cli {
    /// Path to the SQLite database (or set TRACKER_DATABASE env var)
    #[arg(long, global = true, value_name = "PATH", env = "TRACKER_DATABASE")]
    pub database: Option<PathBuf>,

    /// Acting user id (or set TRACKER_USER env var)
    #[arg(long, global = true, value_name = "ID", env = "TRACKER_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Board and membership operations
    Board(BoardCommand),
    /// Sprint operations
    Sprint(SprintCommand),
    /// Ticket operations
    Ticket(TicketCommand),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ())
                .and_then(|d| d.and_hms_opt(0, 0, 0).ok_or(()))
                .map(|dt| dt.and_utc())
        })
        .map_err(|_| {
            format!(
                "Invalid date '{}'. Supported formats: YYYY-MM-DD or RFC 3339 (e.g., 2024-01-15T10:30:00Z)",
                s
            )
        })
}

// Board commands
#[derive(Args)]
pub struct BoardCommand {
    #[command(subcommand)]
    pub action: BoardAction,
}

#[derive(Subcommand)]
pub enum BoardAction {
    /// Create a new board (the caller becomes its owner)
    Create {
        #[arg(long)]
        name: String,
        /// Ticket key prefix, 1-5 uppercase letters
        #[arg(long)]
        prefix: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        parent_id: Option<Uuid>,
    },
    /// List boards the user is a member of
    List,
    /// Get a specific board
    Get {
        #[arg(long)]
        id: Uuid,
    },
    /// Update a board
    Update(BoardUpdateArgs),
    /// Delete a board with its backlog, sprints and tickets
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Show a board's backlog
    Backlog {
        #[arg(long)]
        id: Uuid,
    },
    /// List direct child boards
    Children {
        #[arg(long)]
        id: Uuid,
    },
    /// Show parent and direct children
    Hierarchy {
        #[arg(long)]
        id: Uuid,
    },
    /// List ancestors, root first
    Ancestors {
        #[arg(long)]
        id: Uuid,
    },
    /// List members
    Members {
        #[arg(long)]
        id: Uuid,
    },
    /// Add a member
    AddMember {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        user_id: String,
        /// VIEWER, MEMBER or ADMIN
        #[arg(long)]
        role: Role,
    },
    /// Remove a member
    RemoveMember {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        user_id: String,
    },
    /// Change a member's role
    SetRole {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        role: Role,
    },
}

#[derive(Args)]
pub struct BoardUpdateArgs {
    #[arg(long)]
    pub id: Uuid,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    /// Move the board under another board
    #[arg(long, conflicts_with = "detach")]
    pub parent_id: Option<Uuid>,
    /// Make the board a root board
    #[arg(long)]
    pub detach: bool,
}

// Sprint commands
#[derive(Args)]
pub struct SprintCommand {
    #[command(subcommand)]
    pub action: SprintAction,
}

#[derive(Subcommand)]
pub enum SprintAction {
    /// Create a sprint
    Create {
        #[arg(long)]
        board_id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long, value_parser = parse_datetime)]
        start_date: DateTime<Utc>,
        #[arg(long, value_parser = parse_datetime)]
        end_date: DateTime<Utc>,
        /// Start immediately, completing the active sprint and carrying over
        /// its unfinished tickets
        #[arg(long)]
        auto_start: bool,
    },
    /// List sprints for a board
    List {
        #[arg(long)]
        board_id: Uuid,
    },
    /// Get a specific sprint
    Get {
        #[arg(long)]
        id: Uuid,
    },
    /// Show the active sprint of a board
    Current {
        #[arg(long)]
        board_id: Uuid,
    },
    /// Start a planned sprint
    Start {
        #[arg(long)]
        id: Uuid,
    },
    /// Complete an active sprint
    Complete {
        #[arg(long)]
        id: Uuid,
        /// What happens to unfinished tickets: backlog, next-sprint or keep
        #[arg(long, default_value = "backlog")]
        policy: String,
        /// Target for the next-sprint policy
        #[arg(long)]
        target_sprint_id: Option<Uuid>,
    },
    /// Update a sprint
    Update(SprintUpdateArgs),
    /// Delete a sprint, returning its tickets to the backlog
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Args)]
pub struct SprintUpdateArgs {
    #[arg(long)]
    pub id: Uuid,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, conflicts_with = "clear_goal")]
    pub goal: Option<String>,
    #[arg(long)]
    pub clear_goal: bool,
    #[arg(long, value_parser = parse_datetime)]
    pub start_date: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_datetime)]
    pub end_date: Option<DateTime<Utc>>,
}

// Ticket commands
#[derive(Args)]
pub struct TicketCommand {
    #[command(subcommand)]
    pub action: TicketAction,
}

#[derive(Args)]
pub struct TicketFields {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<TicketStatus>,
    #[arg(long)]
    pub priority: Option<TicketPriority>,
    #[arg(long)]
    pub points: Option<u8>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long, conflicts_with = "sprint_id")]
    pub backlog_id: Option<Uuid>,
    #[arg(long)]
    pub sprint_id: Option<Uuid>,
}

#[derive(Subcommand)]
pub enum TicketAction {
    /// Create a ticket (defaults to the board backlog)
    Create {
        #[arg(long)]
        board_id: Uuid,
        #[arg(long)]
        parent_id: Option<Uuid>,
        #[command(flatten)]
        fields: TicketFields,
    },
    /// Create a sub-ticket in the parent's container
    Sub {
        #[arg(long)]
        parent_id: Uuid,
        #[command(flatten)]
        fields: TicketFields,
    },
    /// Get a specific ticket
    Get {
        #[arg(long)]
        id: Uuid,
    },
    /// List the tickets of a backlog or a sprint
    List {
        #[arg(long, conflicts_with = "sprint_id", required_unless_present = "sprint_id")]
        backlog_id: Option<Uuid>,
        #[arg(long)]
        sprint_id: Option<Uuid>,
    },
    /// List tickets of a board, optionally across its child boards
    Tree {
        #[arg(long)]
        board_id: Uuid,
        #[arg(long)]
        include_children: bool,
        #[arg(long, conflicts_with = "backlog_id")]
        sprint_id: Option<Uuid>,
        #[arg(long)]
        backlog_id: Option<Uuid>,
    },
    /// Update a ticket
    Update(TicketUpdateArgs),
    /// Move a ticket to a backlog or sprint
    Move {
        #[arg(long)]
        id: Uuid,
        #[arg(long, conflicts_with = "sprint_id", required_unless_present = "sprint_id")]
        backlog_id: Option<Uuid>,
        #[arg(long)]
        sprint_id: Option<Uuid>,
    },
    /// Set a ticket's manual rank
    Order {
        #[arg(long)]
        id: Uuid,
        #[arg(long, allow_hyphen_values = true)]
        order: i64,
    },
    /// Delete a ticket and its sub-tickets
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Args)]
pub struct TicketUpdateArgs {
    #[arg(long)]
    pub id: Uuid,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    #[arg(long)]
    pub status: Option<TicketStatus>,
    #[arg(long)]
    pub priority: Option<TicketPriority>,
    #[arg(long, conflicts_with = "clear_points")]
    pub points: Option<u8>,
    #[arg(long)]
    pub clear_points: bool,
    #[arg(long, conflicts_with = "clear_assignee")]
    pub assignee: Option<String>,
    #[arg(long)]
    pub clear_assignee: bool,
    #[arg(long, conflicts_with = "clear_parent")]
    pub parent_id: Option<Uuid>,
    #[arg(long)]
    pub clear_parent: bool,
    /// Passing both container ids is rejected as a validation error
    #[arg(long)]
    pub backlog_id: Option<Uuid>,
    #[arg(long)]
    pub sprint_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_datetime_formats() {
        let date = parse_datetime("2024-01-15").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-15T00:00:00+00:00");
        assert!(parse_datetime("2024-01-15T10:30:00Z").is_ok());
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn test_role_argument_parses_case_insensitively() {
        let cli = Cli::try_parse_from([
            "tracker", "board", "add-member", "--id",
            "00000000-0000-0000-0000-000000000001", "--user-id", "bob", "--role", "admin",
        ])
        .unwrap();
        match cli.command {
            Commands::Board(BoardCommand {
                action: BoardAction::AddMember { role, .. },
            }) => assert_eq!(role, Role::Admin),
            _ => panic!("expected add-member"),
        }
    }

    #[test]
    fn test_ticket_list_needs_a_container() {
        assert!(Cli::try_parse_from(["tracker", "ticket", "list"]).is_err());
        assert!(Cli::try_parse_from([
            "tracker", "ticket", "list", "--sprint-id",
            "00000000-0000-0000-0000-000000000001",
        ])
        .is_ok());
    }
}
