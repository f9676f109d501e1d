//! Main CLI application structure

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use super::board_cmd;
use super::board_file::{load_board, save_board};
use super::output::{Output, OutputFormat};
use crate::config::Config;
use crate::logging::{init_logging, LogLevel};
use crate::session::BoardSession;
use crate::sync::LoopbackServer;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(author, version, about = "Kanban board state engine")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Log level (overrides --verbose and TASKBOARD_LOG)
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Path to config.toml
    #[arg(long, global = true, env = "TASKBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Board snapshot file
    #[arg(long, short = 'b', global = true, env = "TASKBOARD_BOARD", default_value = "board.json")]
    pub board: PathBuf,

    /// Write the resulting board back to the board file
    #[arg(long, short = 'w', global = true)]
    pub write: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new, empty board file
    New {
        /// Board title
        title: String,

        /// Background color or image name
        #[arg(long, default_value = "indigo")]
        background: String,

        /// Overwrite an existing board file
        #[arg(long)]
        force: bool,
    },

    /// Show the board
    Show,

    /// Show tasks matching a filter
    ///
    /// Examples:
    ///   taskboard filter --search login
    ///   taskboard filter --label red --label blue
    ///   taskboard filter --due-soon --today 2024-05-10
    Filter {
        /// Case-insensitive title search
        #[arg(long, short)]
        search: Option<String>,

        /// Label color (repeatable, any match)
        #[arg(long)]
        label: Vec<String>,

        /// Member ID (repeatable, any match)
        #[arg(long)]
        member: Vec<String>,

        /// Only tasks due within the configured window
        #[arg(long)]
        due_soon: bool,

        /// Only tasks due within this many days
        #[arg(long, conflicts_with = "due_soon")]
        due_within: Option<u32>,

        /// Evaluate due dates against this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        today: Option<String>,
    },

    /// Move a list to another position
    MoveList {
        /// Current position
        from: usize,

        /// New position
        to: usize,
    },

    /// Move a task within a list or to another list
    ///
    /// Examples:
    ///   taskboard move-task list-1 0 2              # reorder within list-1
    ///   taskboard move-task list-1 0 1 --to list-2  # move to list-2
    MoveTask {
        /// Source list ID
        list: String,

        /// Position in the source list
        index: usize,

        /// Position in the destination list
        to_index: usize,

        /// Destination list ID (defaults to the source list)
        #[arg(long)]
        to: Option<String>,
    },

    /// Add a list at the end of the board
    AddList {
        /// List title
        title: String,
    },

    /// Add a task at the end of a list
    AddTask {
        /// List ID
        list: String,

        /// Task title
        title: String,
    },

    /// Rename a list
    RenameList {
        /// List ID
        list: String,

        /// New title
        title: String,
    },

    /// Remove a list (its tasks are orphaned)
    RmList {
        /// List ID
        list: String,
    },

    /// Remove a task
    RmTask {
        /// Task ID
        task: String,
    },

    /// Duplicate a task directly after the original
    DupTask {
        /// Task ID
        task: String,
    },

    /// Apply an edit to a task
    ///
    /// Example:
    ///   taskboard edit task-1 '{"type":"set_title","title":"Ship it"}'
    Edit {
        /// Task ID
        task: String,

        /// Edit as JSON
        edit: String,
    },

    /// Toggle a dependency between tasks
    Dep {
        /// Task that depends on the target
        task: String,

        /// Task it depends on
        target: String,
    },

    /// Show whether a task's dependencies are satisfied
    Satisfied {
        /// Task ID
        task: String,
    },

    /// Merge an inbound board payload (remote wins)
    Merge {
        /// JSON file with any subset of the board's top-level fields
        payload: PathBuf,
    },

    /// Check the board file's structural invariants
    Check,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let output = Output::new(cli.format.unwrap_or(config.output.default_format));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(execute(cli, config, &output))
}

async fn execute(cli: Cli, config: Config, output: &Output) -> Result<()> {
    match &cli.command {
        Commands::New {
            title,
            background,
            force,
        } => return board_cmd::new_board(output, &cli.board, title, background, *force),
        Commands::Check => return board_cmd::check(output, &load_board(&cli.board)?),
        _ => {}
    }

    let snapshot = load_board(&cli.board)?;
    let board_id = snapshot.id.clone();
    debug!(path = %cli.board.display(), board = %board_id, "loaded board file");

    let server = LoopbackServer::new();
    server.insert_board(snapshot);

    let mut session = BoardSession::new(Arc::new(server.clone()), server.clone(), config);
    session.open_board(&board_id).await?;

    let changed = board_cmd::run(cli.command, &mut session, &server, output).await?;

    session.settle().await;
    for notice in session.take_notices() {
        output.warning(&notice.to_string());
    }

    if changed {
        if cli.write {
            let snapshot = session.snapshot().context("No board is open")?;
            save_board(&cli.board, &snapshot)?;
            debug!(path = %cli.board.display(), "board written");
        } else {
            info!("board changed in memory only; pass --write to save it");
        }
    }

    Ok(())
}
