//! # Command-Line Interface
//!
//! A thin driver over [`BoardSession`](crate::session::BoardSession): each
//! invocation loads a board snapshot file, opens it through an in-memory
//! loopback server, applies one command and prints the result.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Board | Create and inspect boards | `new`, `show`, `check` |
//! | Lists | List lifecycle | `add-list`, `rename-list`, `rm-list`, `move-list` |
//! | Tasks | Task lifecycle | `add-task`, `edit`, `dup-task`, `rm-task`, `move-task` |
//! | Dependencies | Depends-on edges | `dep`, `satisfied` |
//! | View | Filtered view | `filter` |
//! | Sync | Inbound payloads | `merge` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Saving
//!
//! Mutations are kept in memory unless `--write` is given:
//! ```bash
//! taskboard --board board.json --write add-task list-1 "Write docs"
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod board_cmd;
mod board_file;
mod output;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
