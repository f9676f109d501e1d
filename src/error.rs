//! Error taxonomy for the board core
//!
//! - [`ValidationError`]: rejected synchronously, store left unchanged.
//! - [`SyncError`]: fetch/push/channel failure, surfaced as a notice.
//! - [`PermissionError`]: a remote authority refused the action.
//!
//! None of these is fatal; every failure is recoverable at the command
//! boundary.

use thiserror::Error;

use crate::domain::{BoardId, ListId, TaskId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Index {index} out of range for {container} (length {len})")]
    IndexOutOfRange {
        container: String,
        index: usize,
        len: usize,
    },

    #[error("List not found: {0}")]
    UnknownList(ListId),

    #[error("Task not found: {0}")]
    UnknownTask(TaskId),

    #[error("No {kind} with id {id} on task {task}")]
    UnknownItem {
        task: TaskId,
        kind: &'static str,
        id: String,
    },

    #[error("New list {0} must start with an empty task sequence")]
    NonEmptyNewList(ListId),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("No board is open")]
    NoActiveBoard,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to fetch board {board}: {reason}")]
    Fetch { board: BoardId, reason: String },

    #[error("Failed to push board {board}: {reason}")]
    Push { board: BoardId, reason: String },

    #[error("Live channel for board {board} failed: {reason}")]
    Channel { board: BoardId, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Permission denied on board {board} ({action}): {reason}")]
pub struct PermissionError {
    pub board: BoardId,
    pub action: &'static str,
    pub reason: String,
}

/// Any failure a session operation can report
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}
