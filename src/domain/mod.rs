//! Domain models for the board
//!
//! Contains the board state model and the pure algorithms over it, without
//! any I/O or async concerns.

mod board;
mod filter;
mod graph;
mod id;
mod list;
mod merge;
pub mod moves;
mod task;

pub use board::{BoardSnapshot, InvariantViolation, Member, MemberRole};
pub use filter::{visible, FilterCriteria, FilterMemo, FilteredBoard, FilteredList};
pub use graph::DependencyGraph;
pub use id::{
    AttachmentId, BoardId, ChecklistItemId, CommentId, IdError, LabelId, ListId, TaskId, UserId,
};
pub use list::List;
pub use merge::{merge_remote, MergeResult, RemoteBoard};
pub use moves::{MoveCommand, MoveOutcome};
pub use task::{Attachment, ChecklistItem, Comment, Label, Task};

#[cfg(test)]
pub(crate) use board::fixtures;
