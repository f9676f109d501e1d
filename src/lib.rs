//! taskboard - board state model and reconciliation engine for a kanban board
//!
//! A board is a snapshot of lists and tasks held in a [`store::NormalizedStore`].
//! Drag-and-drop moves, filtering and dependency tracking are pure functions
//! over snapshots; a [`session::BoardSession`] applies local commands
//! optimistically, pushes full snapshots to a remote collaborator and merges
//! inbound payloads from a live channel (remote wins).

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod session;
pub mod store;
pub mod sync;

pub use domain::{BoardId, BoardSnapshot, List, ListId, MoveCommand, Task, TaskId};
pub use error::{BoardError, PermissionError, SyncError, ValidationError};
pub use session::{BoardSession, SessionUpdate};
pub use store::{NormalizedStore, TaskEdit};
