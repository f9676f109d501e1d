//! List (column) domain model

use serde::{Deserialize, Serialize};

use super::id::{BoardId, ListId, TaskId};

/// A list of tasks. `task_ids` is the authoritative task order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: ListId,
    pub board_id: BoardId,
    pub title: String,

    #[serde(default)]
    pub task_ids: Vec<TaskId>,

    /// Zero-based index within the board's list sequence
    #[serde(default)]
    pub order: usize,
}

impl List {
    /// Creates an empty list
    pub fn new(id: ListId, board_id: BoardId, title: impl Into<String>) -> Self {
        Self {
            id,
            board_id,
            title: title.into(),
            task_ids: Vec::new(),
            order: 0,
        }
    }

    /// Position of a task within this list
    pub fn position(&self, task: &TaskId) -> Option<usize> {
        self.task_ids.iter().position(|t| t == task)
    }

    /// Returns the number of tasks
    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    /// Returns true if the list holds no tasks
    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }
}
