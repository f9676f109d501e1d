//! Move engine
//!
//! Pure reordering of the board's list sequence and of task sequences,
//! as produced by drag-and-drop. [`apply`] never touches its input; it
//! returns either a new snapshot or [`MoveOutcome::Unchanged`].

use serde::{Deserialize, Serialize};

use super::board::BoardSnapshot;
use super::id::ListId;
use crate::error::ValidationError;

/// A single reordering operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveCommand {
    /// Reorder a list within the board
    ListMove {
        source_index: usize,
        dest_index: usize,
    },

    /// Move a task within a list or across lists
    TaskMove {
        source_list: ListId,
        dest_list: ListId,
        source_index: usize,
        dest_index: usize,
    },
}

/// Result of applying a move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The board changed
    Moved(BoardSnapshot),
    /// The item landed where it started; nothing to render or push
    Unchanged,
}

/// Applies a move to a snapshot.
///
/// A destination index at or past the end of the target sequence appends.
/// An out-of-range source index or an unknown list fails with a
/// [`ValidationError`].
pub fn apply(snapshot: &BoardSnapshot, command: &MoveCommand) -> Result<MoveOutcome, ValidationError> {
    match command {
        MoveCommand::ListMove {
            source_index,
            dest_index,
        } => move_list(snapshot, *source_index, *dest_index),
        MoveCommand::TaskMove {
            source_list,
            dest_list,
            source_index,
            dest_index,
        } => move_task(snapshot, source_list, dest_list, *source_index, *dest_index),
    }
}

fn move_list(
    snapshot: &BoardSnapshot,
    source_index: usize,
    dest_index: usize,
) -> Result<MoveOutcome, ValidationError> {
    let len = snapshot.list_ids.len();
    if source_index >= len {
        return Err(ValidationError::IndexOutOfRange {
            container: "board".to_string(),
            index: source_index,
            len,
        });
    }

    // After removal the sequence is one shorter; clamping to that length appends.
    let dest = dest_index.min(len - 1);
    if dest == source_index {
        return Ok(MoveOutcome::Unchanged);
    }

    let mut next = snapshot.clone();
    let id = next.list_ids.remove(source_index);
    next.list_ids.insert(dest, id);
    next.reindex_lists();

    Ok(MoveOutcome::Moved(next))
}

fn move_task(
    snapshot: &BoardSnapshot,
    source_list: &ListId,
    dest_list: &ListId,
    source_index: usize,
    dest_index: usize,
) -> Result<MoveOutcome, ValidationError> {
    let source = snapshot
        .list(source_list)
        .ok_or_else(|| ValidationError::UnknownList(source_list.clone()))?;
    let dest = snapshot
        .list(dest_list)
        .ok_or_else(|| ValidationError::UnknownList(dest_list.clone()))?;

    let source_len = source.task_ids.len();
    if source_index >= source_len {
        return Err(ValidationError::IndexOutOfRange {
            container: format!("list {}", source_list),
            index: source_index,
            len: source_len,
        });
    }

    let mut next = snapshot.clone();

    if source_list == dest_list {
        let dest_index = dest_index.min(source_len - 1);
        if dest_index == source_index {
            return Ok(MoveOutcome::Unchanged);
        }

        if let Some(list) = next.lists.get_mut(source_list) {
            let id = list.task_ids.remove(source_index);
            list.task_ids.insert(dest_index, id);
        }
        next.reindex_list(source_list);
        return Ok(MoveOutcome::Moved(next));
    }

    let dest_index = dest_index.min(dest.task_ids.len());

    let moved = match next.lists.get_mut(source_list) {
        Some(list) => list.task_ids.remove(source_index),
        None => return Err(ValidationError::UnknownList(source_list.clone())),
    };
    if let Some(list) = next.lists.get_mut(dest_list) {
        list.task_ids.insert(dest_index, moved.clone());
    }
    if let Some(task) = next.tasks.get_mut(&moved) {
        task.list_id = dest_list.clone();
    }

    next.reindex_list(source_list);
    next.reindex_list(dest_list);

    Ok(MoveOutcome::Moved(next))
}
