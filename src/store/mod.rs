//! Normalized store
//!
//! The single source of truth for one board: a shared, immutable
//! [`BoardSnapshot`]. Every mutation builds a new snapshot and returns a new
//! store; readers holding the previous `Arc` keep a consistent view.
//!
//! Store identity is pointer identity of the shared snapshot, which is what
//! the filter memo keys on.

mod edit;

pub use edit::TaskEdit;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    moves, BoardId, BoardSnapshot, InvariantViolation, List, ListId, Member, MoveCommand,
    MoveOutcome, Task, TaskId,
};
use crate::error::ValidationError;

#[derive(Debug, Clone)]
pub struct NormalizedStore {
    snapshot: Arc<BoardSnapshot>,
}

impl NormalizedStore {
    /// Wraps a snapshot, recomputing its derived fields
    pub fn new(mut snapshot: BoardSnapshot) -> Self {
        snapshot.normalize();
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    fn with(snapshot: BoardSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// Shared, immutable view of the current state
    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn board_id(&self) -> &BoardId {
        &self.snapshot.id
    }

    /// True if both stores share the same snapshot allocation
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.snapshot, &other.snapshot)
    }

    fn draft(&self) -> BoardSnapshot {
        (*self.snapshot).clone()
    }

    /// Inserts or replaces a task.
    ///
    /// New tasks are appended to their list. A task whose `listId` changed
    /// leaves its old sequence and is appended to the new one. The incoming
    /// `order` is ignored and recomputed.
    pub fn upsert_task(&self, mut task: Task) -> Result<Self, ValidationError> {
        if task.title.trim().is_empty() {
            return Err(ValidationError::Empty("Task title"));
        }
        let target = task.list_id.clone();
        if !self.snapshot.lists.contains_key(&target) {
            return Err(ValidationError::UnknownList(target));
        }

        let mut next = self.draft();
        let current = next.owning_list(&task.id).map(|l| l.id.clone());

        match current {
            Some(ref old) if *old == target => {}
            Some(old) => {
                if let Some(list) = next.lists.get_mut(&old) {
                    list.task_ids.retain(|t| *t != task.id);
                }
                append(&mut next, &target, &task.id);
                next.reindex_list(&old);
            }
            None => append(&mut next, &target, &task.id),
        }

        task.order = 0;
        next.tasks.insert(task.id.clone(), task);
        next.reindex_list(&target);

        Ok(Self::with(next))
    }

    /// Inserts or updates a list.
    ///
    /// A new list must arrive empty and is appended to the board. An existing
    /// list keeps its tasks and position; only title and board id change.
    pub fn upsert_list(&self, list: List) -> Result<Self, ValidationError> {
        if list.title.trim().is_empty() {
            return Err(ValidationError::Empty("List title"));
        }

        let mut next = self.draft();
        match next.lists.get_mut(&list.id) {
            Some(existing) => {
                existing.title = list.title;
                existing.board_id = list.board_id;
            }
            None => {
                if !list.task_ids.is_empty() {
                    return Err(ValidationError::NonEmptyNewList(list.id));
                }
                next.list_ids.push(list.id.clone());
                next.lists.insert(list.id.clone(), list);
                next.reindex_lists();
            }
        }

        Ok(Self::with(next))
    }

    /// Removes a task from its list sequence and from the task map.
    ///
    /// Other tasks' dependencies on it are left in place.
    pub fn remove_task(&self, id: &TaskId) -> Result<Self, ValidationError> {
        if !self.snapshot.tasks.contains_key(id) {
            return Err(ValidationError::UnknownTask(id.clone()));
        }

        let mut next = self.draft();
        let affected: Vec<ListId> = next
            .lists
            .values()
            .filter(|l| l.task_ids.contains(id))
            .map(|l| l.id.clone())
            .collect();

        for list_id in &affected {
            if let Some(list) = next.lists.get_mut(list_id) {
                list.task_ids.retain(|t| t != id);
            }
            next.reindex_list(list_id);
        }
        next.tasks.remove(id);

        Ok(Self::with(next))
    }

    /// Removes a list from the board. Its tasks stay in the task map, orphaned.
    pub fn remove_list(&self, id: &ListId) -> Result<Self, ValidationError> {
        if !self.snapshot.lists.contains_key(id) {
            return Err(ValidationError::UnknownList(id.clone()));
        }

        let mut next = self.draft();
        next.list_ids.retain(|l| l != id);
        next.lists.remove(id);
        next.reindex_lists();

        Ok(Self::with(next))
    }

    /// Creates an empty task at the end of a list
    pub fn create_task(
        &self,
        list_id: &ListId,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<(Self, TaskId), ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::Empty("Task title"));
        }
        if !self.snapshot.lists.contains_key(list_id) {
            return Err(ValidationError::UnknownList(list_id.clone()));
        }

        let id = unique_id(
            |id| self.snapshot.tasks.contains_key(id),
            |ts| TaskId::generate(title, ts),
            now,
        );
        let task = Task::new(id.clone(), list_id.clone(), title, now);

        Ok((self.upsert_task(task)?, id))
    }

    /// Creates an empty list at the end of the board
    pub fn create_list(&self, title: &str, now: DateTime<Utc>) -> Result<(Self, ListId), ValidationError> {
        let title = title.trim();
        let id = unique_id(
            |id| self.snapshot.lists.contains_key(id),
            |ts| ListId::generate(title, ts),
            now,
        );
        let list = List::new(id.clone(), self.snapshot.id.clone(), title);

        Ok((self.upsert_list(list)?, id))
    }

    pub fn rename_list(&self, id: &ListId, title: &str) -> Result<Self, ValidationError> {
        let mut list = self
            .snapshot
            .list(id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownList(id.clone()))?;
        list.title = title.trim().to_string();
        self.upsert_list(list)
    }

    /// Inserts a copy of a task directly after it.
    ///
    /// The copy gets a fresh id, `suffix` appended to its title and no
    /// comments; everything else is copied.
    pub fn duplicate_task(
        &self,
        id: &TaskId,
        now: DateTime<Utc>,
        suffix: &str,
    ) -> Result<(Self, TaskId), ValidationError> {
        let original = self
            .snapshot
            .task(id)
            .ok_or_else(|| ValidationError::UnknownTask(id.clone()))?;
        let list = self
            .snapshot
            .owning_list(id)
            .ok_or_else(|| ValidationError::UnknownList(original.list_id.clone()))?;
        let position = list.position(id).unwrap_or(list.len());
        let list_id = list.id.clone();

        let mut copy = original.clone();
        copy.title = format!("{}{}", original.title, suffix);
        copy.id = unique_id(
            |id| self.snapshot.tasks.contains_key(id),
            |ts| TaskId::generate(&copy.title, ts),
            now,
        );
        copy.comments.clear();
        copy.created_at = now;
        let copy_id = copy.id.clone();

        let mut next = self.draft();
        if let Some(list) = next.lists.get_mut(&list_id) {
            list.task_ids.insert(position + 1, copy_id.clone());
        }
        next.tasks.insert(copy_id.clone(), copy);
        next.reindex_list(&list_id);

        Ok((Self::with(next), copy_id))
    }

    /// Applies an in-place edit to one task
    pub fn edit_task(&self, id: &TaskId, edit: &TaskEdit, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let mut next = self.draft();
        let task = next
            .tasks
            .get_mut(id)
            .ok_or_else(|| ValidationError::UnknownTask(id.clone()))?;
        edit.apply(task, now)?;

        Ok(Self::with(next))
    }

    /// Adds `target` to the task's dependencies if absent, removes it if present.
    ///
    /// Returns the new store and whether the dependency now exists. Self
    /// references and cycles are accepted.
    pub fn toggle_dependency(&self, task: &TaskId, target: &TaskId) -> Result<(Self, bool), ValidationError> {
        if !self.snapshot.tasks.contains_key(target) {
            return Err(ValidationError::UnknownTask(target.clone()));
        }

        let mut next = self.draft();
        let entry = next
            .tasks
            .get_mut(task)
            .ok_or_else(|| ValidationError::UnknownTask(task.clone()))?;
        let added = entry.toggle_dependency(target.clone());

        Ok((Self::with(next), added))
    }

    /// Adds a member to the board, replacing any member with the same id
    pub fn add_member(&self, member: Member) -> Self {
        let mut next = self.draft();
        match next.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => next.members.push(member),
        }
        Self::with(next)
    }

    /// Applies a move. Returns `None` when the item stays where it was.
    pub fn apply_move(&self, command: &MoveCommand) -> Result<Option<Self>, ValidationError> {
        match moves::apply(&self.snapshot, command)? {
            MoveOutcome::Moved(next) => Ok(Some(Self::with(next))),
            MoveOutcome::Unchanged => Ok(None),
        }
    }

    /// Replaces the whole snapshot. An equal snapshot keeps the current identity.
    pub fn replace(&self, snapshot: BoardSnapshot) -> Self {
        if snapshot == *self.snapshot {
            return self.clone();
        }
        Self::new(snapshot)
    }

    /// Tasks in the task map that no list on the board references
    pub fn orphaned_tasks(&self) -> Vec<TaskId> {
        self.snapshot.orphaned_tasks()
    }

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        self.snapshot.violations()
    }
}

fn append(snapshot: &mut BoardSnapshot, list_id: &ListId, task_id: &TaskId) {
    if let Some(list) = snapshot.lists.get_mut(list_id) {
        list.task_ids.push(task_id.clone());
    }
}

/// Generates an id for which `taken` is false, nudging the timestamp on collision
pub(crate) fn unique_id<K>(
    taken: impl Fn(&K) -> bool,
    make: impl Fn(DateTime<Utc>) -> K,
    now: DateTime<Utc>,
) -> K {
    let mut ts = now;
    loop {
        let id = make(ts);
        if !taken(&id) {
            return id;
        }
        ts += Duration::nanoseconds(1);
    }
}
