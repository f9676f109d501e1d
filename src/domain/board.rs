//! Board snapshot
//!
//! A [`BoardSnapshot`] is the complete denormalized board state at one
//! instant: board metadata, members, the ordered list sequence and the list
//! and task maps. It is also the wire format for fetch, push and inbound
//! live updates.
//!
//! Lists and tasks are kept in `BTreeMap`s so that two equal snapshots
//! serialize to identical bytes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BoardId, ListId, TaskId, UserId};
use super::list::List;
use super::task::Task;

/// Role of a board member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
    Viewer,
}

/// A user with access to the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
}

/// Complete board state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub id: BoardId,
    pub title: String,

    #[serde(default)]
    pub background: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,

    #[serde(default)]
    pub members: Vec<Member>,

    /// Authoritative list order
    #[serde(default)]
    pub list_ids: Vec<ListId>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub lists: BTreeMap<ListId, List>,

    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
}

/// A broken structural invariant, reported by [`BoardSnapshot::violations`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Board sequence names a list that is not in the list map
    MissingList(ListId),
    /// List id appears more than once in the board sequence
    DuplicateList(ListId),
    /// List sequence names a task that is not in the task map
    MissingTask { list: ListId, task: TaskId },
    /// Task appears in more than one sequence position
    DuplicateTask(TaskId),
    /// Task's `listId` disagrees with the sequence it sits in
    WrongList { task: TaskId, expected: ListId, actual: ListId },
    /// Task's cached `order` disagrees with its index
    WrongOrder { task: TaskId, expected: usize, actual: usize },
    /// List's cached `order` disagrees with its index
    WrongListOrder { list: ListId, expected: usize, actual: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingList(id) => write!(f, "board sequence references missing list {id}"),
            Self::DuplicateList(id) => write!(f, "list {id} appears more than once on the board"),
            Self::MissingTask { list, task } => {
                write!(f, "list {list} references missing task {task}")
            }
            Self::DuplicateTask(id) => write!(f, "task {id} appears more than once"),
            Self::WrongList {
                task,
                expected,
                actual,
            } => write!(f, "task {task} sits in {expected} but says {actual}"),
            Self::WrongOrder {
                task,
                expected,
                actual,
            } => write!(f, "task {task} has order {actual}, index is {expected}"),
            Self::WrongListOrder {
                list,
                expected,
                actual,
            } => write!(f, "list {list} has order {actual}, index is {expected}"),
        }
    }
}

impl BoardSnapshot {
    /// Creates an empty board
    pub fn new(
        id: BoardId,
        title: impl Into<String>,
        background: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            background: background.into(),
            owner_id: None,
            members: Vec::new(),
            list_ids: Vec::new(),
            created_at,
            lists: BTreeMap::new(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn list(&self, id: &ListId) -> Option<&List> {
        self.lists.get(id)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Lists in board order, skipping dangling ids
    pub fn ordered_lists(&self) -> impl Iterator<Item = &List> {
        self.list_ids.iter().filter_map(|id| self.lists.get(id))
    }

    /// Tasks of a list in list order, skipping dangling ids
    pub fn tasks_in<'a>(&'a self, list: &'a List) -> impl Iterator<Item = &'a Task> + 'a {
        list.task_ids.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Finds the list whose sequence currently holds the task
    pub fn owning_list(&self, task: &TaskId) -> Option<&List> {
        self.ordered_lists().find(|l| l.task_ids.contains(task))
    }

    /// Recomputes `order` and `listId` for every task in one list.
    ///
    /// Whole-sequence recompute: every member is rewritten, not just the
    /// ones that moved.
    pub(crate) fn reindex_list(&mut self, list_id: &ListId) {
        let Some(list) = self.lists.get(list_id) else {
            return;
        };
        for (index, task_id) in list.task_ids.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(task_id) {
                task.order = index;
                task.list_id = list_id.clone();
            }
        }
    }

    /// Recomputes every list's `order` from the board sequence
    pub(crate) fn reindex_lists(&mut self) {
        for (index, list_id) in self.list_ids.iter().enumerate() {
            if let Some(list) = self.lists.get_mut(list_id) {
                list.order = index;
            }
        }
    }

    /// Recomputes every derived field from the authoritative sequences.
    ///
    /// Entries the sequences cannot hold are dropped first: board entries
    /// naming a missing or already listed list, and list entries naming a
    /// missing or already placed task (first occurrence wins). Returns the
    /// number of entries dropped.
    pub fn normalize(&mut self) -> usize {
        let mut dropped = 0;

        let lists = &self.lists;
        let mut seen_lists = HashSet::new();
        let before = self.list_ids.len();
        self.list_ids
            .retain(|id| lists.contains_key(id) && seen_lists.insert(id.clone()));
        dropped += before - self.list_ids.len();

        let ids: Vec<ListId> = self.list_ids.clone();
        let tasks = &self.tasks;
        let mut placed = HashSet::new();
        for id in &ids {
            if let Some(list) = self.lists.get_mut(id) {
                let before = list.task_ids.len();
                list.task_ids
                    .retain(|t| tasks.contains_key(t) && placed.insert(t.clone()));
                dropped += before - list.task_ids.len();
            }
        }

        self.reindex_lists();
        for id in &ids {
            self.reindex_list(id);
        }
        dropped
    }

    /// Tasks present in the task map but not referenced by any list on the board
    pub fn orphaned_tasks(&self) -> Vec<TaskId> {
        let placed: HashSet<&TaskId> = self
            .ordered_lists()
            .flat_map(|l| l.task_ids.iter())
            .collect();

        self.tasks
            .keys()
            .filter(|id| !placed.contains(id))
            .cloned()
            .collect()
    }

    /// Checks the structural invariants and returns every violation found
    pub fn violations(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        let mut seen_lists = HashSet::new();
        let mut seen_tasks = HashSet::new();

        for (index, list_id) in self.list_ids.iter().enumerate() {
            if !seen_lists.insert(list_id) {
                out.push(InvariantViolation::DuplicateList(list_id.clone()));
                continue;
            }
            let Some(list) = self.lists.get(list_id) else {
                out.push(InvariantViolation::MissingList(list_id.clone()));
                continue;
            };
            if list.order != index {
                out.push(InvariantViolation::WrongListOrder {
                    list: list_id.clone(),
                    expected: index,
                    actual: list.order,
                });
            }

            for (pos, task_id) in list.task_ids.iter().enumerate() {
                if !seen_tasks.insert(task_id) {
                    out.push(InvariantViolation::DuplicateTask(task_id.clone()));
                    continue;
                }
                let Some(task) = self.tasks.get(task_id) else {
                    out.push(InvariantViolation::MissingTask {
                        list: list_id.clone(),
                        task: task_id.clone(),
                    });
                    continue;
                };
                if task.list_id != *list_id {
                    out.push(InvariantViolation::WrongList {
                        task: task_id.clone(),
                        expected: list_id.clone(),
                        actual: task.list_id.clone(),
                    });
                }
                if task.order != pos {
                    out.push(InvariantViolation::WrongOrder {
                        task: task_id.clone(),
                        expected: pos,
                        actual: task.order,
                    });
                }
            }
        }

        out
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small boards shared by unit tests across the crate

    use super::*;
    use chrono::TimeZone;

    pub fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    pub fn lid(s: &str) -> ListId {
        s.parse().unwrap()
    }

    pub fn tid(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    /// Builds a board from `(list, [tasks])` pairs, with derived fields normalized
    pub fn board(layout: &[(&str, &[&str])]) -> BoardSnapshot {
        let board_id: BoardId = "b1".parse().unwrap();
        let mut snap = BoardSnapshot::new(board_id.clone(), "Board", "blue", ts());
        for (list_name, tasks) in layout {
            let mut list = List::new(lid(list_name), board_id.clone(), *list_name);
            for t in tasks.iter() {
                list.task_ids.push(tid(t));
                snap.tasks
                    .insert(tid(t), Task::new(tid(t), lid(list_name), *t, ts()));
            }
            snap.list_ids.push(lid(list_name));
            snap.lists.insert(lid(list_name), list);
        }
        snap.normalize();
        snap
    }

    pub fn sequence(snap: &BoardSnapshot, list: &str) -> Vec<String> {
        snap.lists[&lid(list)]
            .task_ids
            .iter()
            .map(|t| t.to_string())
            .collect()
    }
}
