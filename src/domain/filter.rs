//! Filtered board view
//!
//! Derives, for every list in board order, the subsequence of task ids
//! matching a [`FilterCriteria`]. The derivation is pure, so it can be
//! memoized on (snapshot identity, criteria, today); see [`FilterMemo`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::board::BoardSnapshot;
use super::id::{ListId, TaskId, UserId};
use super::task::Task;

/// What the user is filtering by. Active criteria combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Case-insensitive title substring; empty means inactive
    pub search: String,

    /// Match tasks carrying any of these label colors; empty means inactive
    pub label_colors: BTreeSet<String>,

    /// Match tasks assigned to any of these members; empty means inactive
    pub member_ids: BTreeSet<UserId>,

    /// Match tasks due within `[today, today + n]`, inclusive
    pub due_within_days: Option<u32>,
}

impl FilterCriteria {
    /// Criteria that only keep tasks due within `days` days
    pub fn due_within(days: u32) -> Self {
        Self {
            due_within_days: Some(days),
            ..Self::default()
        }
    }

    /// Returns true if no criterion is active
    pub fn is_inactive(&self) -> bool {
        self.search.is_empty()
            && self.label_colors.is_empty()
            && self.member_ids.is_empty()
            && self.due_within_days.is_none()
    }

    /// Number of active label, member and due-date selections
    pub fn active_count(&self) -> usize {
        self.label_colors.len() + self.member_ids.len() + usize::from(self.due_within_days.is_some())
    }

    /// Returns true if the task satisfies every active criterion
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        if self.is_inactive() {
            return true;
        }
        self.matches_search(task)
            && self.matches_labels(task)
            && self.matches_members(task)
            && self.matches_due(task, today)
    }

    fn matches_search(&self, task: &Task) -> bool {
        self.search.is_empty()
            || task
                .title
                .to_lowercase()
                .contains(&self.search.to_lowercase())
    }

    fn matches_labels(&self, task: &Task) -> bool {
        self.label_colors.is_empty()
            || self.label_colors.iter().any(|color| task.has_label_color(color))
    }

    fn matches_members(&self, task: &Task) -> bool {
        self.member_ids.is_empty() || self.member_ids.iter().any(|m| task.has_member(m))
    }

    fn matches_due(&self, task: &Task, today: NaiveDate) -> bool {
        let Some(days) = self.due_within_days else {
            return true;
        };
        let Some(due) = task.due_date else {
            return false;
        };
        let end = today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        due >= today && due <= end
    }
}

/// Visible tasks of one list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredList {
    pub list_id: ListId,
    pub task_ids: Vec<TaskId>,
}

/// Visible tasks of the whole board, lists in board order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilteredBoard {
    pub lists: Vec<FilteredList>,
}

impl FilteredBoard {
    /// Visible task ids for one list
    pub fn tasks_for(&self, list: &ListId) -> Option<&[TaskId]> {
        self.lists
            .iter()
            .find(|l| l.list_id == *list)
            .map(|l| l.task_ids.as_slice())
    }

    /// Total number of visible tasks
    pub fn total(&self) -> usize {
        self.lists.iter().map(|l| l.task_ids.len()).sum()
    }
}

/// Computes the visible subset of every list
pub fn visible(snapshot: &BoardSnapshot, criteria: &FilterCriteria, today: NaiveDate) -> FilteredBoard {
    let lists = snapshot
        .ordered_lists()
        .map(|list| FilteredList {
            list_id: list.id.clone(),
            task_ids: snapshot
                .tasks_in(list)
                .filter(|task| criteria.matches(task, today))
                .map(|task| task.id.clone())
                .collect(),
        })
        .collect();

    FilteredBoard { lists }
}

/// Single-entry cache for [`visible`]
#[derive(Debug, Default)]
pub struct FilterMemo {
    last: Option<MemoEntry>,
}

#[derive(Debug)]
struct MemoEntry {
    snapshot: Arc<BoardSnapshot>,
    criteria: FilterCriteria,
    today: NaiveDate,
    view: FilteredBoard,
}

impl FilterMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached view if snapshot identity, criteria and date match,
    /// otherwise recomputes it
    pub fn view(
        &mut self,
        snapshot: &Arc<BoardSnapshot>,
        criteria: &FilterCriteria,
        today: NaiveDate,
    ) -> &FilteredBoard {
        let hit = self.last.as_ref().is_some_and(|entry| {
            Arc::ptr_eq(&entry.snapshot, snapshot)
                && entry.criteria == *criteria
                && entry.today == today
        });

        if !hit {
            self.last = None;
        }

        let entry = self.last.get_or_insert_with(|| MemoEntry {
            snapshot: Arc::clone(snapshot),
            criteria: criteria.clone(),
            today,
            view: visible(snapshot, criteria, today),
        });
        &entry.view
    }

    /// Returns true if the last lookup can be served for this snapshot
    pub fn is_cached_for(&self, snapshot: &Arc<BoardSnapshot>) -> bool {
        self.last
            .as_ref()
            .is_some_and(|entry| Arc::ptr_eq(&entry.snapshot, snapshot))
    }
}
