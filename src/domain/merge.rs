//! Remote-wins merge of inbound board payloads
//!
//! An inbound payload carries any subset of the board's top-level fields.
//! Each field that is present replaces the local value wholesale; absent
//! fields are kept. There is no field-level reconciliation inside lists or
//! tasks, so local edits made since the last push can be discarded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::board::{BoardSnapshot, Member};
use super::id::{BoardId, ListId, TaskId, UserId};
use super::list::List;
use super::task::Task;

/// A partial board as delivered by the live channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBoard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BoardId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Member>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_ids: Option<Vec<ListId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lists: Option<BTreeMap<ListId, List>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<BTreeMap<TaskId, Task>>,
}

impl From<BoardSnapshot> for RemoteBoard {
    fn from(snap: BoardSnapshot) -> Self {
        Self {
            id: Some(snap.id),
            title: Some(snap.title),
            background: Some(snap.background),
            owner_id: snap.owner_id,
            members: Some(snap.members),
            list_ids: Some(snap.list_ids),
            created_at: Some(snap.created_at),
            lists: Some(snap.lists),
            tasks: Some(snap.tasks),
        }
    }
}

impl RemoteBoard {
    /// Returns true if the payload carries no fields at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of merging an inbound payload into a local snapshot
#[derive(Debug)]
pub struct MergeResult {
    /// The merged and normalized snapshot
    pub snapshot: BoardSnapshot,

    /// Which fields came from the inbound payload
    pub replaced_fields: Vec<&'static str>,

    /// Whether the merged snapshot differs from the local one
    pub changed: bool,

    /// Sequence entries dropped because the merged fields disagreed
    /// (e.g. `listIds` naming a list the payload's `lists` no longer has)
    pub repaired: usize,
}

/// Replaces every field present in `remote`, then normalizes the result so
/// the board and list sequences only name entities that exist, once each.
///
/// The board id is never replaced; callers decide what to do with a payload
/// naming a different board.
pub fn merge_remote(local: &BoardSnapshot, remote: &RemoteBoard) -> MergeResult {
    let mut merged = local.clone();
    let mut replaced_fields = Vec::new();

    macro_rules! take_field {
        ($field:ident, $name:expr) => {
            if let Some(value) = &remote.$field {
                merged.$field = value.clone();
                replaced_fields.push($name);
            }
        };
    }

    take_field!(title, "title");
    take_field!(background, "background");
    take_field!(members, "members");
    take_field!(list_ids, "listIds");
    take_field!(created_at, "createdAt");
    take_field!(lists, "lists");
    take_field!(tasks, "tasks");

    if let Some(owner) = &remote.owner_id {
        merged.owner_id = Some(owner.clone());
        replaced_fields.push("ownerId");
    }

    let repaired = merged.normalize();
    let changed = merged != *local;

    MergeResult {
        snapshot: merged,
        replaced_fields,
        changed,
        repaired,
    }
}
