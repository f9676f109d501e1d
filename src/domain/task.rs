//! Task domain model
//!
//! Tasks are the cards on a board. Each task belongs to exactly one list and
//! owns its labels, checklist, comments and attachments outright.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AttachmentId, ChecklistItemId, CommentId, LabelId, ListId, TaskId, UserId};

/// A colored label attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub text: String,
    pub color: String,
}

/// A single checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub text: String,
    #[serde(default)]
    pub is_completed: bool,
}

/// A file attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    pub url: String,

    /// MIME type as reported by the uploader
    #[serde(rename = "type")]
    pub mime_type: String,

    pub uploaded_at: DateTime<Utc>,
}

/// A comment left on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A task (card) on a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Owning list. Derived from list membership; the list sequence wins.
    pub list_id: ListId,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Assigned members (ordered, no duplicates)
    #[serde(default)]
    pub member_ids: Vec<UserId>,

    #[serde(default)]
    pub labels: Vec<Label>,

    /// Calendar due date
    #[serde(default, with = "due_date_format")]
    pub due_date: Option<NaiveDate>,

    /// Newest first
    #[serde(default)]
    pub comments: Vec<Comment>,

    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Tasks this task depends on (ordered, no duplicates)
    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    pub created_at: DateTime<Utc>,

    /// Zero-based index within the owning list's task sequence
    #[serde(default)]
    pub order: usize,
}

impl Task {
    /// Creates a task with empty collections
    pub fn new(
        id: TaskId,
        list_id: ListId,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            list_id,
            title: title.into(),
            description: String::new(),
            member_ids: Vec::new(),
            labels: Vec::new(),
            due_date: None,
            comments: Vec::new(),
            checklist: Vec::new(),
            attachments: Vec::new(),
            dependencies: Vec::new(),
            created_at,
            order: 0,
        }
    }

    /// Returns (completed, total) checklist counts
    pub fn checklist_progress(&self) -> (usize, usize) {
        let done = self.checklist.iter().filter(|c| c.is_completed).count();
        (done, self.checklist.len())
    }

    /// True when the checklist is empty or every item is completed.
    ///
    /// This is what gates dependents in the dependency graph.
    pub fn checklist_complete(&self) -> bool {
        self.checklist.iter().all(|c| c.is_completed)
    }

    /// Returns true if the task carries a label with this color
    pub fn has_label_color(&self, color: &str) -> bool {
        self.labels.iter().any(|l| l.color == color)
    }

    /// Returns true if the member is assigned
    pub fn has_member(&self, user: &UserId) -> bool {
        self.member_ids.contains(user)
    }

    /// Returns true if this task depends on `target`
    pub fn depends_on(&self, target: &TaskId) -> bool {
        self.dependencies.contains(target)
    }

    /// Adds the dependency if absent, removes it if present.
    ///
    /// Returns true if the task depends on `target` afterwards.
    pub fn toggle_dependency(&mut self, target: TaskId) -> bool {
        if let Some(pos) = self.dependencies.iter().position(|d| *d == target) {
            self.dependencies.remove(pos);
            false
        } else {
            self.dependencies.push(target);
            true
        }
    }

    /// Adds the member if absent, removes it if present
    pub fn toggle_member(&mut self, user: UserId) -> bool {
        if let Some(pos) = self.member_ids.iter().position(|m| *m == user) {
            self.member_ids.remove(pos);
            false
        } else {
            self.member_ids.push(user);
            true
        }
    }

    /// Removes every label of this color, or adds a new one if none exists
    pub fn toggle_label(&mut self, id: LabelId, color: &str, text: impl Into<String>) -> bool {
        if self.has_label_color(color) {
            self.labels.retain(|l| l.color != color);
            false
        } else {
            self.labels.push(Label {
                id,
                text: text.into(),
                color: color.to_string(),
            });
            true
        }
    }
}

/// Due dates travel as `YYYY-MM-DD`; full RFC 3339 timestamps are accepted
/// on input and truncated to their calendar date.
mod due_date_format {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let raw = match raw.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(s) => s,
        };

        if let Ok(date) = NaiveDate::parse_from_str(raw, FORMAT) {
            return Ok(Some(date));
        }

        DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.date_naive()))
            .map_err(|_| serde::de::Error::custom(format!("invalid due date: {raw}")))
    }
}
