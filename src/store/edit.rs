//! Task edits
//!
//! The closed set of in-place edits the card editor can make to one task.
//! Structural changes (moving, deleting, dependencies) live on the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Attachment, AttachmentId, ChecklistItem, ChecklistItemId, Comment, CommentId, LabelId, Task,
    TaskId, UserId,
};
use super::unique_id;
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEdit {
    SetTitle {
        title: String,
    },
    SetDescription {
        description: String,
    },
    /// Removes every label of this color, or adds one. `text` defaults to the color.
    ToggleLabel {
        color: String,
        #[serde(default)]
        text: Option<String>,
    },
    ToggleMember {
        user_id: UserId,
    },
    SetDueDate {
        due_date: Option<NaiveDate>,
    },
    AddChecklistItem {
        text: String,
    },
    ToggleChecklistItem {
        item_id: ChecklistItemId,
    },
    RemoveChecklistItem {
        item_id: ChecklistItemId,
    },
    /// Comments are kept newest first
    AddComment {
        user_id: UserId,
        text: String,
    },
    AddAttachment {
        name: String,
        url: String,
        mime_type: String,
    },
    RemoveAttachment {
        attachment_id: AttachmentId,
    },
}

impl TaskEdit {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetTitle { .. } => "set_title",
            Self::SetDescription { .. } => "set_description",
            Self::ToggleLabel { .. } => "toggle_label",
            Self::ToggleMember { .. } => "toggle_member",
            Self::SetDueDate { .. } => "set_due_date",
            Self::AddChecklistItem { .. } => "add_checklist_item",
            Self::ToggleChecklistItem { .. } => "toggle_checklist_item",
            Self::RemoveChecklistItem { .. } => "remove_checklist_item",
            Self::AddComment { .. } => "add_comment",
            Self::AddAttachment { .. } => "add_attachment",
            Self::RemoveAttachment { .. } => "remove_attachment",
        }
    }

    /// Applies the edit to a task. On error the task is left untouched.
    pub(crate) fn apply(&self, task: &mut Task, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let task_id = task.id.clone();
        match self {
            Self::SetTitle { title } => {
                task.title = non_empty(title, "Task title")?;
            }
            Self::SetDescription { description } => {
                task.description = description.clone();
            }
            Self::ToggleLabel { color, text } => {
                let color = non_empty(color, "Label color")?;
                let text = text.clone().unwrap_or_else(|| color.clone());
                let id = unique_id(
                    |id| task.labels.iter().any(|l| l.id == *id),
                    |ts| LabelId::generate(&color, ts),
                    now,
                );
                task.toggle_label(id, &color, text);
            }
            Self::ToggleMember { user_id } => {
                task.toggle_member(user_id.clone());
            }
            Self::SetDueDate { due_date } => {
                task.due_date = *due_date;
            }
            Self::AddChecklistItem { text } => {
                let text = non_empty(text, "Checklist item")?;
                let id = unique_id(
                    |id| task.checklist.iter().any(|i| i.id == *id),
                    |ts| ChecklistItemId::generate(&text, ts),
                    now,
                );
                task.checklist.push(ChecklistItem {
                    id,
                    text,
                    is_completed: false,
                });
            }
            Self::ToggleChecklistItem { item_id } => {
                let item = task
                    .checklist
                    .iter_mut()
                    .find(|i| i.id == *item_id)
                    .ok_or_else(|| unknown(task_id, "checklist item", item_id.as_str()))?;
                item.is_completed = !item.is_completed;
            }
            Self::RemoveChecklistItem { item_id } => {
                let pos = task
                    .checklist
                    .iter()
                    .position(|i| i.id == *item_id)
                    .ok_or_else(|| unknown(task_id, "checklist item", item_id.as_str()))?;
                task.checklist.remove(pos);
            }
            Self::AddComment { user_id, text } => {
                let text = non_empty(text, "Comment")?;
                let id = unique_id(
                    |id| task.comments.iter().any(|c| c.id == *id),
                    |ts| CommentId::generate(&text, ts),
                    now,
                );
                task.comments.insert(
                    0,
                    Comment {
                        id,
                        user_id: user_id.clone(),
                        text,
                        created_at: now,
                    },
                );
            }
            Self::AddAttachment {
                name,
                url,
                mime_type,
            } => {
                let name = non_empty(name, "Attachment name")?;
                let id = unique_id(
                    |id| task.attachments.iter().any(|a| a.id == *id),
                    |ts| AttachmentId::generate(&name, ts),
                    now,
                );
                task.attachments.push(Attachment {
                    id,
                    name,
                    url: url.clone(),
                    mime_type: mime_type.clone(),
                    uploaded_at: now,
                });
            }
            Self::RemoveAttachment { attachment_id } => {
                let pos = task
                    .attachments
                    .iter()
                    .position(|a| a.id == *attachment_id)
                    .ok_or_else(|| unknown(task_id, "attachment", attachment_id.as_str()))?;
                task.attachments.remove(pos);
            }
        }
        Ok(())
    }
}

fn non_empty(value: &str, what: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(what));
    }
    Ok(trimmed.to_string())
}

fn unknown(task: TaskId, kind: &'static str, id: &str) -> ValidationError {
    ValidationError::UnknownItem {
        task,
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::*;

    fn task() -> Task {
        Task::new(tid("A"), lid("L1"), "A", ts())
    }

    fn user(s: &str) -> UserId {
        s.parse().unwrap()
    }

    #[test]
    fn empty_title_is_rejected_and_task_kept() {
        let mut t = task();
        let err = TaskEdit::SetTitle {
            title: "   ".to_string(),
        }
        .apply(&mut t, ts())
        .unwrap_err();

        assert_eq!(err, ValidationError::Empty("Task title"));
        assert_eq!(t.title, "A");
    }

    #[test]
    fn comments_are_newest_first() {
        let mut t = task();
        for text in ["first", "second"] {
            TaskEdit::AddComment {
                user_id: user("u1"),
                text: text.to_string(),
            }
            .apply(&mut t, ts())
            .unwrap();
        }

        let texts: Vec<&str> = t.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[test]
    fn checklist_lifecycle() {
        let mut t = task();
        TaskEdit::AddChecklistItem {
            text: "write tests".to_string(),
        }
        .apply(&mut t, ts())
        .unwrap();
        let item_id = t.checklist[0].id.clone();

        TaskEdit::ToggleChecklistItem {
            item_id: item_id.clone(),
        }
        .apply(&mut t, ts())
        .unwrap();
        assert!(t.checklist_complete());

        TaskEdit::RemoveChecklistItem { item_id }
            .apply(&mut t, ts())
            .unwrap();
        assert!(t.checklist.is_empty());
    }

    #[test]
    fn same_text_items_get_distinct_ids() {
        let mut t = task();
        for _ in 0..2 {
            TaskEdit::AddChecklistItem {
                text: "draft".to_string(),
            }
            .apply(&mut t, ts())
            .unwrap();
        }
        assert_ne!(t.checklist[0].id, t.checklist[1].id);

        TaskEdit::ToggleChecklistItem {
            item_id: t.checklist[1].id.clone(),
        }
        .apply(&mut t, ts())
        .unwrap();
        let completed: Vec<bool> = t.checklist.iter().map(|i| i.is_completed).collect();
        assert_eq!(completed, vec![false, true]);

        TaskEdit::RemoveChecklistItem {
            item_id: t.checklist[1].id.clone(),
        }
        .apply(&mut t, ts())
        .unwrap();
        assert_eq!(t.checklist.len(), 1);
        assert!(!t.checklist[0].is_completed);
    }

    #[test]
    fn same_text_comments_and_attachments_get_distinct_ids() {
        let mut t = task();
        for _ in 0..2 {
            TaskEdit::AddComment {
                user_id: user("u1"),
                text: "ping".to_string(),
            }
            .apply(&mut t, ts())
            .unwrap();
            TaskEdit::AddAttachment {
                name: "notes.txt".to_string(),
                url: "https://files.example/notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
            }
            .apply(&mut t, ts())
            .unwrap();
        }

        assert_ne!(t.comments[0].id, t.comments[1].id);
        assert_ne!(t.attachments[0].id, t.attachments[1].id);

        TaskEdit::RemoveAttachment {
            attachment_id: t.attachments[1].id.clone(),
        }
        .apply(&mut t, ts())
        .unwrap();
        assert_eq!(t.attachments.len(), 1);
    }

    #[test]
    fn unknown_checklist_item_is_reported() {
        let mut t = task();
        let err = TaskEdit::ToggleChecklistItem {
            item_id: "item-missing".parse().unwrap(),
        }
        .apply(&mut t, ts())
        .unwrap_err();

        assert!(matches!(
            err,
            ValidationError::UnknownItem {
                kind: "checklist item",
                ..
            }
        ));
    }

    #[test]
    fn toggle_label_defaults_text_to_color() {
        let mut t = task();
        TaskEdit::ToggleLabel {
            color: "green".to_string(),
            text: None,
        }
        .apply(&mut t, ts())
        .unwrap();

        assert_eq!(t.labels[0].text, "green");
        assert!(t.labels[0].id.as_str().starts_with("l-"));
    }

    #[test]
    fn attachments_add_and_remove() {
        let mut t = task();
        TaskEdit::AddAttachment {
            name: "design.pdf".to_string(),
            url: "https://files.example/design.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
        }
        .apply(&mut t, ts())
        .unwrap();
        let id = t.attachments[0].id.clone();

        TaskEdit::RemoveAttachment { attachment_id: id }
            .apply(&mut t, ts())
            .unwrap();
        assert!(t.attachments.is_empty());
    }

    #[test]
    fn edit_wire_format() {
        let edit: TaskEdit =
            serde_json::from_str(r#"{"type":"set_due_date","due_date":"2024-06-01"}"#).unwrap();
        assert_eq!(
            edit,
            TaskEdit::SetDueDate {
                due_date: NaiveDate::from_ymd_opt(2024, 6, 1)
            }
        );
        assert_eq!(edit.kind(), "set_due_date");
    }
}
