//! Identifiers for boards, lists, tasks and the items tasks own
//!
//! ID Format:
//! - IDs received from a remote snapshot are opaque, non-empty strings and
//!   are kept verbatim (e.g. `task-1718040000000`).
//! - Locally generated IDs are `{prefix}-{7-char-hash}` (e.g. `task-9d3e5f2`).
//!
//! Hash is derived from title + creation timestamp, so the same title at
//! different times produces different IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid {0} ID: must not be empty")]
    Empty(&'static str),

    #[error("Invalid {kind} ID '{value}': whitespace is not allowed")]
    Whitespace { kind: &'static str, value: String },
}

/// Generates a 7-character hash from title and timestamp
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", title, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Generates a fresh ID from a title and creation timestamp
            pub fn generate(title: &str, timestamp: DateTime<Utc>) -> Self {
                Self(format!("{}-{}", $prefix, generate_hash(title, timestamp)))
            }

            /// Returns the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.is_empty() {
                    return Err(IdError::Empty($kind));
                }
                if s.chars().any(char::is_whitespace) {
                    return Err(IdError::Whitespace {
                        kind: $kind,
                        value: s.to_string(),
                    });
                }
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id!(
    /// Board ID
    BoardId, "board", "board"
);
string_id!(
    /// List (column) ID
    ListId, "list", "list"
);
string_id!(
    /// Task (card) ID
    TaskId, "task", "task"
);
string_id!(
    /// Board member ID
    UserId, "user", "user"
);
string_id!(
    /// Label ID, unique within its task
    LabelId, "label", "l"
);
string_id!(
    /// Checklist item ID, unique within its task
    ChecklistItemId, "checklist item", "item"
);
string_id!(
    /// Comment ID, unique within its task
    CommentId, "comment", "comment"
);
string_id!(
    /// Attachment ID, unique within its task
    AttachmentId, "attachment", "att"
);
