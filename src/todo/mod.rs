//! Todo record model for flywheel.
//!
//! A store holds a JSON array of todo objects:
//!
//! ```text
//! [
//!   {
//!     "id": 1,
//!     "text": "write the report",
//!     "done": false,
//!     "due_date": "2026-11-01",
//!     "created_at": "2026-10-19T09:30:00Z",
//!     "updated_at": "2026-10-19T09:30:00Z"
//!   }
//! ]
//! ```
//!
//! Decoding is strict about shape (ids are integers, `done` is a boolean or
//! 0/1, due dates are `YYYY-MM-DD`) so that a hand-edited or corrupted file is
//! reported instead of silently reinterpreted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod codec;
mod mutations;

pub use codec::{decode, encode};

/// A single todo record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier within the store.
    pub id: u64,

    /// Todo text (never empty after trimming).
    pub text: String,

    /// Whether the todo is completed.
    #[serde(default)]
    pub done: bool,

    /// Optional due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Create a new, not-done todo stamped with the current time.
    pub fn new(id: u64, text: &str) -> crate::error::Result<Self> {
        let text = normalize_text(text)?;
        let now = Utc::now();
        Ok(Self {
            id,
            text,
            done: false,
            due_date: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the todo has a due date before `today` and is still open.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) if !self.done => due < today,
            _ => false,
        }
    }
}

/// Next free id for a record list: one past the largest id, or 1 when empty.
///
/// Ids below the maximum are never reused, even when the list has gaps.
pub fn next_id(todos: &[Todo]) -> u64 {
    todos.iter().map(|todo| todo.id).max().map_or(1, |max| max + 1)
}

pub(crate) fn normalize_text(text: &str) -> crate::error::Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(crate::error::FlywheelError::User(
            "todo text cannot be empty".to_string(),
        ));
    }
    Ok(text.to_string())
}
