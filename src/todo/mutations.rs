//! Mutation helpers used by the CLI commands.

use super::{Todo, codec::parse_due_date, normalize_text};
use crate::error::{FlywheelError, Result};
use chrono::Utc;

impl Todo {
    /// Mark the todo as completed.
    pub fn mark_done(&mut self) {
        self.done = true;
        self.touch();
    }

    /// Reopen a completed todo.
    pub fn mark_undone(&mut self) {
        self.done = false;
        self.touch();
    }

    /// Replace the todo text.
    pub fn rename(&mut self, text: &str) -> Result<()> {
        self.text = normalize_text(text)?;
        self.touch();
        Ok(())
    }

    /// Set the due date from a `YYYY-MM-DD` string.
    pub fn set_due_date(&mut self, date: &str) -> Result<()> {
        let due = parse_due_date(date).map_err(FlywheelError::User)?;
        self.due_date = Some(due);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
