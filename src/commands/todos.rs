//! Todo commands: add, list, edit, done, undone, rm.

use crate::cli::{AddArgs, EditArgs, IdArgs, ListArgs};
use crate::error::{FlywheelError, Result};
use crate::store::TodoStore;
use crate::todo::Todo;
use chrono::Local;
use std::fmt::Write;

fn not_found(id: u64) -> FlywheelError {
    FlywheelError::User(format!("no todo with id {}", id))
}

fn find_mut(todos: &mut [Todo], id: u64) -> Result<&mut Todo> {
    todos.iter_mut().find(|t| t.id == id).ok_or_else(|| not_found(id))
}

pub(super) fn cmd_add(store: &TodoStore, args: AddArgs) -> Result<String> {
    let todo = store.update(|todos| {
        let mut todo = Todo::new(store.next_id(todos), &args.text)?;
        if let Some(due) = &args.due {
            todo.set_due_date(due)?;
        }
        todos.push(todo.clone());
        Ok(todo)
    })?;
    Ok(format!("Added todo {}: {}\n", todo.id, todo.text))
}

pub(super) fn cmd_list(store: &TodoStore, args: ListArgs) -> Result<String> {
    let todos = store.load()?;
    let today = Local::now().date_naive();

    let shown: Vec<&Todo> = todos
        .iter()
        .filter(|t| !args.pending || !t.done)
        .collect();
    if shown.is_empty() {
        return Ok("No todos.\n".to_string());
    }

    let mut out = String::new();
    for todo in shown {
        let mark = if todo.done { "x" } else { " " };
        // Writing into a String cannot fail.
        let _ = write!(out, "[{}] {:>3}  {}", mark, todo.id, todo.text);
        if let Some(due) = todo.due_date {
            let _ = write!(out, "  (due {}", due.format("%Y-%m-%d"));
            if todo.is_overdue(today) {
                out.push_str(", OVERDUE");
            }
            out.push(')');
        }
        out.push('\n');
    }
    Ok(out)
}

pub(super) fn cmd_edit(store: &TodoStore, args: EditArgs) -> Result<String> {
    let text = store.update(|todos| {
        let todo = find_mut(todos, args.id)?;
        todo.rename(&args.text)?;
        Ok(todo.text.clone())
    })?;
    Ok(format!("Updated todo {}: {}\n", args.id, text))
}

pub(super) fn cmd_done(store: &TodoStore, args: IdArgs) -> Result<String> {
    store.update(|todos| {
        find_mut(todos, args.id)?.mark_done();
        Ok(())
    })?;
    Ok(format!("Marked todo {} as done\n", args.id))
}

pub(super) fn cmd_undone(store: &TodoStore, args: IdArgs) -> Result<String> {
    store.update(|todos| {
        find_mut(todos, args.id)?.mark_undone();
        Ok(())
    })?;
    Ok(format!("Marked todo {} as not done\n", args.id))
}

pub(super) fn cmd_rm(store: &TodoStore, args: IdArgs) -> Result<String> {
    let removed = store.update(|todos| {
        let index = todos
            .iter()
            .position(|t| t.id == args.id)
            .ok_or_else(|| not_found(args.id))?;
        Ok(todos.remove(index))
    })?;
    Ok(format!("Removed todo {}: {}\n", removed.id, removed.text))
}
