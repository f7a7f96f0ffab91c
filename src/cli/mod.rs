//! CLI argument parsing for flywheel.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flywheel: a todo list kept in one crash-safe JSON file.
///
/// Every change is a locked load-modify-save cycle, so several processes can
/// share the same store without losing updates.
#[derive(Parser, Debug)]
#[command(name = "flywheel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store file to use (overrides FLYWHEEL_DB and the config file).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Config file (default: .flywheel.yaml in the current directory).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for flywheel.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new todo.
    Add(AddArgs),

    /// List todos.
    List(ListArgs),

    /// Replace the text of a todo.
    Edit(EditArgs),

    /// Mark a todo as done.
    Done(IdArgs),

    /// Mark a todo as not done.
    Undone(IdArgs),

    /// Remove a todo.
    Rm(IdArgs),

    /// Lock management commands.
    Lock(LockCommand),
}

/// Arguments for the `add` command.
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Todo text.
    pub text: String,

    /// Due date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only show todos that are not done.
    #[arg(long)]
    pub pending: bool,
}

/// Arguments for the `edit` command.
#[derive(Parser, Debug)]
pub struct EditArgs {
    /// Todo id as shown by `list`.
    pub id: u64,

    /// New todo text.
    pub text: String,
}

/// A todo id argument.
#[derive(Parser, Debug)]
pub struct IdArgs {
    /// Todo id as shown by `list`.
    pub id: u64,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show who holds the store lock, if anyone.
    Status,

    /// Clear a leftover lock artifact.
    ///
    /// Stale artifacts are cleared directly; a live one requires --force.
    Clear(LockClearArgs),
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Clear the lock even if its holder looks alive.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_add_with_due() {
        let cli =
            Cli::try_parse_from(["flywheel", "add", "Buy milk", "--due", "2026-11-01"]).unwrap();
        if let Command::Add(args) = cli.command {
            assert_eq!(args.text, "Buy milk");
            assert_eq!(args.due.as_deref(), Some("2026-11-01"));
        } else {
            panic!("Expected Add command");
        }
    }

    #[test]
    fn parse_global_db_after_subcommand() {
        let cli = Cli::try_parse_from(["flywheel", "list", "--pending", "--db", "/tmp/t.json"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/t.json")));
        if let Command::List(args) = cli.command {
            assert!(args.pending);
        } else {
            panic!("Expected List command");
        }
    }

    #[test]
    fn parse_id_commands() {
        let cli = Cli::try_parse_from(["flywheel", "done", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Done(IdArgs { id: 3 })));

        let cli = Cli::try_parse_from(["flywheel", "rm", "12"]).unwrap();
        assert!(matches!(cli.command, Command::Rm(IdArgs { id: 12 })));

        assert!(Cli::try_parse_from(["flywheel", "undone", "abc"]).is_err());
    }

    #[test]
    fn parse_edit() {
        let cli = Cli::try_parse_from(["flywheel", "edit", "4", "Buy oat milk"]).unwrap();
        if let Command::Edit(args) = cli.command {
            assert_eq!(args.id, 4);
            assert_eq!(args.text, "Buy oat milk");
        } else {
            panic!("Expected Edit command");
        }

        assert!(Cli::try_parse_from(["flywheel", "edit", "4"]).is_err());
    }

    #[test]
    fn parse_lock_clear() {
        let cli = Cli::try_parse_from(["flywheel", "lock", "clear", "--force"]).unwrap();
        if let Command::Lock(lock_cmd) = cli.command {
            if let LockAction::Clear(args) = lock_cmd.action {
                assert!(args.force);
            } else {
                panic!("Expected Clear action");
            }
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_lock_status() {
        let cli = Cli::try_parse_from(["flywheel", "lock", "status"]).unwrap();
        if let Command::Lock(lock_cmd) = cli.command {
            assert!(matches!(lock_cmd.action, LockAction::Status));
        } else {
            panic!("Expected Lock command");
        }
    }
}
