//! Command implementations for flywheel.
//!
//! `dispatch` resolves the configuration, opens the store, and routes the
//! command to its handler. Handlers return the text to print so they can be
//! exercised without a terminal.

mod lock;
mod todos;


use crate::cli::{Cli, Command, LockAction};
use crate::config::StoreConfig;
use crate::error::{FlywheelError, Result};
use crate::store::TodoStore;

/// Dispatch a parsed command line.
///
/// This is the main entry point for command execution.
pub fn dispatch(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|e| FlywheelError::User(format!("cannot determine working directory: {}", e)))?;
    let config = StoreConfig::resolve(cli.config.as_deref(), &cwd, cli.db.as_deref())?;
    let mut store = TodoStore::open(&config, &cwd)?;

    let output = execute(cli.command, &store);
    store.shutdown();

    print!("{}", output?);
    Ok(())
}

/// Run one command against `store` and return its output.
pub fn execute(command: Command, store: &TodoStore) -> Result<String> {
    match command {
        Command::Add(args) => todos::cmd_add(store, args),
        Command::List(args) => todos::cmd_list(store, args),
        Command::Edit(args) => todos::cmd_edit(store, args),
        Command::Done(args) => todos::cmd_done(store, args),
        Command::Undone(args) => todos::cmd_undone(store, args),
        Command::Rm(args) => todos::cmd_rm(store, args),
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::Status => lock::cmd_lock_status(store),
            LockAction::Clear(args) => lock::cmd_lock_clear(store, args),
        },
    }
}
