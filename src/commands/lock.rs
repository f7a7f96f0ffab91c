//! Lock commands: status and clear.

use crate::cli::LockClearArgs;
use crate::error::Result;
use crate::locks::{LockBackend, LockInfo};
use crate::store::TodoStore;
use std::fmt::Write;

fn describe(out: &mut String, info: &LockInfo) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "  Path:       {}", info.path.display());
    let _ = writeln!(out, "  Backend:    {}", info.backend.as_str());
    match &info.metadata {
        Some(meta) => {
            let _ = writeln!(out, "  Owner:      {}", meta.owner);
            let _ = writeln!(out, "  PID:        {}", meta.pid);
            let _ = writeln!(
                out,
                "  Created:    {}",
                meta.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            let _ = writeln!(out, "  Age:        {}", meta.age_string());
        }
        None if info.backend == LockBackend::Degraded => {
            let _ = writeln!(out, "  Owner:      (unreadable lock file)");
        }
        None => {}
    }
    if let Some(verdict) = &info.verdict
        && verdict.is_stale()
    {
        let _ = writeln!(out, "  Status:     STALE ({})", verdict);
    }
}

pub(super) fn cmd_lock_status(store: &TodoStore) -> Result<String> {
    let manager = store.lock_manager();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Store:   {}\nBackend: {}",
        store.path().display(),
        manager.backend().as_str()
    );

    match manager.inspect_lock(store.path())? {
        None => out.push_str("No active lock.\n"),
        Some(info) => {
            out.push_str("Lock held:\n");
            describe(&mut out, &info);
            if info.is_stale() {
                out.push_str(
                    "Note: the lock is stale. Use `flywheel lock clear` to remove it.\n",
                );
            }
        }
    }
    Ok(out)
}

pub(super) fn cmd_lock_clear(store: &TodoStore, args: LockClearArgs) -> Result<String> {
    let cleared = store
        .lock_manager()
        .clear_lock(store.path(), args.force)?;

    let mut out = String::new();
    match cleared {
        None => out.push_str("No lock to clear.\n"),
        Some(info) => {
            out.push_str("Cleared lock:\n");
            describe(&mut out, &info);
        }
    }
    Ok(out)
}
