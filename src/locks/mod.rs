//! Locking subsystem for flywheel.
//!
//! At most one writer holds the lock on a store file at a time. Two backends
//! implement it:
//! - **Native**: the platform file lock (`flock` / `LockFileEx`) on a sibling
//!   `{store}.flock` handle file. Shared and exclusive intents are honored and
//!   the kernel drops the lock when the holder dies.
//! - **Degraded**: a `{store}.lock` artifact created with **create_new**
//!   semantics, used only when native locking is unavailable. Every acquire
//!   is exclusive.
//!
//! # Lock Metadata
//!
//! Each degraded artifact contains JSON metadata:
//! - `owner`: The owner of the lock (e.g., `user@HOST`)
//! - `pid`: The holder's process ID
//! - `created_at`: RFC3339 timestamp
//! - `action`: The intent the lock was taken with
//!
//! Artifacts whose holder is dead, or that are older than the stale
//! threshold, are reclaimed by the next process that wants the lock.
//!
//! # Tokens
//!
//! A successful acquire returns a [`LockToken`] that releases the lock when
//! dropped. Degraded artifacts are also registered with a
//! [`CleanupRegistry`] so the owning store can sweep them at shutdown.

mod cleanup;
mod degraded;
mod guard;
mod metadata;
mod native;
mod operations;
mod process;
pub mod reclaim;
mod stats;
mod types;


// Re-export public API
pub use cleanup::CleanupRegistry;
pub use guard::LockToken;
pub use metadata::LockMetadata;
pub use native::{LOCK_OFFSET, LOCK_RANGE_BYTES};
pub use operations::{
    DEGRADED_LOCK_SUFFIX, LockManager, LockSettings, NATIVE_LOCK_SUFFIX, degraded_lock_path,
    native_lock_path,
};
pub use process::is_process_alive;
pub use reclaim::StaleVerdict;
pub use stats::LockStatsSnapshot;
pub use types::{LockBackend, LockInfo, LockIntent};
