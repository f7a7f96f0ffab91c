//! Degraded-mode lock artifacts.
//!
//! Without a native lock facility, the lock is the existence of
//! `{store}.lock`, created with **create_new** semantics so that exactly one
//! process can create it. The artifact carries [`LockMetadata`] so other
//! processes can judge whether it was abandoned.

use super::metadata::LockMetadata;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Try to create the artifact at `path` and write `metadata` into it.
///
/// Returns `Ok(false)` if the artifact already exists.
pub(crate) fn try_create(path: &Path, metadata: &LockMetadata) -> io::Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };

    let written = file
        .write_all(metadata.to_json().as_bytes())
        .and_then(|()| file.sync_all());
    if let Err(e) = written {
        // Clean up the artifact so nobody waits on a lock we never held
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(true)
}

/// Remove the artifact only if it still carries `metadata`.
///
/// Returns `Ok(true)` if this call removed it, `Ok(false)` if it was already
/// gone or now belongs to someone else.
pub(crate) fn remove_if_owned(path: &Path, metadata: &LockMetadata) -> io::Result<bool> {
    match LockMetadata::read_lenient(path) {
        Some(current) if current == *metadata => remove_existing(path),
        Some(current) => {
            tracing::warn!(
                path = %path.display(),
                holder_pid = current.pid,
                "lock artifact was reclaimed by another process; leaving it in place"
            );
            Ok(false)
        }
        None if !path.exists() => Ok(false),
        None => {
            tracing::warn!(
                path = %path.display(),
                "lock artifact is unreadable; leaving it in place"
            );
            Ok(false)
        }
    }
}

/// Remove the artifact only if it still carries exactly `expected`, silently
/// leaving anything else in place.
pub(crate) fn remove_if_matches(path: &Path, expected: &LockMetadata) -> io::Result<bool> {
    if LockMetadata::read_lenient(path).as_ref() != Some(expected) {
        return Ok(false);
    }
    remove_existing(path)
}

fn remove_existing(path: &Path) -> io::Result<bool> {
    match remove_artifact(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove an artifact regardless of owner. Directories left by other
/// implementations of the same protocol are removed too.
pub(crate) fn remove_artifact(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    }
}
