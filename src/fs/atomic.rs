//! Atomic filesystem writes for the todo store.
//!
//! Every write follows the same protocol:
//! 1. Create a temporary file next to the target (same directory, so the final
//!    replace is a metadata operation on one filesystem)
//! 2. Write all bytes and sync them to disk
//! 3. Close the temporary file
//! 4. Optionally copy the current target to `{target}.bak`
//! 5. Atomically replace the target with the temporary file
//! 6. Sync the parent directory entry (POSIX)
//!
//! A reader opening the target at any moment sees either the whole old file
//! or the whole new file. If anything fails before step 5 the temporary file
//! is removed and the target is left untouched.
//!
//! Temporary files of the same target left behind by a writer that crashed
//! mid-write are removed before step 1. The caller holds the store lock, so
//! no live writer owns them.
//!
//! # Cross-Platform Behavior
//!
//! - **POSIX (Linux, macOS)**: `rename()` replaces the destination atomically
//!   when source and destination are on the same filesystem.
//! - **Windows**: `MoveFileExW` with `MOVEFILE_REPLACE_EXISTING |
//!   MOVEFILE_WRITE_THROUGH`.

use crate::error::IoError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Suffix of the backup copy written when [`WriteOptions::backup`] is set.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Suffix shared by all temporary files created by [`atomic_write`].
pub const TEMP_SUFFIX: &str = ".tmp";

/// How many unpredictable temp names to try before giving up.
const TEMP_CREATE_ATTEMPTS: u32 = 16;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Options for [`atomic_write`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Copy the existing target to `{target}.bak` before replacing it.
    pub backup: bool,
}

/// Atomically replace `path` with `content`.
///
/// The caller must hold the store lock for `path`; this function only
/// guarantees that the replacement itself is all-or-nothing.
pub fn atomic_write<P: AsRef<Path>>(
    path: P,
    content: &[u8],
    options: &WriteOptions,
) -> Result<(), IoError> {
    let path = path.as_ref();

    ensure_parent_directory(path)?;
    remove_stale_temp_files(path);

    let mut temp = TempFile::create(path)?;
    temp.write_all(content)?;
    temp.sync()?;
    temp.close();

    if options.backup {
        backup_existing(path)?;
    }

    atomic_replace(temp.path(), path)?;
    temp.mark_persisted();

    sync_parent_dir(path);
    tracing::trace!(path = %path.display(), bytes = content.len(), "atomic write complete");
    Ok(())
}

/// Path of the backup copy for `target`.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Make sure every ancestor of `path` is a directory, creating missing ones.
///
/// An ancestor that exists as a regular file (`/data/todo.json/sub/db.json`)
/// is reported instead of letting `create_dir_all` fail with a vague error.
pub fn ensure_parent_directory(path: &Path) -> Result<(), IoError> {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        match fs::metadata(ancestor) {
            Ok(meta) if !meta.is_dir() => {
                return Err(IoError::other(
                    path,
                    io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!(
                            "'{}' exists as a file, not a directory",
                            ancestor.display()
                        ),
                    ),
                ));
            }
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(IoError::other(ancestor, e)),
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| IoError::other(parent, e))?;
    }
    Ok(())
}

/// A temporary sibling of the target file.
///
/// Owns the write handle and the temp path. `Drop` is the single terminating
/// cleanup step: it closes the handle if still open and removes the temp file
/// unless the replace succeeded.
struct TempFile {
    path: PathBuf,
    file: Option<File>,
    persisted: bool,
}

impl TempFile {
    fn create(target: &Path) -> Result<Self, IoError> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                IoError::other(
                    target,
                    io::Error::new(io::ErrorKind::InvalidInput, "invalid store file name"),
                )
            })?;

        let mut last_err = None;
        for _ in 0..TEMP_CREATE_ATTEMPTS {
            let path = parent.join(temp_name(file_name));
            match open_new_private(&path) {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        file: Some(file),
                        persisted: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(IoError::other(path, e)),
            }
        }

        Err(IoError::other(
            target,
            last_err.unwrap_or_else(|| io::Error::other("could not create temporary file")),
        ))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&mut self) -> Result<&mut File, IoError> {
        let path = &self.path;
        self.file.as_mut().ok_or_else(|| {
            IoError::other(
                path,
                io::Error::other("temporary file already closed"),
            )
        })
    }

    fn write_all(&mut self, content: &[u8]) -> Result<(), IoError> {
        let path = self.path.clone();
        self.handle()?
            .write_all(content)
            .map_err(|e| IoError::other(path, e))
    }

    fn sync(&mut self) -> Result<(), IoError> {
        let path = self.path.clone();
        self.handle()?
            .sync_all()
            .map_err(|e| IoError::other(path, e))
    }

    /// Close the handle. Calling it again is a no-op.
    fn close(&mut self) {
        drop(self.file.take());
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        self.close();
        if !self.persisted
            && let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove temporary file"
            );
        }
    }
}

/// Unpredictable temp name: `.{file_name}.{pid}.{nonce}.tmp`.
fn temp_name(file_name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nonce = nanos ^ counter.rotate_left(32);
    format!(
        ".{}.{}.{:016x}{}",
        file_name,
        std::process::id(),
        nonce,
        TEMP_SUFFIX
    )
}

/// Whether `name` is a temp file of `file_name` as produced by [`temp_name`].
fn is_temp_name_for(name: &str, file_name: &str) -> bool {
    let Some(rest) = name
        .strip_prefix('.')
        .and_then(|n| n.strip_prefix(file_name))
        .and_then(|n| n.strip_prefix('.'))
        .and_then(|n| n.strip_suffix(TEMP_SUFFIX))
    else {
        return false;
    };
    match rest.split_once('.') {
        Some((pid, nonce)) => {
            !pid.is_empty()
                && pid.bytes().all(|b| b.is_ascii_digit())
                && nonce.len() == 16
                && nonce.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Remove temp files of `target` left by a crashed writer.
///
/// Best effort: failures are logged and never fail the write.
fn remove_stale_temp_files(target: &Path) {
    let Some(file_name) = target.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %parent.display(), error = %e, "cannot scan for stale temp files");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_temp_name_for(name, file_name) || !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => tracing::warn!(path = %path.display(), "removed stale temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove stale temporary file"
            ),
        }
    }
}

/// Create a new file readable and writable only by the owner.
#[cfg(unix)]
fn open_new_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_new_private(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Copy the current target to its backup path. A missing target is not an error.
fn backup_existing(target: &Path) -> Result<(), IoError> {
    let backup = backup_path(target);
    match fs::copy(target, &backup) {
        Ok(_) => {
            tracing::debug!(backup = %backup.display(), "wrote backup before replace");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IoError::other(backup, e)),
    }
}

/// Atomically replace the target file with the source file.
#[cfg(not(windows))]
fn atomic_replace(source: &Path, target: &Path) -> Result<(), IoError> {
    fs::rename(source, target).map_err(|e| IoError::other(target, e))
}

/// Windows-specific atomic replace implementation.
#[cfg(windows)]
fn atomic_replace(source: &Path, target: &Path) -> Result<(), IoError> {
    use std::os::windows::ffi::OsStrExt;

    const MOVEFILE_REPLACE_EXISTING: u32 = 0x1;
    const MOVEFILE_WRITE_THROUGH: u32 = 0x8;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn MoveFileExW(
            lpExistingFileName: *const u16,
            lpNewFileName: *const u16,
            dwFlags: u32,
        ) -> i32;
    }

    let source_wide: Vec<u16> = source
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let target_wide: Vec<u16> = target
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    // SAFETY: both buffers are NUL-terminated UTF-16 strings that outlive the call.
    let result = unsafe {
        MoveFileExW(
            source_wide.as_ptr(),
            target_wide.as_ptr(),
            MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
        )
    };

    if result == 0 {
        return Err(IoError::other(target, io::Error::last_os_error()));
    }
    Ok(())
}

/// Persist the directory entry after a rename (POSIX only).
#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = sync_dir(parent) {
        tracing::warn!(
            dir = %parent.display(),
            error = %e,
            "directory sync failed; the replace may not survive a crash"
        );
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir).and_then(|dir| dir.sync_all())
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
            })
            .collect()
    }

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");

        atomic_write(&file_path, b"[]", &WriteOptions::default()).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "[]");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");
        fs::write(&file_path, "original content").unwrap();

        atomic_write(&file_path, b"new content", &WriteOptions::default()).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("dirs").join("todo.json");

        atomic_write(&file_path, b"nested", &WriteOptions::default()).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "nested");
    }

    #[test]
    fn test_atomic_write_rejects_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("todo.json");
        fs::write(&blocker, "i am a file").unwrap();
        let file_path = blocker.join("sub").join("db.json");

        let err = atomic_write(&file_path, b"[]", &WriteOptions::default()).unwrap_err();
        assert!(err.to_string().contains("exists as a file"));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "i am a file");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");

        atomic_write(&file_path, b"one", &WriteOptions::default()).unwrap();
        atomic_write(&file_path, b"two", &WriteOptions::default()).unwrap();

        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_failed_replace_keeps_target_and_removes_temp() {
        let temp_dir = TempDir::new().unwrap();
        // A directory at the target path makes the final rename fail.
        let file_path = temp_dir.path().join("todo.json");
        fs::create_dir(&file_path).unwrap();
        fs::write(file_path.join("keep"), "x").unwrap();

        let result = atomic_write(&file_path, b"new", &WriteOptions::default());

        assert!(result.is_err());
        assert!(file_path.join("keep").exists());
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_backup_written_only_when_target_exists() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");
        let options = WriteOptions { backup: true };

        atomic_write(&file_path, b"first", &options).unwrap();
        assert!(!backup_path(&file_path).exists());

        atomic_write(&file_path, b"second", &options).unwrap();
        assert_eq!(fs::read_to_string(backup_path(&file_path)).unwrap(), "first");
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "second");

        atomic_write(&file_path, b"third", &options).unwrap();
        assert_eq!(fs::read_to_string(backup_path(&file_path)).unwrap(), "second");
    }

    #[test]
    fn test_no_backup_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");

        atomic_write(&file_path, b"first", &WriteOptions::default()).unwrap();
        atomic_write(&file_path, b"second", &WriteOptions::default()).unwrap();

        assert!(!backup_path(&file_path).exists());
    }

    #[test]
    fn test_temp_names_are_unique_and_hidden() {
        let a = temp_name("todo.json");
        let b = temp_name("todo.json");
        assert_ne!(a, b);
        assert!(a.starts_with(".todo.json."));
        assert!(a.ends_with(TEMP_SUFFIX));
    }

    #[test]
    fn test_stale_temp_files_of_target_are_removed() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");
        let stale = temp_dir.path().join(".todo.json.12345.00000000deadbeef.tmp");
        fs::write(&stale, "half a document").unwrap();

        atomic_write(&file_path, b"[]", &WriteOptions::default()).unwrap();

        assert!(!stale.exists());
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "[]");
    }

    #[test]
    fn test_temp_files_of_other_stores_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");
        let others = [
            ".other.json.12345.00000000deadbeef.tmp",
            ".todo.json.old.12345.00000000deadbeef.tmp",
            ".todo.json.notes.tmp",
            "todo.json.tmp",
        ];
        for name in others {
            fs::write(temp_dir.path().join(name), "x").unwrap();
        }

        atomic_write(&file_path, b"[]", &WriteOptions::default()).unwrap();

        for name in others {
            assert!(temp_dir.path().join(name).exists(), "{} was removed", name);
        }
    }

    #[test]
    fn test_temp_name_matcher() {
        assert!(is_temp_name_for(&temp_name("todo.json"), "todo.json"));
        assert!(is_temp_name_for(
            ".todo.json.1.0123456789abcdef.tmp",
            "todo.json"
        ));
        assert!(!is_temp_name_for(&temp_name("todo.json.old"), "todo.json"));
        assert!(!is_temp_name_for(".todo.json.1.xyz.tmp", "todo.json"));
        assert!(!is_temp_name_for(".todo.json..0123456789abcdef.tmp", "todo.json"));
        assert!(!is_temp_name_for("todo.json", "todo.json"));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_sync_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        sync_dir(temp_dir.path()).unwrap();

        let err = sync_dir(&temp_dir.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");

        atomic_write(&file_path, b"[]", &WriteOptions::default()).unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_atomic_write_large_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("large.json");
        let large_content: Vec<u8> = (0..1024 * 1024).map(|i| (i % 256) as u8).collect();

        atomic_write(&file_path, &large_content, &WriteOptions::default()).unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), large_content);
    }
}
