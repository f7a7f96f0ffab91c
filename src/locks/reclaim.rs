//! Stale lock detection and removal for degraded-mode artifacts.
//!
//! A held artifact is judged in order, first match wins:
//! 1. dead holder: the recorded pid is not a live process
//! 2. aged lock: the holder is alive but the lock is older than the threshold
//! 3. otherwise live
//!
//! Unreadable or half-written artifacts are `Indeterminate` and never
//! reclaimed. Contenders that judge the same artifact stale race for a
//! reclaim guard named after it; only the winner removes the artifact, and
//! only if it still holds the judged metadata.
//!
//! Removal is not coordinated with the real holder: a holder that is alive
//! but slower than the threshold loses its lock. The threshold is a
//! trade-off between availability and that risk.

use super::degraded::{remove_artifact, remove_if_matches, try_create};
use super::metadata::LockMetadata;
use super::process::is_process_alive;
use crate::error::LockError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of assessing an existing lock artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleVerdict {
    /// Holder alive and within the threshold.
    Live,
    /// Artifact missing, unreadable, or not yet fully written.
    Indeterminate,
    /// Recorded holder process no longer exists.
    DeadHolder { pid: u32 },
    /// Holder alive but the lock is older than the threshold.
    Aged { pid: u32, age: Duration },
}

impl StaleVerdict {
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            StaleVerdict::DeadHolder { .. } | StaleVerdict::Aged { .. }
        )
    }
}

impl std::fmt::Display for StaleVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleVerdict::Live => write!(f, "live"),
            StaleVerdict::Indeterminate => write!(f, "indeterminate"),
            StaleVerdict::DeadHolder { pid } => write!(f, "holder pid {} is not running", pid),
            StaleVerdict::Aged { pid, age } => {
                write!(f, "held by pid {} for {}s", pid, age.as_secs())
            }
        }
    }
}

/// Judge the artifact at `path` against `threshold`.
pub fn assess(path: &Path, threshold: Duration) -> StaleVerdict {
    let Some(metadata) = LockMetadata::read_lenient(path) else {
        return StaleVerdict::Indeterminate;
    };
    assess_metadata(&metadata, threshold)
}

pub(crate) fn assess_metadata(metadata: &LockMetadata, threshold: Duration) -> StaleVerdict {
    if !is_process_alive(metadata.pid) {
        return StaleVerdict::DeadHolder { pid: metadata.pid };
    }
    let age = metadata.age_std();
    if age > threshold {
        return StaleVerdict::Aged {
            pid: metadata.pid,
            age,
        };
    }
    StaleVerdict::Live
}

/// Suffix of the short-lived file that elects one reclaimer per stale artifact.
pub const RECLAIM_SUFFIX: &str = ".reclaim";

/// `{artifact}.{pid}-{created_micros}.reclaim`, named after the judged holder.
///
/// Every contender that judged the same artifact stale derives the same name,
/// so creating it with create_new lets exactly one of them remove the artifact.
pub fn reclaim_guard_path(artifact: &Path, judged: &LockMetadata) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(format!(
        ".{}-{}{}",
        judged.pid,
        judged.created_at.timestamp_micros(),
        RECLAIM_SUFFIX
    ));
    PathBuf::from(name)
}

/// Remove the artifact at `path` if it is stale.
///
/// Returns the verdict that justified removal, or `None` if the lock must be
/// waited on. The artifact is removed only while it still carries the
/// metadata that was judged, so an artifact created by a faster reclaimer is
/// never mistaken for the stale one.
pub fn reclaim_if_stale(path: &Path, threshold: Duration) -> Result<Option<StaleVerdict>, LockError> {
    let Some(judged) = LockMetadata::read_lenient(path) else {
        return Ok(None);
    };
    let verdict = assess_metadata(&judged, threshold);
    if !verdict.is_stale() {
        return Ok(None);
    }

    let guard = reclaim_guard_path(path, &judged);
    let claim = LockMetadata::new("reclaim");
    let elected = try_create(&guard, &claim).map_err(|source| LockError::Io {
        path: guard.clone(),
        source,
    })?;
    if !elected {
        // Someone else is reclaiming this artifact.
        clear_abandoned_guard(&guard, threshold);
        return Ok(None);
    }

    let removed = remove_if_matches(path, &judged);
    if let Err(e) = remove_if_matches(&guard, &claim) {
        tracing::warn!(path = %guard.display(), error = %e, "failed to remove reclaim guard");
    }
    let removed = removed.map_err(|source| LockError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !removed {
        return Ok(None);
    }

    match &verdict {
        StaleVerdict::DeadHolder { pid } => tracing::warn!(
            path = %path.display(),
            pid,
            "reclaimed stale lock: holder process is not running"
        ),
        StaleVerdict::Aged { pid, age } => tracing::warn!(
            path = %path.display(),
            pid,
            age_secs = age.as_secs(),
            threshold_secs = threshold.as_secs(),
            "reclaimed stale lock: held longer than threshold"
        ),
        StaleVerdict::Live | StaleVerdict::Indeterminate => {}
    }
    Ok(Some(verdict))
}

/// Remove a reclaim guard left by a reclaimer that died mid-reclaim.
fn clear_abandoned_guard(guard: &Path, threshold: Duration) {
    let abandoned = match LockMetadata::read_lenient(guard) {
        Some(holder) if !is_process_alive(holder.pid) => Some(holder),
        Some(_) => return,
        // Unreadable: only once it is older than the threshold.
        None => {
            let old = fs::metadata(guard)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age > threshold);
            if !old {
                return;
            }
            None
        }
    };

    let result = match &abandoned {
        Some(holder) => remove_if_matches(guard, holder),
        None => remove_artifact(guard).map(|()| true),
    };
    match result {
        Ok(true) => tracing::warn!(path = %guard.display(), "removed abandoned reclaim guard"),
        Ok(false) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %guard.display(), error = %e, "failed to remove abandoned reclaim guard")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    const THRESHOLD: Duration = Duration::from_secs(300);

    fn write_meta(path: &Path, pid: u32, age: chrono::Duration) -> LockMetadata {
        let mut meta = LockMetadata::new("save");
        meta.pid = pid;
        meta.created_at = Utc::now() - age;
        fs::write(path, meta.to_json()).unwrap();
        meta
    }

    #[test]
    fn test_live_fresh_lock_is_not_stale() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.lock");
        write_meta(&path, std::process::id(), chrono::Duration::seconds(1));

        assert_eq!(assess(&path, THRESHOLD), StaleVerdict::Live);
        assert_eq!(reclaim_if_stale(&path, THRESHOLD).unwrap(), None);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_dead_holder_is_stale_regardless_of_age() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.lock");

        let judged = write_meta(&path, 2_000_000_000, chrono::Duration::zero());

        let verdict = reclaim_if_stale(&path, THRESHOLD).unwrap();
        assert_eq!(
            verdict,
            Some(StaleVerdict::DeadHolder { pid: 2_000_000_000 })
        );
        assert!(!path.exists());
        assert!(!reclaim_guard_path(&path, &judged).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_live_reclaim_guard_defers_to_its_holder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.lock");
        let judged = write_meta(&path, 2_000_000_000, chrono::Duration::zero());
        let guard = reclaim_guard_path(&path, &judged);
        fs::write(&guard, LockMetadata::new("reclaim").to_json()).unwrap();

        assert_eq!(reclaim_if_stale(&path, THRESHOLD).unwrap(), None);
        assert!(path.exists());
        assert!(guard.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_abandoned_reclaim_guard_is_cleared() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.lock");
        let judged = write_meta(&path, 2_000_000_000, chrono::Duration::zero());
        let guard = reclaim_guard_path(&path, &judged);
        let mut crashed = LockMetadata::new("reclaim");
        crashed.pid = 2_000_000_001;
        fs::write(&guard, crashed.to_json()).unwrap();

        assert_eq!(reclaim_if_stale(&path, THRESHOLD).unwrap(), None);
        assert!(!guard.exists());
        assert!(path.exists());

        assert!(reclaim_if_stale(&path, THRESHOLD).unwrap().is_some());
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_name_follows_judged_holder() {
        let path = Path::new("/data/todo.json.lock");
        let meta = LockMetadata::new("save");
        let mut other = meta.clone();
        other.created_at = meta.created_at + chrono::Duration::seconds(1);

        let guard = reclaim_guard_path(path, &meta);
        assert_eq!(guard, reclaim_guard_path(path, &meta.clone()));
        assert_ne!(guard, reclaim_guard_path(path, &other));
        let name = guard.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(&format!("todo.json.lock.{}-", meta.pid)));
        assert!(name.ends_with(RECLAIM_SUFFIX));
    }

    #[test]
    fn test_aged_live_holder_is_stale() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.lock");
        write_meta(&path, std::process::id(), chrono::Duration::minutes(10));

        let verdict = reclaim_if_stale(&path, THRESHOLD).unwrap().unwrap();
        assert!(matches!(verdict, StaleVerdict::Aged { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_garbage_artifact_is_indeterminate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.lock");

        fs::write(&path, "").unwrap();
        assert_eq!(assess(&path, THRESHOLD), StaleVerdict::Indeterminate);

        fs::write(&path, "pid=12\nlocked_at=garbage").unwrap();
        assert_eq!(assess(&path, THRESHOLD), StaleVerdict::Indeterminate);
        assert_eq!(reclaim_if_stale(&path, THRESHOLD).unwrap(), None);
        assert!(path.exists());
    }

    #[test]
    fn test_missing_artifact_is_indeterminate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.lock");
        assert_eq!(assess(&path, THRESHOLD), StaleVerdict::Indeterminate);
    }
}
