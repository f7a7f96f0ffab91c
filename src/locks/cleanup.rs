//! Exit-time cleanup of degraded lock artifacts.
//!
//! Every artifact this process creates is registered here and deregistered
//! on release. Whatever is still registered when the owning store shuts down
//! is swept, so a crash-free exit never strands a lock. The registry is an
//! owned value shared by clone; there is no process-wide instance.

use super::degraded::remove_if_owned;
use super::metadata::LockMetadata;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
    held: Arc<Mutex<HashMap<PathBuf, LockMetadata>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, LockMetadata>> {
        // A panic while holding the mutex leaves the map itself consistent.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn register(&self, artifact: &Path, metadata: &LockMetadata) {
        self.entries()
            .insert(artifact.to_path_buf(), metadata.clone());
    }

    /// Forget `artifact`, but only if it is still registered with `metadata`.
    pub(crate) fn deregister(&self, artifact: &Path, metadata: &LockMetadata) {
        let mut entries = self.entries();
        if entries.get(artifact) == Some(metadata) {
            entries.remove(artifact);
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Remove every registered artifact that still names this process.
    ///
    /// Returns how many artifacts were removed. Failures are logged; sweeping
    /// runs from `Drop` and must not fail.
    pub fn sweep(&self) -> usize {
        let drained: Vec<(PathBuf, LockMetadata)> = self.entries().drain().collect();
        let mut removed = 0;
        for (artifact, metadata) in drained {
            match remove_if_owned(&artifact, &metadata) {
                Ok(true) => {
                    tracing::debug!(path = %artifact.display(), "swept lock artifact at shutdown");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    path = %artifact.display(),
                    error = %e,
                    "failed to remove lock artifact at shutdown"
                ),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sweep_removes_only_owned_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let registry = CleanupRegistry::new();

        let mine_path = temp_dir.path().join("a.json.lock");
        let mine = LockMetadata::new("save");
        fs::write(&mine_path, mine.to_json()).unwrap();
        registry.register(&mine_path, &mine);

        // Reclaimed and re-taken by another process since we registered it.
        let taken_path = temp_dir.path().join("b.json.lock");
        let registered = LockMetadata::new("save");
        let mut other = registered.clone();
        other.pid = registered.pid.wrapping_add(1);
        fs::write(&taken_path, other.to_json()).unwrap();
        registry.register(&taken_path, &registered);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.sweep(), 1);
        assert!(registry.is_empty());
        assert!(!mine_path.exists());
        assert!(taken_path.exists());
    }

    #[test]
    fn test_deregister_requires_matching_metadata() {
        let registry = CleanupRegistry::new();
        let path = PathBuf::from("/nonexistent/x.lock");
        let first = LockMetadata::new("save");
        let mut second = first.clone();
        second.action = "load".to_string();

        registry.register(&path, &first);
        registry.deregister(&path, &second);
        assert_eq!(registry.len(), 1);

        registry.deregister(&path, &first);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let registry = CleanupRegistry::new();
        let clone = registry.clone();
        clone.register(Path::new("/nonexistent/y.lock"), &LockMetadata::new("save"));
        assert_eq!(registry.len(), 1);
    }
}
