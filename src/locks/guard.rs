//! RAII lock token.

use super::cleanup::CleanupRegistry;
use super::degraded::remove_if_owned;
use super::metadata::LockMetadata;
use super::native::NativeHandle;
use super::types::{LockBackend, LockIntent};
use crate::error::LockError;
use std::path::{Path, PathBuf};

#[derive(Debug)]
enum TokenState {
    Native(NativeHandle),
    Degraded {
        artifact: PathBuf,
        metadata: LockMetadata,
        registry: CleanupRegistry,
    },
    Released,
}

/// Proof that this process holds the lock on a store file.
///
/// The lock is released exactly once: by [`LockToken::release`], or when the
/// token is dropped. If release fails during drop, a warning is logged but no
/// panic occurs.
#[derive(Debug)]
pub struct LockToken {
    target: PathBuf,
    intent: LockIntent,
    backend: LockBackend,
    state: TokenState,
}

impl LockToken {
    pub(super) fn native(target: &Path, intent: LockIntent, handle: NativeHandle) -> Self {
        Self {
            target: target.to_path_buf(),
            intent,
            backend: LockBackend::Native,
            state: TokenState::Native(handle),
        }
    }

    pub(super) fn degraded(
        target: &Path,
        artifact: PathBuf,
        metadata: LockMetadata,
        registry: CleanupRegistry,
    ) -> Self {
        registry.register(&artifact, &metadata);
        Self {
            target: target.to_path_buf(),
            // Degraded artifacts are always exclusive.
            intent: LockIntent::Exclusive,
            backend: LockBackend::Degraded,
            state: TokenState::Degraded {
                artifact,
                metadata,
                registry,
            },
        }
    }

    /// The store file this token guards.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn intent(&self) -> LockIntent {
        self.intent
    }

    pub fn backend(&self) -> LockBackend {
        self.backend
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, TokenState::Released)
    }

    /// Path of the on-disk lock file (the `.flock` handle or the `.lock` artifact).
    pub fn artifact_path(&self) -> Option<&Path> {
        match &self.state {
            TokenState::Native(handle) => Some(handle.path()),
            TokenState::Degraded { artifact, .. } => Some(artifact),
            TokenState::Released => None,
        }
    }

    /// Release the lock. Calling this again is a no-op.
    pub fn release(&mut self) -> Result<(), LockError> {
        match std::mem::replace(&mut self.state, TokenState::Released) {
            TokenState::Released => Ok(()),
            TokenState::Native(mut handle) => {
                let result = handle.unlock().map_err(|source| LockError::Io {
                    path: handle.path().to_path_buf(),
                    source,
                });
                // Closing the handle releases the lock even if unlock failed.
                drop(handle);
                tracing::debug!(path = %self.target.display(), "released native lock");
                result
            }
            TokenState::Degraded {
                artifact,
                metadata,
                registry,
            } => {
                // Stays registered on failure so the shutdown sweep retries it.
                remove_if_owned(&artifact, &metadata).map_err(|source| LockError::Io {
                    path: artifact.clone(),
                    source,
                })?;
                registry.deregister(&artifact, &metadata);
                tracing::debug!(path = %artifact.display(), "released degraded lock");
                Ok(())
            }
        }
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(
                path = %self.target.display(),
                error = %e,
                "failed to release lock"
            );
        }
    }
}
