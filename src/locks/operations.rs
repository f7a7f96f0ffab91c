//! Lock acquisition, inspection, and clearing operations.

use super::cleanup::CleanupRegistry;
use super::degraded::{remove_artifact, try_create};
use super::guard::LockToken;
use super::metadata::LockMetadata;
use super::native::NativeHandle;
use super::reclaim::{StaleVerdict, assess_metadata, reclaim_if_stale};
use super::stats::{LockStats, LockStatsSnapshot};
use super::types::{LockBackend, LockInfo, LockIntent};
use crate::error::{FlywheelError, LockError};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Suffix of the degraded-mode lock artifact.
pub const DEGRADED_LOCK_SUFFIX: &str = ".lock";

/// Suffix of the native lock handle file.
pub const NATIVE_LOCK_SUFFIX: &str = ".flock";

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `{store}.lock`
pub fn degraded_lock_path(target: &Path) -> PathBuf {
    with_suffix(target, DEGRADED_LOCK_SUFFIX)
}

/// `{store}.flock`
pub fn native_lock_path(target: &Path) -> PathBuf {
    with_suffix(target, NATIVE_LOCK_SUFFIX)
}

/// Timing and policy knobs for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockSettings {
    /// Give up with `LockError::Timeout` after this long.
    pub timeout: Duration,
    /// Sleep between attempts while the lock is held elsewhere.
    pub poll_interval: Duration,
    /// Degraded artifacts older than this are reclaimed even if the holder lives.
    pub stale_threshold: Duration,
    /// Refuse the degraded backend instead of falling back to it.
    pub strict: bool,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            stale_threshold: Duration::from_secs(300),
            strict: false,
        }
    }
}

/// Acquires and inspects locks on store files.
#[derive(Debug)]
pub struct LockManager {
    backend: LockBackend,
    settings: LockSettings,
    registry: CleanupRegistry,
    stats: LockStats,
}

impl LockManager {
    pub fn new(backend: LockBackend, settings: LockSettings, registry: CleanupRegistry) -> Self {
        Self {
            backend,
            settings,
            registry,
            stats: LockStats::default(),
        }
    }

    pub fn backend(&self) -> LockBackend {
        self.backend
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    pub fn registry(&self) -> &CleanupRegistry {
        &self.registry
    }

    pub fn stats(&self) -> LockStatsSnapshot {
        self.stats.snapshot()
    }

    /// Acquire the lock for `target`, polling until the configured timeout.
    ///
    /// Degraded mode always takes the lock exclusively, whatever `intent` says.
    ///
    /// # Errors
    ///
    /// * `LockError::Unsupported` - degraded backend while strict mode is on
    /// * `LockError::Timeout` - still held elsewhere when the timeout elapsed
    /// * `LockError::Io` - any failure other than "held elsewhere"
    pub fn acquire(&self, target: &Path, intent: LockIntent) -> Result<LockToken, LockError> {
        if self.backend == LockBackend::Degraded && self.settings.strict {
            return Err(LockError::Unsupported {
                path: target.to_path_buf(),
            });
        }

        // Lock files live next to the store, so its directory must exist.
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let started = Instant::now();
        let (token, contended) = match self.backend {
            LockBackend::Native => self.acquire_native(target, intent, started)?,
            LockBackend::Degraded => self.acquire_degraded(target, intent, started)?,
        };
        let waited = started.elapsed();

        self.stats.record_acquire(waited, contended);
        metrics::histogram!("flywheel_lock_acquire_seconds", "backend" => self.backend.as_str())
            .record(waited.as_secs_f64());
        if contended {
            metrics::counter!("flywheel_lock_contended_total", "backend" => self.backend.as_str())
                .increment(1);
        }
        tracing::debug!(
            path = %target.display(),
            backend = self.backend.as_str(),
            intent = token.intent().as_str(),
            waited_ms = waited.as_millis() as u64,
            "acquired lock"
        );
        Ok(token)
    }

    fn acquire_native(
        &self,
        target: &Path,
        intent: LockIntent,
        started: Instant,
    ) -> Result<(LockToken, bool), LockError> {
        let lock_path = native_lock_path(target);
        let mut handle = NativeHandle::open(&lock_path).map_err(|source| LockError::Io {
            path: lock_path.clone(),
            source,
        })?;

        let mut contended = false;
        loop {
            let acquired = handle.try_lock(intent).map_err(|source| LockError::Io {
                path: lock_path.clone(),
                source,
            })?;
            if acquired {
                return Ok((LockToken::native(target, intent, handle), contended));
            }
            contended = true;
            self.wait_or_timeout(target, started)?;
        }
    }

    fn acquire_degraded(
        &self,
        target: &Path,
        intent: LockIntent,
        started: Instant,
    ) -> Result<(LockToken, bool), LockError> {
        let artifact = degraded_lock_path(target);

        let mut contended = false;
        loop {
            let metadata = LockMetadata::new(intent.as_str());
            let created = try_create(&artifact, &metadata).map_err(|source| LockError::Io {
                path: artifact.clone(),
                source,
            })?;
            if created {
                let token = LockToken::degraded(target, artifact, metadata, self.registry.clone());
                return Ok((token, contended));
            }

            if reclaim_if_stale(&artifact, self.settings.stale_threshold)?.is_some() {
                self.stats.record_reclaim();
                metrics::counter!("flywheel_lock_reclaimed_total").increment(1);
                continue;
            }

            contended = true;
            self.wait_or_timeout(target, started)?;
        }
    }

    fn wait_or_timeout(&self, target: &Path, started: Instant) -> Result<(), LockError> {
        let waited = started.elapsed();
        if waited >= self.settings.timeout {
            return Err(LockError::Timeout {
                path: target.to_path_buf(),
                waited,
            });
        }
        let remaining = self.settings.timeout - waited;
        std::thread::sleep(self.settings.poll_interval.min(remaining));
        Ok(())
    }

    /// Report who holds the lock on `target`, if anyone.
    ///
    /// A degraded artifact is reported under either backend. The native lock
    /// is probed without waiting.
    pub fn inspect_lock(&self, target: &Path) -> Result<Option<LockInfo>, LockError> {
        let artifact = degraded_lock_path(target);
        if artifact.exists() {
            let metadata = LockMetadata::read_lenient(&artifact);
            let verdict = Some(match &metadata {
                Some(meta) => assess_metadata(meta, self.settings.stale_threshold),
                None => StaleVerdict::Indeterminate,
            });
            return Ok(Some(LockInfo {
                path: artifact,
                backend: LockBackend::Degraded,
                metadata,
                verdict,
            }));
        }

        if self.backend == LockBackend::Degraded {
            return Ok(None);
        }

        let lock_path = native_lock_path(target);
        if !lock_path.exists() {
            return Ok(None);
        }
        let io_err = |source: io::Error| LockError::Io {
            path: lock_path.clone(),
            source,
        };
        let mut probe = NativeHandle::open(&lock_path).map_err(io_err)?;
        if probe.try_lock(LockIntent::Exclusive).map_err(io_err)? {
            probe.unlock().map_err(io_err)?;
            return Ok(None);
        }
        Ok(Some(LockInfo {
            path: lock_path.clone(),
            backend: LockBackend::Native,
            metadata: None,
            verdict: None,
        }))
    }

    /// Remove a degraded lock artifact.
    ///
    /// Without `force` only stale artifacts are removed. Native locks belong
    /// to the kernel and are released when their holder exits, so they cannot
    /// be cleared.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(LockInfo))` - the cleared lock, for reporting
    /// * `Ok(None)` - nothing was held
    /// * `Err(FlywheelError::User)` - the lock is live and `force` was not given,
    ///   or it is a native lock
    pub fn clear_lock(
        &self,
        target: &Path,
        force: bool,
    ) -> Result<Option<LockInfo>, FlywheelError> {
        let Some(info) = self.inspect_lock(target)? else {
            return Ok(None);
        };

        if info.backend == LockBackend::Native {
            return Err(FlywheelError::User(format!(
                "native lock on '{}' is held by a running process; it is released when that process exits",
                info.path.display()
            )));
        }
        if !force && !info.is_stale() {
            return Err(FlywheelError::User(format!(
                "lock '{}' is not stale; use --force to clear it anyway",
                info.path.display()
            )));
        }

        match remove_artifact(&info.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(LockError::Io {
                    path: info.path.clone(),
                    source,
                }
                .into());
            }
        }
        tracing::warn!(path = %info.path.display(), force, "cleared lock artifact");
        Ok(Some(info))
    }
}
