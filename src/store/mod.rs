//! The todo store facade.
//!
//! `TodoStore` composes the lock manager, the atomic writer, and the record
//! codec:
//! - `load()` takes the lock in shared intent (exclusive in degraded mode),
//!   reads, decodes, and releases.
//! - `save()` encodes, takes the lock exclusively, replaces the file
//!   atomically, and releases.
//! - `update()` runs a load-modify-save cycle under a single exclusive lock.
//!
//! The store owns the [`CleanupRegistry`] of its lock manager. Dropping the
//! store (or calling [`TodoStore::shutdown`]) sweeps any degraded lock
//! artifact this process still holds.

use crate::config::StoreConfig;
use crate::error::{FlywheelError, IoError, Result};
use crate::fs::{WriteOptions, atomic_write, ensure_parent_directory};
use crate::locks::{CleanupRegistry, LockBackend, LockIntent, LockManager};
use crate::todo::{self, Todo};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;


/// A crash-safe single-file todo store.
#[derive(Debug)]
pub struct TodoStore {
    path: PathBuf,
    max_store_bytes: u64,
    write_options: WriteOptions,
    locks: LockManager,
    registry: CleanupRegistry,
    shut_down: bool,
}

impl TodoStore {
    /// Open the store described by `config`, with a relative `store_path`
    /// taken against `cwd`.
    pub fn open(config: &StoreConfig, cwd: &Path) -> Result<Self> {
        Self::with_path(config.store_path_in(cwd), config)
    }

    /// Open a store at `path`, taking every other setting from `config`.
    ///
    /// The lock backend is whatever the platform supports, so every process
    /// on the same store agrees on it.
    pub fn with_path(path: impl Into<PathBuf>, config: &StoreConfig) -> Result<Self> {
        Self::with_backend(path, config, LockBackend::detect())
    }

    pub(crate) fn with_backend(
        path: impl Into<PathBuf>,
        config: &StoreConfig,
        backend: LockBackend,
    ) -> Result<Self> {
        config.validate()?;
        let registry = CleanupRegistry::new();
        let locks = LockManager::new(backend, config.lock_settings(), registry.clone());
        Ok(Self {
            path: path.into(),
            max_store_bytes: config.max_store_bytes,
            write_options: WriteOptions {
                backup: config.backup,
            },
            locks,
            registry,
            shut_down: false,
        })
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Read every todo.
    ///
    /// A missing store file is an empty list.
    ///
    /// # Errors
    ///
    /// * `IoError::TooLarge` - the file exceeds `max_store_bytes`
    /// * `FlywheelError::Codec` - the file exists but does not decode
    /// * `FlywheelError::Lock` - the lock could not be acquired
    pub fn load(&self) -> Result<Vec<Todo>> {
        let started = Instant::now();

        // Checked before waiting on the lock; re-checked by the bounded read.
        match fs::metadata(&self.path) {
            Ok(meta) => self.check_size(meta.len())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "store file absent; empty list");
                return Ok(Vec::new());
            }
            Err(e) => return Err(IoError::other(&self.path, e).into()),
        }

        let mut token = self.locks.acquire(&self.path, LockIntent::Shared)?;
        let todos = self.read_locked()?;
        token.release()?;

        metrics::histogram!("flywheel_store_load_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(path = %self.path.display(), count = todos.len(), "loaded todos");
        Ok(todos)
    }

    /// Replace the stored list with `todos`.
    ///
    /// On failure the store file is unchanged.
    pub fn save(&self, todos: &[Todo]) -> Result<()> {
        let started = Instant::now();
        let encoded = self.encode(todos)?;

        ensure_parent_directory(&self.path)?;
        let mut token = self.locks.acquire(&self.path, LockIntent::Exclusive)?;
        atomic_write(&self.path, encoded.as_bytes(), &self.write_options)?;
        token.release()?;

        metrics::histogram!("flywheel_store_save_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(
            path = %self.path.display(),
            count = todos.len(),
            bytes = encoded.len(),
            "saved todos"
        );
        Ok(())
    }

    /// Load, apply `mutate`, and save, all under one exclusive lock.
    ///
    /// Nothing is written if `mutate` fails.
    pub fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Todo>) -> Result<T>,
    {
        let started = Instant::now();
        ensure_parent_directory(&self.path)?;
        let mut token = self.locks.acquire(&self.path, LockIntent::Exclusive)?;

        let mut todos = self.read_locked()?;
        let output = mutate(&mut todos)?;

        let encoded = self.encode(&todos)?;
        atomic_write(&self.path, encoded.as_bytes(), &self.write_options)?;
        token.release()?;

        metrics::histogram!("flywheel_store_save_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(path = %self.path.display(), count = todos.len(), "updated todos");
        Ok(output)
    }

    /// Next free id for `todos`: one past the largest id, or 1.
    pub fn next_id(&self, todos: &[Todo]) -> u64 {
        todo::next_id(todos)
    }

    /// Sweep lock artifacts this store still holds. Returns how many were removed.
    ///
    /// Called automatically on drop; calling it again is a no-op.
    pub fn shutdown(&mut self) -> usize {
        if self.shut_down {
            return 0;
        }
        self.shut_down = true;
        let removed = self.registry.sweep();
        if removed > 0 {
            tracing::warn!(
                path = %self.path.display(),
                removed,
                "removed lock artifacts left held at shutdown"
            );
        }
        removed
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_store_bytes {
            return Err(IoError::TooLarge {
                path: self.path.clone(),
                size,
                limit: self.max_store_bytes,
            }
            .into());
        }
        Ok(())
    }

    fn encode(&self, todos: &[Todo]) -> Result<String> {
        let encoded = todo::encode(todos).map_err(|source| FlywheelError::Codec {
            path: self.path.clone(),
            source,
        })?;
        self.check_size(encoded.len() as u64)?;
        Ok(encoded)
    }

    /// Read and decode the store file. The caller holds the lock.
    fn read_locked(&self) -> Result<Vec<Todo>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IoError::other(&self.path, e).into()),
        };
        let size = file
            .metadata()
            .map_err(|e| IoError::other(&self.path, e))?
            .len();
        self.check_size(size)?;

        // Bounded even if the file grows between the check and the read.
        let mut bytes = Vec::with_capacity(size as usize);
        file.take(self.max_store_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| IoError::other(&self.path, e))?;
        self.check_size(bytes.len() as u64)?;

        todo::decode(&bytes).map_err(|source| FlywheelError::Codec {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for TodoStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
