//! Filesystem utilities for flywheel.
//!
//! This module provides the atomic write protocol that keeps the store file
//! complete at every observable instant.

pub mod atomic;

pub use atomic::{WriteOptions, atomic_write, backup_path, ensure_parent_directory};
