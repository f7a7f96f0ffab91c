//! Flywheel: a crash-safe, single-file todo store.
//!
//! The store is one JSON file shared by any number of processes. Writers are
//! serialized by a cross-process lock (the platform file lock, or a
//! create-new lock artifact with stale-holder reclaim where that is
//! unavailable), and every save replaces the file atomically so readers never
//! observe a partial document.
//!
//! ```no_run
//! use flywheel::{StoreConfig, TodoStore, Todo};
//!
//! # fn main() -> flywheel::Result<()> {
//! let config = StoreConfig::default();
//! let store = TodoStore::open(&config, std::path::Path::new("."))?;
//! store.update(|todos| {
//!     let id = flywheel::todo::next_id(todos);
//!     todos.push(Todo::new(id, "water the plants")?);
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod store;
pub mod todo;

pub use config::StoreConfig;
pub use error::{FlywheelError, Result};
pub use store::TodoStore;
pub use todo::Todo;
