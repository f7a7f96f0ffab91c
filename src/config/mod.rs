//! Configuration model for flywheel.
//!
//! This module defines the StoreConfig struct that represents `.flywheel.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, validation of config values, and
//! environment overrides.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::StoreConfig;
