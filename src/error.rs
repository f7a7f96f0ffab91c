//! Error types for flywheel.
//!
//! Each concern has its own thiserror enum (`LockError`, `CodecError`,
//! `IoError`); `FlywheelError` wraps them at the store boundary and maps every
//! variant to an exit code.

use crate::exit_codes;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while acquiring or releasing the store lock.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock stayed held by someone else until the deadline passed.
    /// Retryable by the caller.
    #[error("timed out after {:.1}s waiting for lock on '{}'", .waited.as_secs_f64(), .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    /// Native locking is unavailable and strict mode forbids the degraded fallback.
    #[error(
        "native file locking is unavailable for '{}' and strict mode forbids the degraded fallback",
        .path.display()
    )]
    Unsupported { path: PathBuf },

    /// Unexpected filesystem failure while locking or unlocking.
    #[error("lock I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LockError {
    /// Whether retrying the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }
}

/// Failures while encoding or decoding the record list.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The document is not valid JSON.
    #[error("invalid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The document is valid JSON but not a list of well-formed todos.
    #[error("{0}")]
    WrongShape(String),
}

/// Failures while reading or writing the store file.
#[derive(Error, Debug)]
pub enum IoError {
    /// The store file (or a new encoding) exceeds `max_store_bytes`.
    #[error(
        "store file '{}' is {size} bytes, exceeding the {limit} byte limit",
        .path.display()
    )]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Any other filesystem failure.
    #[error("I/O error on '{}': {source}", .path.display())]
    Other {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl IoError {
    pub(crate) fn other(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IoError::Other {
            path: path.into(),
            source,
        }
    }
}

/// Main error type for flywheel operations.
#[derive(Error, Debug)]
pub enum FlywheelError {
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The store file exists but could not be decoded.
    #[error("failed to decode todo store '{}': {source}", .path.display())]
    Codec { path: PathBuf, source: CodecError },

    #[error(transparent)]
    Io(#[from] IoError),

    /// Configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// User provided invalid arguments or referenced a missing todo.
    #[error("{0}")]
    User(String),
}

impl FlywheelError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlywheelError::Lock(_) => exit_codes::LOCK_FAILURE,
            FlywheelError::Codec { .. } => exit_codes::DATA_ERROR,
            FlywheelError::Io(IoError::TooLarge { .. }) => exit_codes::DATA_ERROR,
            FlywheelError::Io(IoError::Other { .. }) => exit_codes::IO_FAILURE,
            FlywheelError::Config(_) | FlywheelError::User(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for flywheel operations.
pub type Result<T> = std::result::Result<T, FlywheelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_error_has_correct_exit_code() {
        let err = FlywheelError::from(LockError::Timeout {
            path: PathBuf::from("todo.json"),
            waited: Duration::from_secs(2),
        });
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn too_large_is_a_data_error() {
        let err = FlywheelError::from(IoError::TooLarge {
            path: PathBuf::from("todo.json"),
            size: 20,
            limit: 10,
        });
        assert_eq!(err.exit_code(), exit_codes::DATA_ERROR);
    }

    #[test]
    fn other_io_is_an_io_failure() {
        let err = FlywheelError::from(IoError::other(
            "todo.json",
            std::io::Error::other("disk on fire"),
        ));
        assert_eq!(err.exit_code(), exit_codes::IO_FAILURE);
    }

    #[test]
    fn codec_error_mentions_path_and_cause() {
        let err = FlywheelError::Codec {
            path: PathBuf::from("/tmp/todo.json"),
            source: CodecError::WrongShape("todo store must be a JSON array".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/todo.json"));
        assert!(message.contains("must be a JSON array"));
        assert_eq!(err.exit_code(), exit_codes::DATA_ERROR);
    }

    #[test]
    fn only_timeout_is_retryable() {
        let timeout = LockError::Timeout {
            path: PathBuf::from("a"),
            waited: Duration::from_millis(100),
        };
        let unsupported = LockError::Unsupported {
            path: PathBuf::from("a"),
        };
        assert!(timeout.is_retryable());
        assert!(!unsupported.is_retryable());
    }

    #[test]
    fn timeout_message_is_descriptive() {
        let err = LockError::Timeout {
            path: PathBuf::from("todo.json"),
            waited: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 1.5s waiting for lock on 'todo.json'"
        );
    }
}
