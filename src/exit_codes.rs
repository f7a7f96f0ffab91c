//! Exit code constants for the flywheel CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, unknown todo)
//! - 2: Data error (store file malformed or too large)
//! - 3: I/O failure (store file could not be read or replaced)
//! - 4: Lock acquisition failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or unknown todo id.
pub const USER_ERROR: i32 = 1;

/// Data error: the store file could not be decoded or exceeds the size limit.
pub const DATA_ERROR: i32 = 2;

/// I/O failure: reading, writing, or replacing the store file failed.
pub const IO_FAILURE: i32 = 3;

/// Lock acquisition failure: timeout, unsupported locking, or lock I/O error.
pub const LOCK_FAILURE: i32 = 4;
