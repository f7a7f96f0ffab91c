//! Native OS file locks.
//!
//! The lock is taken on a sibling handle file (`{store}.flock`) that is never
//! replaced, because the atomic writer swaps the store file's inode on every
//! save. The same handle must be used to unlock.

use super::types::LockIntent;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Offset the lock range starts at. The handle is repositioned here before
/// every lock/unlock call: byte-range APIs that lock "from the current
/// position" silently cover the wrong bytes otherwise.
pub const LOCK_OFFSET: u64 = 0;

/// Fixed synthetic extent locked on platforms with byte-range locks. The
/// store size is unknown and changing, so the range is a constant rather
/// than the current file length; release uses the same value.
pub const LOCK_RANGE_BYTES: u64 = 0x7fff_ffff;

/// An open handle on the native lock file.
#[derive(Debug)]
pub(crate) struct NativeHandle {
    file: File,
    path: PathBuf,
    locked: bool,
}

impl NativeHandle {
    /// Open (or create) the lock handle file.
    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            locked: false,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Request the lock without blocking.
    ///
    /// Returns `Ok(false)` when another holder has it ("would block"); any
    /// other failure is returned as an error.
    pub(crate) fn try_lock(&mut self, intent: LockIntent) -> io::Result<bool> {
        self.reposition()?;
        let acquired = sys::try_lock(&self.file, intent)?;
        self.locked = acquired;
        Ok(acquired)
    }

    /// Release the lock over the same extent. No-op if not locked.
    pub(crate) fn unlock(&mut self) -> io::Result<()> {
        if !self.locked {
            return Ok(());
        }
        self.reposition()?;
        sys::unlock(&self.file)?;
        self.locked = false;
        Ok(())
    }

    fn reposition(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.seek(SeekFrom::Start(LOCK_OFFSET))?;
        Ok(())
    }
}

#[cfg(unix)]
mod sys {
    use super::LockIntent;
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    // flock(2) locks are owned by the open file description, so two handles
    // in one process contend exactly like two processes do. The lock always
    // covers the whole file.
    pub fn try_lock(file: &File, intent: LockIntent) -> io::Result<bool> {
        let op = match intent {
            LockIntent::Exclusive => libc::LOCK_EX,
            LockIntent::Shared => libc::LOCK_SH,
        };

        // SAFETY: the fd is valid for the lifetime of `file`.
        let result = unsafe { libc::flock(file.as_raw_fd(), op | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK || code == libc::EAGAIN => Ok(false),
            Some(code) if code == libc::EINTR => Ok(false),
            _ => Err(err),
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        // SAFETY: the fd is valid for the lifetime of `file`.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::{LOCK_OFFSET, LOCK_RANGE_BYTES, LockIntent};
    use std::ffi::c_void;
    use std::fs::File;
    use std::io;
    use std::os::windows::io::AsRawHandle;

    const LOCKFILE_FAIL_IMMEDIATELY: u32 = 0x1;
    const LOCKFILE_EXCLUSIVE_LOCK: u32 = 0x2;
    const ERROR_LOCK_VIOLATION: i32 = 33;
    const ERROR_IO_PENDING: i32 = 997;

    #[repr(C)]
    struct Overlapped {
        internal: usize,
        internal_high: usize,
        offset: u32,
        offset_high: u32,
        h_event: *mut c_void,
    }

    impl Overlapped {
        fn at_lock_offset() -> Self {
            Self {
                internal: 0,
                internal_high: 0,
                offset: LOCK_OFFSET as u32,
                offset_high: (LOCK_OFFSET >> 32) as u32,
                h_event: std::ptr::null_mut(),
            }
        }
    }

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn LockFileEx(
            hFile: *mut c_void,
            dwFlags: u32,
            dwReserved: u32,
            nNumberOfBytesToLockLow: u32,
            nNumberOfBytesToLockHigh: u32,
            lpOverlapped: *mut Overlapped,
        ) -> i32;

        fn UnlockFileEx(
            hFile: *mut c_void,
            dwReserved: u32,
            nNumberOfBytesToUnlockLow: u32,
            nNumberOfBytesToUnlockHigh: u32,
            lpOverlapped: *mut Overlapped,
        ) -> i32;
    }

    fn range_words() -> (u32, u32) {
        (LOCK_RANGE_BYTES as u32, (LOCK_RANGE_BYTES >> 32) as u32)
    }

    pub fn try_lock(file: &File, intent: LockIntent) -> io::Result<bool> {
        let mut flags = LOCKFILE_FAIL_IMMEDIATELY;
        if intent == LockIntent::Exclusive {
            flags |= LOCKFILE_EXCLUSIVE_LOCK;
        }
        let (low, high) = range_words();
        let mut overlapped = Overlapped::at_lock_offset();

        // SAFETY: the handle is valid for the lifetime of `file` and the
        // OVERLAPPED struct outlives this synchronous call.
        let result = unsafe {
            LockFileEx(
                file.as_raw_handle() as *mut c_void,
                flags,
                0,
                low,
                high,
                &mut overlapped,
            )
        };
        if result != 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(ERROR_LOCK_VIOLATION) | Some(ERROR_IO_PENDING) => Ok(false),
            _ => Err(err),
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        let (low, high) = range_words();
        let mut overlapped = Overlapped::at_lock_offset();

        // SAFETY: same handle and extent as the matching LockFileEx call.
        let result = unsafe {
            UnlockFileEx(
                file.as_raw_handle() as *mut c_void,
                0,
                low,
                high,
                &mut overlapped,
            )
        };
        if result != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use super::LockIntent;
    use std::fs::File;
    use std::io;

    pub fn try_lock(_file: &File, _intent: LockIntent) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "native file locking is not available on this platform",
        ))
    }

    pub fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_excludes_second_handle() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.flock");

        let mut first = NativeHandle::open(&path).unwrap();
        let mut second = NativeHandle::open(&path).unwrap();

        assert!(first.try_lock(LockIntent::Exclusive).unwrap());
        assert!(!second.try_lock(LockIntent::Exclusive).unwrap());
        assert!(!second.try_lock(LockIntent::Shared).unwrap());

        first.unlock().unwrap();
        assert!(second.try_lock(LockIntent::Exclusive).unwrap());
    }

    #[test]
    fn test_shared_holders_coexist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("todo.json.flock");

        let mut a = NativeHandle::open(&path).unwrap();
        let mut b = NativeHandle::open(&path).unwrap();
        let mut writer = NativeHandle::open(&path).unwrap();

        assert!(a.try_lock(LockIntent::Shared).unwrap());
        assert!(b.try_lock(LockIntent::Shared).unwrap());
        assert!(!writer.try_lock(LockIntent::Exclusive).unwrap());

        a.unlock().unwrap();
        b.unlock().unwrap();
        assert!(writer.try_lock(LockIntent::Exclusive).unwrap());
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut handle = NativeHandle::open(&temp_dir.path().join("x.flock")).unwrap();
        handle.unlock().unwrap();
        handle.unlock().unwrap();
    }
}
