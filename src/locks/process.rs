//! Process liveness probe used by the stale-lock reclaimer.
//!
//! On Unix this is `kill(pid, 0)`: no signal is delivered, the kernel only
//! checks that the pid exists. `EPERM` means the process exists but belongs
//! to another user, so it counts as alive. On Windows the process is opened
//! for query and its exit code compared with `STILL_ACTIVE`. Elsewhere every
//! holder is assumed alive, which leaves only the age test.

/// Whether `pid` names a running process on this host.
pub fn is_process_alive(pid: u32) -> bool {
    sys::is_process_alive(pid)
}

#[cfg(unix)]
mod sys {
    pub fn is_process_alive(pid: u32) -> bool {
        // pid 0 and negative values address process groups, never a single holder.
        let pid = match libc::pid_t::try_from(pid) {
            Ok(pid) if pid > 0 => pid,
            _ => return false,
        };

        // SAFETY: kill with sig=0 never sends a signal; it only checks PID existence.
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(windows)]
mod sys {
    use std::ffi::c_void;

    const PROCESS_QUERY_LIMITED_INFORMATION: u32 = 0x1000;
    const STILL_ACTIVE: u32 = 259;
    const ERROR_ACCESS_DENIED: i32 = 5;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn OpenProcess(dwDesiredAccess: u32, bInheritHandle: i32, dwProcessId: u32)
        -> *mut c_void;
        fn GetExitCodeProcess(hProcess: *mut c_void, lpExitCode: *mut u32) -> i32;
        fn CloseHandle(hObject: *mut c_void) -> i32;
    }

    pub fn is_process_alive(pid: u32) -> bool {
        if pid == 0 {
            return false;
        }

        // SAFETY: OpenProcess has no memory-safety preconditions; a null
        // return is handled below.
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        if handle.is_null() {
            return std::io::Error::last_os_error().raw_os_error() == Some(ERROR_ACCESS_DENIED);
        }

        let mut exit_code = 0u32;
        // SAFETY: handle is a valid process handle owned here and closed below.
        let ok = unsafe { GetExitCodeProcess(handle, &mut exit_code) };
        // SAFETY: handle was returned by OpenProcess and is closed exactly once.
        unsafe {
            CloseHandle(handle);
        }
        ok == 0 || exit_code == STILL_ACTIVE
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    pub fn is_process_alive(_pid: u32) -> bool {
        true
    }
}
