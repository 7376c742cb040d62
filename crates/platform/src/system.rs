//! System resource probes used when sizing caches.

const MIB: u64 = 1024 * 1024;

/// Handle limit assumed when the OS cannot be queried.
pub const FALLBACK_HANDLE_LIMIT: usize = 8192;

/// Total physical memory in MiB, if the platform can report it.
pub fn physical_memory_mb() -> Option<u64> {
    physical_ram_bytes().map(|bytes| bytes / MIB)
}

#[cfg(target_os = "macos")]
fn physical_ram_bytes() -> Option<u64> {
    use std::ffi::CString;
    use std::mem::size_of;
    use std::ptr;

    let key = CString::new("hw.memsize").ok()?;
    let mut value: u64 = 0;
    let mut len = size_of::<u64>();
    let rc = unsafe {
        libc::sysctlbyname(
            key.as_ptr(),
            &mut value as *mut u64 as *mut libc::c_void,
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc == 0 && len == size_of::<u64>() {
        Some(value)
    } else {
        None
    }
}

#[cfg(target_os = "linux")]
fn physical_ram_bytes() -> Option<u64> {
    let mut info = std::mem::MaybeUninit::<libc::sysinfo>::uninit();
    let rc = unsafe { libc::sysinfo(info.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let info = unsafe { info.assume_init() };
    Some((info.totalram as u64).saturating_mul(info.mem_unit as u64))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn physical_ram_bytes() -> Option<u64> {
    None
}

/// How many shared memory handles this process may hold at once.
///
/// Shared memory segments are file descriptors on Unix, so this is the soft
/// `RLIMIT_NOFILE`, clamped to `i32::MAX`.
#[cfg(unix)]
pub fn shared_memory_handle_limit() -> usize {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc != 0 {
        return FALLBACK_HANDLE_LIMIT;
    }
    clamp_handle_limit(limit.rlim_cur as u64)
}

#[cfg(not(unix))]
pub fn shared_memory_handle_limit() -> usize {
    FALLBACK_HANDLE_LIMIT
}

fn clamp_handle_limit(raw: u64) -> usize {
    raw.min(i32::MAX as u64) as usize
}
