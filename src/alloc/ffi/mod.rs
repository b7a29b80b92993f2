use std::{io, sync::OnceLock};

#[cfg(target_family = "unix")]
mod unix;
#[cfg(target_family = "windows")]
mod windows;

/// Retrieves the system's page size, queried once per process.
///
/// # Platform-specific behavior
/// - **Unix-based systems (Linux, macOS, etc.):**
///   - On macOS, this function uses `libc::vm_page_size` to determine the page size.
///   - On other Unix systems, it uses `libc::sysconf` to get the page size.
///
/// - **Windows:** The function retrieves the page size by calling `GetSystemInfo`
///   and extracting the `dwPageSize` field from the `SYSTEM_INFO` structure.
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    #[cfg(target_family = "unix")]
    {
        *PAGE_SIZE.get_or_init(self::unix::page_size)
    }
    #[cfg(target_family = "windows")]
    {
        *PAGE_SIZE.get_or_init(self::windows::page_size)
    }
}

/// Pins `len` bytes starting at `ptr` to RAM.
#[inline]
pub fn pin(ptr: *const u8, len: usize) -> io::Result<()> {
    #[cfg(target_family = "unix")]
    {
        self::unix::mlock(ptr, len)
    }
    #[cfg(target_family = "windows")]
    {
        self::windows::virtual_lock(ptr, len)
    }
}

/// Makes `len` bytes starting at `ptr` eligible for swap again.
#[inline]
pub fn unpin(ptr: *const u8, len: usize) -> io::Result<()> {
    #[cfg(target_family = "unix")]
    {
        self::unix::munlock(ptr, len)
    }
    #[cfg(target_family = "windows")]
    {
        self::windows::virtual_unlock(ptr, len)
    }
}
