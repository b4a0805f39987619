//! Single-instance guard.

pub const MUTEX_NAME: &str = r"Local\ReEnvisionAIMutex";

/// Held for the life of the process; releasing it lets another instance
/// start.
pub struct InstanceGuard {
    #[cfg(windows)]
    handle: windows_sys::Win32::Foundation::HANDLE,
}

/// Returns `None` when another instance already holds the guard.
#[cfg(windows)]
pub fn acquire() -> anyhow::Result<Option<InstanceGuard>> {
    use windows_sys::Win32::Foundation::{CloseHandle, ERROR_ALREADY_EXISTS, GetLastError};
    use windows_sys::Win32::System::Threading::CreateMutexW;

    let name: Vec<u16> = MUTEX_NAME.encode_utf16().chain(std::iter::once(0)).collect();
    // SAFETY: `name` is NUL-terminated and outlives the call.
    let handle = unsafe { CreateMutexW(std::ptr::null(), 0, name.as_ptr()) };
    if handle.is_null() {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: reads the calling thread's last-error value.
    if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
        // SAFETY: `handle` was returned by CreateMutexW above.
        unsafe { CloseHandle(handle) };
        return Ok(None);
    }
    Ok(Some(InstanceGuard { handle }))
}

#[cfg(not(windows))]
pub fn acquire() -> anyhow::Result<Option<InstanceGuard>> {
    Ok(Some(InstanceGuard {}))
}

#[cfg(windows)]
impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // SAFETY: the handle is owned by this guard and closed once.
        unsafe { windows_sys::Win32::Foundation::CloseHandle(self.handle) };
    }
}
