//! Fatal startup errors shown to the user.

pub const FATAL_TITLE: &str = "ReEnvision AI";

/// Blocks on a message box on Windows; logs and prints elsewhere.
pub fn show_fatal(message: &str) {
    tracing::error!(message, "fatal startup error");
    platform_show(message);
}

#[cfg(windows)]
fn platform_show(message: &str) {
    use windows_sys::Win32::UI::WindowsAndMessaging::{MB_ICONERROR, MB_OK, MessageBoxW};

    let wide = |s: &str| -> Vec<u16> { s.encode_utf16().chain(std::iter::once(0)).collect() };
    let text = wide(message);
    let title = wide(FATAL_TITLE);
    // SAFETY: both buffers are NUL-terminated and live across the call.
    unsafe {
        MessageBoxW(std::ptr::null_mut(), text.as_ptr(), title.as_ptr(), MB_OK | MB_ICONERROR);
    }
}

#[cfg(not(windows))]
fn platform_show(message: &str) {
    eprintln!("{FATAL_TITLE}: {message}");
}
