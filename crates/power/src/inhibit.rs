//! Keeps the system awake while the container is starting or running.

use std::sync::{Mutex, mpsc};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::PowerError;

/// Tracks whether sleep is currently prevented and applies changes to the OS.
///
/// Both operations are idempotent from the caller's point of view: a
/// repeated call returns [`PowerError::AlreadyPrevented`] or
/// [`PowerError::AlreadyAllowed`] without touching the OS. Neither call
/// waits for the OS to apply the change.
pub struct SleepInhibitor {
    prevented: Mutex<bool>,
    backend: Backend,
}

impl Default for SleepInhibitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepInhibitor {
    pub fn new() -> Self {
        Self {
            prevented: Mutex::new(false),
            backend: Backend::new(),
        }
    }

    pub fn prevent_sleep(&self) -> Result<(), PowerError> {
        let mut prevented = self.prevented.lock().map_err(|_| PowerError::Poisoned)?;
        if *prevented {
            return Err(PowerError::AlreadyPrevented);
        }
        self.backend.apply(true)?;
        *prevented = true;
        info!("system sleep prevented");
        Ok(())
    }

    pub fn allow_sleep(&self) -> Result<(), PowerError> {
        let mut prevented = self.prevented.lock().map_err(|_| PowerError::Poisoned)?;
        if !*prevented {
            return Err(PowerError::AlreadyAllowed);
        }
        // Cleared even when the OS call fails.
        *prevented = false;
        self.backend.apply(false)?;
        info!("system sleep allowed");
        Ok(())
    }

    pub fn is_sleep_prevented(&self) -> bool {
        self.prevented.lock().map(|p| *p).unwrap_or(false)
    }
}

impl Drop for SleepInhibitor {
    fn drop(&mut self) {
        if self.is_sleep_prevented() {
            debug!("restoring sleep on shutdown");
            let _ = self.allow_sleep();
        }
    }
}

/// Applies execution-state flags on one dedicated thread.
///
/// The execution state belongs to the calling thread, so every change goes
/// through the same thread. `apply` only queues the flags; OS failures are
/// logged from the thread.
struct Backend {
    tx: Option<mpsc::Sender<u32>>,
}

impl Backend {
    fn new() -> Self {
        Self::with_setter(platform::set_execution_state)
    }

    fn with_setter<F>(set: F) -> Self
    where
        F: Fn(u32) -> u32 + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<u32>();
        let spawned = thread::Builder::new()
            .name("reai-power".into())
            .spawn(move || {
                for flags in rx {
                    if set(flags) == 0 {
                        warn!(flags = format_args!("{flags:#x}"), "SetThreadExecutionState failed");
                    }
                }
            });

        match spawned {
            Ok(_) => Self { tx: Some(tx) },
            Err(e) => {
                warn!(error = %e, "failed to start power state thread");
                Self { tx: None }
            }
        }
    }

    fn apply(&self, keep_awake: bool) -> Result<(), PowerError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| PowerError::Api("power state thread unavailable".into()))?;
        tx.send(platform::flags(keep_awake))
            .map_err(|_| PowerError::Api("power state thread stopped".into()))
    }
}

#[cfg(windows)]
mod platform {
    use windows_sys::Win32::System::Power::{
        ES_AWAYMODE_REQUIRED, ES_CONTINUOUS, ES_SYSTEM_REQUIRED, SetThreadExecutionState,
    };

    pub(crate) fn flags(keep_awake: bool) -> u32 {
        if keep_awake {
            ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_AWAYMODE_REQUIRED
        } else {
            ES_CONTINUOUS
        }
    }

    /// Returns the previous state, or 0 on failure.
    pub(crate) fn set_execution_state(flags: u32) -> u32 {
        // SAFETY: SetThreadExecutionState takes plain flags.
        unsafe { SetThreadExecutionState(flags) }
    }
}

#[cfg(not(windows))]
mod platform {
    use tracing::debug;

    pub(crate) fn flags(keep_awake: bool) -> u32 {
        u32::from(keep_awake)
    }

    pub(crate) fn set_execution_state(flags: u32) -> u32 {
        debug!(keep_awake = flags != 0, "sleep control not supported on this platform");
        1
    }
}
