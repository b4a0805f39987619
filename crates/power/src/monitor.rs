//! OS source of suspend/resume notifications.

use crate::error::PowerError;
use crate::events::{self, PowerEventSender, PowerEvents};

/// Keeps the OS subscription alive; dropping it unregisters.
pub struct PowerMonitor {
    sender: PowerEventSender,
    #[cfg(windows)]
    _registration: platform::Registration,
}

impl PowerMonitor {
    /// Subscribes to suspend/resume notifications.
    ///
    /// On platforms without an OS source the returned events never fire
    /// unless fed through [`PowerMonitor::sender`].
    pub fn start() -> Result<(Self, PowerEvents), PowerError> {
        let (sender, events) = events::channel();

        #[cfg(windows)]
        {
            let registration = platform::Registration::register(sender.clone())?;
            tracing::info!("sleep/wake detection started");
            Ok((
                Self {
                    sender,
                    _registration: registration,
                },
                events,
            ))
        }

        #[cfg(not(windows))]
        {
            tracing::info!("no OS sleep/wake source on this platform; notifications are manual");
            Ok((Self { sender }, events))
        }
    }

    /// Sender feeding the same channels as the OS source.
    pub fn sender(&self) -> PowerEventSender {
        self.sender.clone()
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::c_void;

    use tracing::{debug, info, warn};
    use windows_sys::Win32::System::Power::{
        DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS, PowerRegisterSuspendResumeNotification,
        PowerUnregisterSuspendResumeNotification,
    };

    use crate::error::PowerError;
    use crate::events::PowerEventSender;

    const DEVICE_NOTIFY_CALLBACK: u32 = 2;
    const PBT_APMSUSPEND: u32 = 0x4;
    const PBT_APMRESUMESUSPEND: u32 = 0x7;
    const PBT_APMRESUMEAUTOMATIC: u32 = 0x12;
    const ERROR_SUCCESS: u32 = 0;

    pub(crate) struct Registration {
        handle: *mut c_void,
        // Referenced by the OS callback until unregistered.
        sender: *mut PowerEventSender,
        _params: Box<DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS>,
    }

    // SAFETY: the raw pointers are only dereferenced by the OS callback and
    // freed in Drop after unregistering.
    unsafe impl Send for Registration {}
    unsafe impl Sync for Registration {}

    impl Registration {
        pub(crate) fn register(sender: PowerEventSender) -> Result<Self, PowerError> {
            let sender = Box::into_raw(Box::new(sender));
            let mut params = Box::new(DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS {
                Callback: Some(on_power_event),
                Context: sender as *mut c_void,
            });
            let mut handle = std::ptr::null_mut();

            // SAFETY: params and sender stay alive until Drop unregisters.
            let status = unsafe {
                PowerRegisterSuspendResumeNotification(
                    DEVICE_NOTIFY_CALLBACK,
                    params.as_mut() as *mut DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS as *mut c_void,
                    &mut handle,
                )
            };

            if status != ERROR_SUCCESS {
                // SAFETY: registration failed, nothing else holds the pointer.
                drop(unsafe { Box::from_raw(sender) });
                return Err(PowerError::Registration(status));
            }

            Ok(Self {
                handle: handle as *mut c_void,
                sender,
                _params: params,
            })
        }
    }

    impl Drop for Registration {
        fn drop(&mut self) {
            // SAFETY: handle came from a successful registration.
            let status = unsafe { PowerUnregisterSuspendResumeNotification(self.handle as _) };
            if status != ERROR_SUCCESS {
                warn!(status, "failed to unregister power notifications");
            }
            // SAFETY: no callbacks are delivered after unregistering.
            drop(unsafe { Box::from_raw(self.sender) });
            debug!("sleep/wake detection stopped");
        }
    }

    unsafe extern "system" fn on_power_event(
        context: *const c_void,
        kind: u32,
        _setting: *const c_void,
    ) -> u32 {
        // SAFETY: context is the PowerEventSender registered above.
        let sender = unsafe { &*(context as *const PowerEventSender) };
        match kind {
            PBT_APMSUSPEND => {
                info!("system is going to sleep");
                sender.notify_sleep();
            }
            PBT_APMRESUMEAUTOMATIC | PBT_APMRESUMESUSPEND => {
                info!(event = kind, "system is waking up");
                sender.notify_wake();
            }
            _ => {}
        }
        ERROR_SUCCESS
    }
}
