//! Lifecycle control for the ReEnvision AI agent.
//!
//! - [`Supervisor`] owns the [`AppState`] machine and the single container
//!   process, reflecting every transition in the tray and in sleep
//!   prevention.
//! - [`SleepMonitor`] restarts the container after a resume if it was
//!   running before the machine slept.
//! - [`Dispatcher`] is the main loop: it serialises tray clicks, power
//!   notifications and termination into supervisor requests.

mod dispatcher;
mod error;
mod sleep;
mod state;
mod supervisor;
#[cfg(test)]
mod test_support;

pub use dispatcher::{DesktopActions, Dispatcher};
pub use error::{ActionError, LifecycleError};
pub use sleep::{SETTLE_DELAY, SleepMonitor};
pub use state::AppState;
pub use supervisor::{Supervisor, SupervisorBuilder, Timeouts, container_spec};
