//! Power management for the ReEnvision AI agent.
//!
//! [`SleepInhibitor`] keeps the machine awake while the container is busy.
//! [`PowerMonitor`] turns OS suspend/resume broadcasts into [`PowerEvents`]
//! the dispatcher can select on.

mod error;
mod events;
mod inhibit;
mod monitor;

pub use error::PowerError;
pub use events::{PowerEventSender, PowerEvents, channel};
pub use inhibit::SleepInhibitor;
pub use monitor::PowerMonitor;
