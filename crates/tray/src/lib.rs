//! Tray interface for the ReEnvision AI agent.
//!
//! The tray communicates with the agent core via channels:
//! - [`TrayEvent`]: clicks from the tray to the agent (start, stop, quit, ...)
//! - [`TrayUpdate`]: menu redraws and notifications from the agent to the tray
//!
//! Lifecycle code talks to the tray only through [`TrayNotifier`].
//!
//! # Platform notes
//! - The tray event loop must run on its own thread; it owns [`TrayUi`].
//! - Rendering is left to the event loop; [`MenuState::build_menu`]
//!   describes what to draw.

mod menu;
mod tray;

pub use menu::{
    MenuItem, MenuState, QUIT_TITLE, START_TITLE, STOP_TITLE, UPDATE_AVAILABLE_TITLE,
    UPDATE_TITLE, VIEW_LOGS_TITLE,
};
pub use tray::{
    FIRST_USE_MESSAGE, FIRST_USE_TITLE, Notification, TrayConfig, TrayEvent, TrayHandle,
    TrayNotifier, TrayUi, TrayUpdate, UPDATE_NOTIFICATION_TITLE,
};
