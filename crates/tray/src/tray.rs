//! Tray handle, events, and update types.
//!
//! This module defines the channel-based interface between the agent core
//! and whatever renders the tray icon. Events flow from the tray into an
//! async channel the dispatcher selects on; updates flow back over a
//! blocking channel drained by the tray event loop thread.

use std::sync::{Mutex, mpsc};

use tokio::sync::mpsc as async_mpsc;
use tracing::debug;

use crate::menu::MenuState;

pub const FIRST_USE_TITLE: &str = "ReEnvision AI is running";
pub const FIRST_USE_MESSAGE: &str = "Click here to get started";
pub const UPDATE_NOTIFICATION_TITLE: &str = "Update available";

/// Configuration for the system tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Tooltip and notification title.
    pub title: String,
    /// Optional icon data (PNG bytes).
    pub icon_data: Option<Vec<u8>>,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            title: "ReEnvision AI".into(),
            icon_data: None,
        }
    }
}

/// Events emitted by the tray to the agent core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayEvent {
    Quit,
    Update,
    ShowLogs,
    StartContainer,
    StopContainer,
    DoFirstUse,
}

/// A balloon notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Event emitted when the notification is clicked.
    pub on_click: Option<TrayEvent>,
}

/// Updates sent from the agent core to the tray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    /// Menu needs to be redrawn from this state.
    Menu(MenuState),
    Notify(Notification),
    /// Request tray shutdown.
    Shutdown,
}

/// What the lifecycle code needs from the tray.
///
/// Implementations must not block; they are called while the supervisor
/// holds its state lock.
pub trait TrayNotifier: Send + Sync {
    fn change_status_text(&self, text: &str);
    fn set_started(&self);
    fn set_stopped(&self);
    fn display_first_use_notification(&self);
    fn update_available(&self, version: &str);
    fn quit(&self);
}

/// Channel ends owned by the tray event loop.
pub struct TrayUi {
    /// Send clicks back to the agent core.
    pub events: async_mpsc::UnboundedSender<TrayEvent>,
    /// Receive menu redraws and notifications.
    pub updates: mpsc::Receiver<TrayUpdate>,
}

/// Agent-side handle for the tray.
pub struct TrayHandle {
    config: TrayConfig,
    update_tx: mpsc::Sender<TrayUpdate>,
    state: Mutex<MenuState>,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_receiver, ui)`: the dispatcher consumes the
    /// receiver and the tray event loop owns `ui`.
    pub fn new(
        config: TrayConfig,
    ) -> (Self, async_mpsc::UnboundedReceiver<TrayEvent>, TrayUi) {
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = async_mpsc::unbounded_channel();

        let handle = Self {
            config,
            update_tx,
            state: Mutex::new(MenuState::default()),
        };
        let ui = TrayUi {
            events: event_tx,
            updates: update_rx,
        };

        (handle, event_rx, ui)
    }

    /// Returns a copy of the current menu state.
    pub fn state(&self) -> MenuState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    fn modify(&self, f: impl FnOnce(&mut MenuState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
            self.send(TrayUpdate::Menu(state.clone()));
        }
    }

    fn send(&self, update: TrayUpdate) {
        if self.update_tx.send(update).is_err() {
            debug!("tray event loop gone, update dropped");
        }
    }
}

impl TrayNotifier for TrayHandle {
    fn change_status_text(&self, text: &str) {
        self.modify(|s| s.status_text = text.to_string());
    }

    fn set_started(&self) {
        self.modify(|s| s.started = true);
    }

    fn set_stopped(&self) {
        self.modify(|s| s.started = false);
    }

    fn display_first_use_notification(&self) {
        self.send(TrayUpdate::Notify(Notification {
            title: FIRST_USE_TITLE.into(),
            message: FIRST_USE_MESSAGE.into(),
            on_click: Some(TrayEvent::DoFirstUse),
        }));
    }

    fn update_available(&self, version: &str) {
        let mut notify = false;
        self.modify(|s| {
            notify = s.pending_update.is_none();
            s.pending_update = Some(version.to_string());
        });
        if notify {
            self.send(TrayUpdate::Notify(Notification {
                title: UPDATE_NOTIFICATION_TITLE.into(),
                message: format!("{} version {version} is ready to install", self.config.title),
                on_click: Some(TrayEvent::Update),
            }));
        }
    }

    fn quit(&self) {
        self.send(TrayUpdate::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mpsc::Receiver<TrayUpdate>) -> Vec<TrayUpdate> {
        rx.try_iter().collect()
    }

    #[test]
    fn tray_handle_creation() {
        let (handle, _events, _ui) = TrayHandle::new(TrayConfig::default());
        assert_eq!(handle.title(), "ReEnvision AI");
        assert_eq!(handle.state(), MenuState::default());
    }

    #[test]
    fn status_changes_redraw_menu() {
        let (handle, _events, ui) = TrayHandle::new(TrayConfig::default());

        handle.change_status_text("Starting...");
        handle.set_started();

        let updates = drain(&ui.updates);
        assert_eq!(updates.len(), 2);
        match &updates[1] {
            TrayUpdate::Menu(state) => {
                assert_eq!(state.status_text, "Starting...");
                assert!(state.started);
            }
            other => panic!("unexpected update: {other:?}"),
        }

        handle.set_stopped();
        assert!(!handle.state().started);
    }

    #[test]
    fn update_notification_sent_once() {
        let (handle, _events, ui) = TrayHandle::new(TrayConfig::default());

        handle.update_available("v0.2.0");
        handle.update_available("v0.2.1");

        let notifications: Vec<_> = drain(&ui.updates)
            .into_iter()
            .filter_map(|u| match u {
                TrayUpdate::Notify(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].message.contains("v0.2.0"));
        assert_eq!(notifications[0].on_click, Some(TrayEvent::Update));
        assert_eq!(handle.state().pending_update.as_deref(), Some("v0.2.1"));
    }

    #[test]
    fn first_use_notification_routes_to_first_use() {
        let (handle, _events, ui) = TrayHandle::new(TrayConfig::default());
        handle.display_first_use_notification();

        match ui.updates.try_recv().unwrap() {
            TrayUpdate::Notify(n) => {
                assert_eq!(n.title, FIRST_USE_TITLE);
                assert_eq!(n.on_click, Some(TrayEvent::DoFirstUse));
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn tray_handle_shutdown() {
        let (handle, _events, ui) = TrayHandle::new(TrayConfig::default());
        handle.quit();
        assert_eq!(ui.updates.recv().unwrap(), TrayUpdate::Shutdown);
    }

    #[test]
    fn clicks_reach_the_agent() {
        let (_handle, mut events, ui) = TrayHandle::new(TrayConfig::default());
        ui.events.send(TrayEvent::StopContainer).unwrap();
        assert_eq!(events.try_recv().unwrap(), TrayEvent::StopContainer);
    }

    #[test]
    fn closed_tray_does_not_panic() {
        let (handle, _events, ui) = TrayHandle::new(TrayConfig::default());
        drop(ui);
        handle.change_status_text("Running");
        handle.quit();
    }
}
