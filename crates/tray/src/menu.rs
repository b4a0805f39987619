//! Context menu model for the tray icon.

use crate::tray::TrayEvent;

pub const QUIT_TITLE: &str = "Quit ReEnvision AI";
pub const UPDATE_AVAILABLE_TITLE: &str = "An update is available";
pub const UPDATE_TITLE: &str = "Restart to update";
pub const VIEW_LOGS_TITLE: &str = "View logs";
pub const START_TITLE: &str = "Start";
pub const STOP_TITLE: &str = "Stop";

/// A single menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Display text. Empty for separators.
    pub label: String,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    /// Event emitted on click.
    pub action: Option<TrayEvent>,
}

impl MenuItem {
    fn action(label: &str, enabled: bool, action: TrayEvent) -> Self {
        Self {
            label: label.into(),
            enabled,
            action: Some(action),
        }
    }

    fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: false,
            action: None,
        }
    }

    fn separator() -> Self {
        Self::text(String::new())
    }

    pub fn is_separator(&self) -> bool {
        self.label.is_empty() && self.action.is_none()
    }
}

/// Current state used to build the context menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    /// Status line shown at the top.
    pub status_text: String,
    /// Whether the container is started (Stop enabled, Start disabled).
    pub started: bool,
    /// Version of a staged update, if any.
    pub pending_update: Option<String>,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            status_text: "Stopped".into(),
            started: false,
            pending_update: None,
        }
    }
}

impl MenuState {
    /// Builds the menu items from the current state, top to bottom.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let mut items = vec![
            MenuItem::text(format!("Status: {}", self.status_text)),
            MenuItem::separator(),
        ];

        if self.pending_update.is_some() {
            items.push(MenuItem::text(UPDATE_AVAILABLE_TITLE));
            items.push(MenuItem::action(UPDATE_TITLE, true, TrayEvent::Update));
            items.push(MenuItem::separator());
        }

        items.push(MenuItem::action(
            START_TITLE,
            !self.started,
            TrayEvent::StartContainer,
        ));
        items.push(MenuItem::action(
            STOP_TITLE,
            self.started,
            TrayEvent::StopContainer,
        ));
        items.push(MenuItem::separator());
        items.push(MenuItem::action(VIEW_LOGS_TITLE, true, TrayEvent::ShowLogs));
        items.push(MenuItem::separator());
        items.push(MenuItem::action(QUIT_TITLE, true, TrayEvent::Quit));

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(items: &[MenuItem], action: TrayEvent) -> &MenuItem {
        items
            .iter()
            .find(|i| i.action == Some(action.clone()))
            .unwrap()
    }

    #[test]
    fn default_menu_state() {
        let state = MenuState::default();
        assert_eq!(state.status_text, "Stopped");
        assert!(!state.started);
        assert!(state.pending_update.is_none());
    }

    #[test]
    fn stopped_menu_enables_start_only() {
        let items = MenuState::default().build_menu();
        assert_eq!(items[0].label, "Status: Stopped");
        assert!(find(&items, TrayEvent::StartContainer).enabled);
        assert!(!find(&items, TrayEvent::StopContainer).enabled);
    }

    #[test]
    fn started_menu_enables_stop_only() {
        let state = MenuState {
            status_text: "Running".into(),
            started: true,
            pending_update: None,
        };
        let items = state.build_menu();
        assert!(items[0].label.contains("Running"));
        assert!(!find(&items, TrayEvent::StartContainer).enabled);
        assert!(find(&items, TrayEvent::StopContainer).enabled);
    }

    #[test]
    fn update_entry_only_when_pending() {
        let items = MenuState::default().build_menu();
        assert!(!items.iter().any(|i| i.action == Some(TrayEvent::Update)));

        let state = MenuState {
            pending_update: Some("v0.2.0".into()),
            ..MenuState::default()
        };
        let items = state.build_menu();
        assert!(items.iter().any(|i| i.label == UPDATE_AVAILABLE_TITLE));
        assert_eq!(find(&items, TrayEvent::Update).label, UPDATE_TITLE);
    }

    #[test]
    fn quit_is_last_and_enabled() {
        let items = MenuState::default().build_menu();
        let last = items.last().unwrap();
        assert_eq!(last.action, Some(TrayEvent::Quit));
        assert!(last.enabled);
        assert_eq!(last.label, QUIT_TITLE);
    }

    #[test]
    fn separators_have_no_action() {
        let items = MenuState::default().build_menu();
        assert!(items[1].is_separator());
        assert!(!items[0].is_separator());
    }
}
