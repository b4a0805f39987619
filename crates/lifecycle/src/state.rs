use std::fmt;

/// Application state as seen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
    /// No GPU available; the container was not started.
    Thankyou,
}

impl AppState {
    /// Status line shown in the tray.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Starting => "Starting...",
            Self::Running => "Running",
            Self::Stopping => "Stopping...",
            Self::Error => "Please restart ReEnvision AI",
            Self::Thankyou => "Thank you!",
        }
    }

    pub fn can_start(self) -> bool {
        matches!(self, Self::Stopped | Self::Error | Self::Thankyou)
    }

    pub fn can_stop(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether the machine should be kept awake in this state.
    pub fn keeps_awake(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether a container lifecycle may still be in flight.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
            Self::Thankyou => "thankyou",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AppState; 6] = [
        AppState::Stopped,
        AppState::Starting,
        AppState::Running,
        AppState::Stopping,
        AppState::Error,
        AppState::Thankyou,
    ];

    #[test]
    fn start_and_stop_guards_are_disjoint() {
        for state in ALL {
            assert!(!(state.can_start() && state.can_stop()), "{state}");
        }
        assert!(!AppState::Stopping.can_start());
        assert!(!AppState::Stopping.can_stop());
    }

    #[test]
    fn status_texts() {
        assert_eq!(AppState::Starting.status_text(), "Starting...");
        assert_eq!(AppState::Error.status_text(), "Please restart ReEnvision AI");
        assert_eq!(AppState::Thankyou.status_text(), "Thank you!");
    }

    #[test]
    fn only_busy_states_keep_awake() {
        let awake: Vec<_> = ALL.into_iter().filter(|s| s.keeps_awake()).collect();
        assert_eq!(awake, vec![AppState::Starting, AppState::Running]);
    }
}
