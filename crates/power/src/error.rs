//! Error types for power management.

/// Errors from sleep control and power notification registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowerError {
    #[error("sleep prevention is already active")]
    AlreadyPrevented,

    #[error("sleep is already allowed")]
    AlreadyAllowed,

    #[error("power API call failed: {0}")]
    Api(String),

    #[error("failed to register for suspend/resume notifications (error {0})")]
    Registration(u32),

    #[error("power state lock poisoned")]
    Poisoned,
}

impl PowerError {
    /// True for the "nothing to do" outcomes of repeated calls.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::AlreadyPrevented | Self::AlreadyAllowed)
    }
}
