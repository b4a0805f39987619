use reai_config::ConfigError;
use reai_runtime::RuntimeError;

/// Why a start attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LifecycleError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Runtime(e) if e.is_cancelled())
    }
}

/// Error returned by [`crate::DesktopActions`] implementations.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;
