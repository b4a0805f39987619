//! Error types for container runtime operations.

use std::process::ExitStatus;
use std::time::Duration;

/// Errors from spawning, probing, or supervising runtime processes.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process exited with {0}")]
    Exited(ExitStatus),

    #[error("`{program}` failed with {status}: {output}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        output: String,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),
}

impl RuntimeError {
    /// Returns true when the error came from an explicit cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = RuntimeError::Timeout(Duration::from_secs(300));
        assert_eq!(err.to_string(), "timed out after 300s");

        let err = RuntimeError::MissingPipe("stdout");
        assert_eq!(err.to_string(), "child process has no stdout pipe");

        let err = RuntimeError::Spawn {
            program: "podman".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("`podman`"));
    }

    #[test]
    fn cancelled_is_detected() {
        assert!(RuntimeError::Cancelled.is_cancelled());
        assert!(!RuntimeError::Timeout(Duration::ZERO).is_cancelled());
    }
}
