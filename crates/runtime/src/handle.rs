//! Handle to a supervised long-running child process.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::hidden_command;
use crate::error::RuntimeError;

/// A freshly spawned process with its output streams detached for relaying.
pub struct SpawnedProcess {
    pub handle: ProcessHandle,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// A running child bound to a cancellation token.
///
/// Cancelling the token makes [`ProcessHandle::wait`] kill the child and
/// return [`RuntimeError::Cancelled`].
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    /// Spawns `program` with piped stdout/stderr under `cancel`.
    pub fn spawn(
        program: &str,
        args: &[String],
        cancel: CancellationToken,
    ) -> Result<SpawnedProcess, RuntimeError> {
        let mut child = hidden_command(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(RuntimeError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(RuntimeError::MissingPipe("stderr"))?;
        let pid = child.id();

        Ok(SpawnedProcess {
            handle: Self { child, pid, cancel },
            stdout,
            stderr,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Waits for the child to exit.
    ///
    /// Returns `Ok(())` on a zero exit status, [`RuntimeError::Exited`] for
    /// any other status, and [`RuntimeError::Cancelled`] once the token fires
    /// (after the child has been killed and reaped).
    pub async fn wait(&mut self) -> Result<(), RuntimeError> {
        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = self.child.wait() => Some(status?),
        };

        match status {
            Some(status) => exit_result(status),
            None => {
                if let Err(e) = self.child.start_kill() {
                    debug!(pid = ?self.pid, error = %e, "kill after cancellation failed");
                }
                let _ = self.child.wait().await;
                Err(RuntimeError::Cancelled)
            }
        }
    }
}

fn exit_result(status: ExitStatus) -> Result<(), RuntimeError> {
    if status.success() {
        Ok(())
    } else {
        Err(RuntimeError::Exited(status))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".into(), script.into()]
    }

    #[tokio::test]
    async fn clean_exit_is_ok() {
        let spawned = ProcessHandle::spawn("sh", &sh("exit 0"), CancellationToken::new()).unwrap();
        let mut handle = spawned.handle;
        assert!(handle.pid().is_some());
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let spawned = ProcessHandle::spawn("sh", &sh("exit 3"), CancellationToken::new()).unwrap();
        let mut handle = spawned.handle;
        let err = handle.wait().await.unwrap_err();
        match err {
            RuntimeError::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cancellation_kills_child() {
        let cancel = CancellationToken::new();
        let spawned = ProcessHandle::spawn("sh", &sh("exec sleep 30"), cancel.clone()).unwrap();
        let mut handle = spawned.handle;

        let waiter = tokio::spawn(async move { handle.wait().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("wait did not return after cancel")
            .unwrap();
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn spawn_failure_names_program() {
        let err = ProcessHandle::spawn("reai-no-such-runtime", &[], CancellationToken::new())
            .err()
            .unwrap();
        assert!(err.to_string().contains("reai-no-such-runtime"));
    }
}
