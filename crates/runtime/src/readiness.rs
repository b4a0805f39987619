//! Polls the container service until it answers.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{CommandSpec, combined_output};
use crate::error::RuntimeError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Describes how to bring the container service up and how to ask whether
/// it is ready.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    /// Best-effort start command run once before polling.
    pub ensure: Option<CommandSpec>,
    /// Status command; a zero exit means ready.
    pub check: CommandSpec,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl ReadinessProbe {
    /// Probe for a podman installation: `podman machine start`, then
    /// `podman info` until it succeeds.
    pub fn podman(program: &str) -> Self {
        Self {
            ensure: Some(CommandSpec::new(program, &["machine", "start"])),
            check: CommandSpec::new(program, &["info"]),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// Waits until the check command succeeds.
    ///
    /// The first check runs one poll interval after the ensure step. Fails
    /// with [`RuntimeError::Timeout`] once `timeout` has elapsed (the ensure
    /// step counts against it) and with [`RuntimeError::Cancelled`] as soon
    /// as `cancel` fires.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        if let Some(ensure) = &self.ensure {
            info!(command = %ensure, "starting container service");
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                _ = &mut deadline => return Err(RuntimeError::Timeout(self.timeout)),
                result = ensure.output() => result,
            };
            match result {
                Ok(output) if output.status.success() => {
                    debug!(command = %ensure, "service start command succeeded");
                }
                Ok(output) => warn!(
                    command = %ensure,
                    status = %output.status,
                    output = %combined_output(&output),
                    "service start command failed, continuing to poll"
                ),
                Err(e) => warn!(command = %ensure, error = %e, "service start command failed, continuing to poll"),
            }
        }

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                _ = &mut deadline => return Err(RuntimeError::Timeout(self.timeout)),
                _ = ticker.tick() => {}
            }

            debug!(command = %self.check, "checking service status");
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                _ = &mut deadline => return Err(RuntimeError::Timeout(self.timeout)),
                result = self.check.output() => result,
            };

            match result {
                Ok(output) if output.status.success() => {
                    info!("container service is ready");
                    return Ok(());
                }
                Ok(output) => debug!(status = %output.status, "service not ready yet"),
                Err(e) => debug!(error = %e, "service not ready yet"),
            }
        }
    }
}
