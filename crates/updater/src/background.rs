//! Periodic update checks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::checker::UpdateChecker;

/// When to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Quiet period after startup.
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Checks for updates on `schedule` until `cancel` fires.
///
/// Each advertised release is downloaded (failures logged) and then
/// reported through `on_available` with its version.
pub fn spawn_background_checker<F>(
    checker: Arc<UpdateChecker>,
    schedule: Schedule,
    cancel: CancellationToken,
    on_available: F,
) -> JoinHandle<()>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(schedule.initial_delay) => {}
        }

        loop {
            let checked = tokio::select! {
                _ = cancel.cancelled() => break,
                checked = checker.check() => checked,
            };

            match checked {
                Ok(Some(release)) => {
                    let downloaded = tokio::select! {
                        _ = cancel.cancelled() => break,
                        downloaded = checker.download(&release) => downloaded,
                    };
                    if let Err(e) = downloaded {
                        error!(error = %e, "failed to download new release");
                    }
                    on_available(&release.version);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to check for update"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(schedule.interval) => {}
            }
        }

        debug!("stopping background update checker");
    })
}
