//! The agent's main loop.
//!
//! Tray clicks, power notifications and the termination signal are merged
//! into one `select!` loop that forwards each request to the supervisor or
//! the desktop integration.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reai_power::PowerEvents;
use reai_tray::{TrayEvent, TrayNotifier};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ActionError;
use crate::sleep::SleepMonitor;
use crate::supervisor::Supervisor;

/// Desktop side effects the dispatcher triggers but does not implement.
pub trait DesktopActions: Send + Sync {
    /// Opens the log location for the user.
    fn show_logs(&self) -> Result<(), ActionError>;

    /// Shows the getting-started experience.
    fn first_use(&self) -> Result<(), ActionError>;

    /// Stops background update work and returns the staged installer.
    fn prepare_upgrade(&self) -> Result<PathBuf, ActionError>;

    /// Launches the installer; the process exits right after.
    fn launch_upgrade(&self, installer: &Path) -> Result<(), ActionError>;
}

pub struct Dispatcher {
    supervisor: Supervisor,
    monitor: SleepMonitor,
    tray: Arc<dyn TrayNotifier>,
    actions: Arc<dyn DesktopActions>,
    events: mpsc::UnboundedReceiver<TrayEvent>,
    power: PowerEvents,
    terminate: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        supervisor: Supervisor,
        monitor: SleepMonitor,
        tray: Arc<dyn TrayNotifier>,
        actions: Arc<dyn DesktopActions>,
        events: mpsc::UnboundedReceiver<TrayEvent>,
        power: PowerEvents,
        terminate: CancellationToken,
    ) -> Self {
        Self {
            supervisor,
            monitor,
            tray,
            actions,
            events,
            power,
            terminate,
        }
    }

    /// Runs until quit, upgrade, or termination.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.terminate.cancelled() => {
                    info!("termination requested, shutting down");
                    self.quit().await;
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("tray event channel closed");
                        self.quit().await;
                        break;
                    };
                    if self.handle(event).await.is_break() {
                        break;
                    }
                }
                Some(()) = self.power.sleep.recv() => self.monitor.on_sleep(),
                Some(()) = self.power.wake.recv() => {
                    self.monitor.on_wake();
                }
            }
        }
    }

    async fn handle(&self, event: TrayEvent) -> ControlFlow<()> {
        debug!(?event, "tray event");
        match event {
            TrayEvent::Quit => {
                info!("quit requested");
                self.quit().await;
                return ControlFlow::Break(());
            }
            TrayEvent::StartContainer => {
                self.supervisor.request_start();
            }
            TrayEvent::StopContainer => {
                self.supervisor.request_stop();
            }
            TrayEvent::ShowLogs => {
                if let Err(e) = self.actions.show_logs() {
                    warn!(error = %e, "failed to show logs");
                }
            }
            TrayEvent::DoFirstUse => {
                if let Err(e) = self.actions.first_use() {
                    warn!(error = %e, "failed to show getting started");
                }
            }
            TrayEvent::Update => match self.actions.prepare_upgrade() {
                Ok(installer) => {
                    info!(installer = %installer.display(), "upgrading");
                    self.quit().await;
                    if let Err(e) = self.actions.launch_upgrade(&installer) {
                        error!(error = %e, "failed to launch installer");
                    }
                    return ControlFlow::Break(());
                }
                Err(e) => warn!(error = %e, "upgrade unavailable"),
            },
        }
        ControlFlow::Continue(())
    }

    async fn quit(&self) {
        self.supervisor.shutdown().await;
        self.tray.quit();
        info!("finished exit procedures");
    }
}
