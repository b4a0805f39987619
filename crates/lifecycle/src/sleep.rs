//! Restarting the container after the machine wakes up.

use std::sync::Mutex;
use std::time::Duration;

use reai_tray::TrayEvent;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::state::AppState;
use crate::supervisor::Supervisor;

/// Pause after resume before the restart request is sent.
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Remembers whether the container was running when the system went to
/// sleep and asks for a start once it wakes up stopped.
pub struct SleepMonitor {
    supervisor: Supervisor,
    requests: mpsc::UnboundedSender<TrayEvent>,
    was_running_before_sleep: Mutex<bool>,
    settle_delay: Duration,
}

impl SleepMonitor {
    /// Restart requests are sent as [`TrayEvent::StartContainer`] on
    /// `requests`, the same path a tray click takes.
    pub fn new(supervisor: Supervisor, requests: mpsc::UnboundedSender<TrayEvent>) -> Self {
        Self {
            supervisor,
            requests,
            was_running_before_sleep: Mutex::new(false),
            settle_delay: SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn on_sleep(&self) {
        let running = self.supervisor.state() == AppState::Running;
        if let Ok(mut flag) = self.was_running_before_sleep.lock() {
            *flag = running;
        }
        info!(was_running = running, "system going to sleep");
    }

    /// Returns true if a restart was scheduled.
    pub fn on_wake(&self) -> bool {
        let was_running = match self.was_running_before_sleep.lock() {
            Ok(mut flag) => std::mem::take(&mut *flag),
            Err(_) => false,
        };
        let state = self.supervisor.state();

        if !was_running || !matches!(state, AppState::Stopped | AppState::Error) {
            debug!(was_running, state = %state, "system resumed, no restart needed");
            return false;
        }

        info!(state = %state, delay = ?self.settle_delay, "system resumed, restarting container");
        let requests = self.requests.clone();
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if requests.send(TrayEvent::StartContainer).is_err() {
                debug!("dispatcher gone, restart request dropped");
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRuntime, harness};

    fn monitor() -> (SleepMonitor, Supervisor, mpsc::UnboundedReceiver<TrayEvent>) {
        let h = harness(FakeRuntime::new("exec sleep 30"));
        let (tx, rx) = mpsc::unbounded_channel();
        (SleepMonitor::new(h.supervisor.clone(), tx), h.supervisor, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_after_settle_delay_when_container_died() {
        let (monitor, supervisor, mut rx) = monitor();
        supervisor.force_state(AppState::Running);
        monitor.on_sleep();
        supervisor.force_state(AppState::Error);

        assert!(monitor.on_wake());
        tokio::time::sleep(SETTLE_DELAY - Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.try_recv().unwrap(), TrayEvent::StartContainer);
    }

    #[tokio::test(start_paused = true)]
    async fn no_restart_when_still_running() {
        let (monitor, supervisor, mut rx) = monitor();
        supervisor.force_state(AppState::Running);
        monitor.on_sleep();

        assert!(!monitor.on_wake());
        tokio::time::sleep(SETTLE_DELAY * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn no_restart_when_stopped_before_sleep() {
        let (monitor, _supervisor, mut rx) = monitor();
        monitor.on_sleep();
        assert!(!monitor.on_wake());
        tokio::time::sleep(SETTLE_DELAY * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn flag_is_consumed_by_one_wake() {
        let (monitor, supervisor, _rx) = monitor();
        supervisor.force_state(AppState::Running);
        monitor.on_sleep();
        supervisor.force_state(AppState::Stopped);

        assert!(monitor.on_wake());
        assert!(!monitor.on_wake());
    }

    #[tokio::test(start_paused = true)]
    async fn wake_without_sleep_is_ignored() {
        let (monitor, supervisor, _rx) = monitor();
        supervisor.force_state(AppState::Error);
        assert!(!monitor.on_wake());
    }
}
