//! Suspend/resume notifications delivered over one-slot channels.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Receiving side consumed by the dispatcher.
#[derive(Debug)]
pub struct PowerEvents {
    pub sleep: mpsc::Receiver<()>,
    pub wake: mpsc::Receiver<()>,
}

/// Sending side handed to the OS callback (or to tests).
///
/// Sends never block: a notification arriving while the previous one is
/// still unread is dropped.
#[derive(Debug, Clone)]
pub struct PowerEventSender {
    sleep: mpsc::Sender<()>,
    wake: mpsc::Sender<()>,
}

/// Creates a connected sender/receiver pair, each channel holding one slot.
pub fn channel() -> (PowerEventSender, PowerEvents) {
    let (sleep_tx, sleep_rx) = mpsc::channel(1);
    let (wake_tx, wake_rx) = mpsc::channel(1);
    (
        PowerEventSender {
            sleep: sleep_tx,
            wake: wake_tx,
        },
        PowerEvents {
            sleep: sleep_rx,
            wake: wake_rx,
        },
    )
}

impl PowerEventSender {
    /// Returns true if the notification was queued.
    pub fn notify_sleep(&self) -> bool {
        offer(&self.sleep, "sleep")
    }

    /// Returns true if the notification was queued.
    pub fn notify_wake(&self) -> bool {
        offer(&self.wake, "wake")
    }
}

fn offer(tx: &mpsc::Sender<()>, kind: &'static str) -> bool {
    match tx.try_send(()) {
        Ok(()) => true,
        Err(TrySendError::Full(())) => {
            debug!(kind, "power notification already pending, dropped");
            false
        }
        Err(TrySendError::Closed(())) => {
            debug!(kind, "power notification receiver closed");
            false
        }
    }
}
