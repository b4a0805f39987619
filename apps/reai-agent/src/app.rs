//! Application orchestrator: wires all agent components together.

use std::sync::Arc;

use reai_config::ConfigLoader;
use reai_lifecycle::{Dispatcher, SleepMonitor, Supervisor};
use reai_power::{PowerMonitor, SleepInhibitor};
use reai_runtime::PodmanRuntime;
use reai_store::Store;
use reai_tray::{TrayConfig, TrayHandle, TrayNotifier, TrayUi, TrayUpdate};
use reai_updater::{Schedule, UpdateChecker, spawn_background_checker};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::desktop::Desktop;
use crate::paths::AppPaths;

/// Runs the agent until quit, upgrade, or a termination signal.
pub async fn run(paths: AppPaths, config: Arc<dyn ConfigLoader>) -> anyhow::Result<()> {
    let terminate = CancellationToken::new();

    // -- Tray --
    let (tray_handle, tray_events, ui) = TrayHandle::new(TrayConfig::default());
    let start_requests = ui.events.clone();
    let tray_thread = spawn_headless_tray(ui)?;
    let tray: Arc<dyn TrayNotifier> = Arc::new(tray_handle);

    // -- Supervisor --
    let power = Arc::new(SleepInhibitor::new());
    let runtime = Arc::new(PodmanRuntime::default());
    let supervisor = Supervisor::builder(config, runtime, tray.clone(), power).build();

    // -- First use --
    let store = Store::open(&paths.store_file);
    if store.first_time_run() {
        debug!("not first time, skipping first run notification");
    } else {
        debug!(id = %store.id(), "first time run");
        tray.display_first_use_notification();
        if let Err(e) = store.set_first_time_run(true) {
            warn!(error = %e, "failed to record first run");
        }
    }

    // -- Updater --
    let updater_cancel = CancellationToken::new();
    let checker = Arc::new(UpdateChecker::new(
        env!("CARGO_PKG_VERSION"),
        &paths.update_stage_dir,
    )?);
    let notifier = tray.clone();
    let updater_task = spawn_background_checker(
        checker,
        Schedule::default(),
        updater_cancel.clone(),
        move |version| notifier.update_available(version),
    );

    // -- Signals and power --
    spawn_signal_listener(terminate.clone());
    let (power_monitor, power_events) = match PowerMonitor::start() {
        Ok((monitor, events)) => (Some(monitor), events),
        Err(e) => {
            warn!(error = %e, "sleep/wake detection unavailable");
            let (_, events) = reai_power::channel();
            (None, events)
        }
    };
    let monitor = SleepMonitor::new(supervisor.clone(), start_requests);
    let desktop = Arc::new(Desktop::new(&paths, updater_cancel.clone()));

    supervisor.request_start();
    info!("agent ready");

    Dispatcher::new(
        supervisor,
        monitor,
        tray,
        desktop,
        tray_events,
        power_events,
        terminate,
    )
    .run()
    .await;

    updater_cancel.cancel();
    info!("waiting for app to shut down");
    if let Err(e) = updater_task.await {
        warn!(error = %e, "update checker task failed");
    }
    drop(power_monitor);
    match tokio::task::spawn_blocking(move || tray_thread.join()).await {
        Ok(Ok(())) => {}
        _ => warn!("tray thread did not shut down cleanly"),
    }
    Ok(())
}

/// Stand-in tray loop: logs menu redraws and notifications until shutdown.
///
/// A GUI toolkit would render [`reai_tray::MenuState::build_menu`] here and
/// forward clicks through `ui.events`.
fn spawn_headless_tray(ui: TrayUi) -> anyhow::Result<std::thread::JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("reai-tray".into())
        .spawn(move || {
            while let Ok(update) = ui.updates.recv() {
                match update {
                    TrayUpdate::Menu(state) => {
                        let items: Vec<_> = state
                            .build_menu()
                            .into_iter()
                            .filter(|item| !item.is_separator())
                            .map(|item| item.label)
                            .collect();
                        debug!(status = %state.status_text, ?items, "tray menu updated");
                    }
                    TrayUpdate::Notify(notification) => {
                        info!(title = %notification.title, message = %notification.message, "notification");
                    }
                    TrayUpdate::Shutdown => break,
                }
            }
            debug!("tray loop finished");
        })?;
    Ok(handle)
}

fn spawn_signal_listener(terminate: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutting down due to signal");
        terminate.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        _ = ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
