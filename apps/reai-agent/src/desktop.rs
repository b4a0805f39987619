//! Desktop side effects triggered from the tray.

use std::path::{Path, PathBuf};
use std::process::Command;

use reai_lifecycle::{ActionError, DesktopActions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::paths::AppPaths;

pub struct Desktop {
    data_dir: PathBuf,
    update_stage_dir: PathBuf,
    upgrade_log: PathBuf,
    /// Stops the background update checker before an upgrade.
    updater: CancellationToken,
}

impl Desktop {
    pub fn new(paths: &AppPaths, updater: CancellationToken) -> Self {
        Self {
            data_dir: paths.data_dir.clone(),
            update_stage_dir: paths.update_stage_dir.clone(),
            upgrade_log: paths.upgrade_log.clone(),
            updater,
        }
    }
}

impl DesktopActions for Desktop {
    fn show_logs(&self) -> Result<(), ActionError> {
        debug!(dir = %self.data_dir.display(), "viewing logs");
        open_in_file_browser(&self.data_dir)
    }

    fn first_use(&self) -> Result<(), ActionError> {
        let dir = reai_config::ensure_config_dir()?;
        info!(dir = %dir.display(), "opening configuration directory");
        open_in_file_browser(&dir)
    }

    fn prepare_upgrade(&self) -> Result<PathBuf, ActionError> {
        let installer = reai_updater::find_staged_installer(&self.update_stage_dir)?;
        self.updater.cancel();
        Ok(installer)
    }

    fn launch_upgrade(&self, installer: &Path) -> Result<(), ActionError> {
        reai_updater::launch_installer(installer, &self.upgrade_log)?;
        Ok(())
    }
}

fn file_browser() -> &'static str {
    if cfg!(windows) {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

fn open_in_file_browser(dir: &Path) -> Result<(), ActionError> {
    let mut child = Command::new(file_browser()).arg(dir).spawn()?;
    // Reaped off-thread so the launcher does not linger as a zombie.
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}
