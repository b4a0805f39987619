//! Locating and launching a staged installer.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::UpdateError;

/// Installer flags: progress visible, no prompts, no cancel, app closed.
pub fn installer_args(log_file_name: &str) -> Vec<String> {
    vec![
        "/CLOSEAPPLICATIONS".into(),
        format!("/LOG={log_file_name}"),
        "/FORCECLOSEAPPLICATIONS".into(),
        "/SP".into(),
        "/NOCANCEL".into(),
        "/SILENT".into(),
    ]
}

/// Finds `<stage>/*/*.exe`. With several candidates the first in path order
/// wins.
pub fn find_staged_installer(stage_dir: &Path) -> Result<PathBuf, UpdateError> {
    let mut found = Vec::new();
    let stages = match std::fs::read_dir(stage_dir) {
        Ok(stages) => stages,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UpdateError::NoDownloads(stage_dir.to_path_buf()));
        }
        Err(e) => return Err(UpdateError::io(stage_dir, e)),
    };

    for stage in stages.flatten() {
        let Ok(files) = std::fs::read_dir(stage.path()) else {
            continue;
        };
        found.extend(files.flatten().map(|f| f.path()).filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
        }));
    }

    found.sort();
    if found.len() > 1 {
        warn!(candidates = ?found, "multiple downloads found, using first one");
    }
    found
        .into_iter()
        .next()
        .ok_or_else(|| UpdateError::NoDownloads(stage_dir.to_path_buf()))
}

/// Starts the installer detached, logging to `upgrade_log`.
///
/// The installer runs from the log's directory with a relative `/LOG=`
/// path. The caller is expected to exit right after.
pub fn launch_installer(installer: &Path, upgrade_log: &Path) -> Result<(), UpdateError> {
    let log_name = upgrade_log
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upgrade.log");
    let args = installer_args(log_name);

    info!(installer = %installer.display(), log = %upgrade_log.display(), "starting upgrade");

    let mut cmd = std::process::Command::new(installer);
    cmd.args(&args);
    if let Some(dir) = upgrade_log.parent() {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|source| UpdateError::Launch {
        path: installer.to_path_buf(),
        source,
    })?;
    info!(pid = child.id(), "installer started in background");
    Ok(())
}
