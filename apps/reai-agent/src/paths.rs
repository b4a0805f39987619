//! Where the agent keeps its logs, store and update downloads.
//!
//! - Windows: `%LOCALAPPDATA%\ReEnvision AI`
//! - elsewhere: `$XDG_DATA_HOME/reai` (or `~/.local/share/reai`)

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Display name of the data directory on Windows.
pub const DATA_DIR_NAME: &str = "ReEnvision AI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub upgrade_log: PathBuf,
    pub update_stage_dir: PathBuf,
    pub store_file: PathBuf,
}

impl AppPaths {
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            log_file: data_dir.join("app.log"),
            upgrade_log: data_dir.join("upgrade.log"),
            update_stage_dir: data_dir.join("updates"),
            store_file: data_dir.join(reai_store::STORE_FILE_NAME),
            data_dir,
        }
    }

    /// Resolves the per-user data directory and creates it.
    pub fn resolve() -> anyhow::Result<Self> {
        let paths = Self::under(data_dir()?);
        std::fs::create_dir_all(&paths.data_dir)
            .with_context(|| format!("creating {}", paths.data_dir.display()))?;
        Ok(paths)
    }
}

#[cfg(windows)]
fn data_dir() -> anyhow::Result<PathBuf> {
    let local = std::env::var_os("LOCALAPPDATA").context("LOCALAPPDATA is not set")?;
    Ok(PathBuf::from(local).join(DATA_DIR_NAME))
}

#[cfg(not(windows))]
fn data_dir() -> anyhow::Result<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("reai"));
    }
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".local").join("share").join("reai"))
}

/// Appends the executable's directory to `PATH` so helper binaries shipped
/// next to it are found by spawned children.
///
/// Must run before the async runtime starts any threads.
#[cfg(windows)]
pub fn ensure_exe_dir_on_path() {
    let exe_dir = match std::env::current_exe() {
        Ok(exe) => exe.parent().map(Path::to_path_buf),
        Err(e) => {
            tracing::warn!(error = %e, "failed to locate executable directory");
            None
        }
    };
    let Some(exe_dir) = exe_dir else {
        return;
    };

    let current = std::env::var_os("PATH").unwrap_or_default();
    if let Some(joined) = path_with(&current, &exe_dir) {
        tracing::debug!(dir = %exe_dir.display(), "adding executable directory to PATH");
        // SAFETY: called from `main` before the tokio runtime or any other
        // thread exists, so nothing reads the environment concurrently.
        unsafe { std::env::set_var("PATH", joined) };
    }
}

#[cfg(not(windows))]
pub fn ensure_exe_dir_on_path() {}

/// `PATH` with `dir` appended, or `None` if it is already present.
pub fn path_with(current: &std::ffi::OsStr, dir: &Path) -> Option<std::ffi::OsString> {
    let mut entries: Vec<PathBuf> = std::env::split_paths(current).collect();
    let present = entries.iter().any(|entry| same_dir(entry, dir));
    if present {
        return None;
    }
    entries.push(dir.to_path_buf());
    std::env::join_paths(entries).ok()
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.as_os_str()
            .to_string_lossy()
            .eq_ignore_ascii_case(&b.as_os_str().to_string_lossy())
    } else {
        a == b
    }
}
