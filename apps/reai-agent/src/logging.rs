//! File logging with rotation on start.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Generations kept besides the live log.
pub const LOG_ROTATION_COUNT: usize = 5;

/// `app.log` -> `app-<n>.log`.
fn generation(path: &Path, n: usize) -> PathBuf {
    if n == 0 {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("app");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{n}.{ext}"),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name)
}

/// Shifts `app.log` to `app-1.log`, `app-1.log` to `app-2.log` and so on,
/// dropping the oldest beyond `keep`.
pub fn rotate_logs(path: &Path, keep: usize) {
    if !path.exists() {
        return;
    }
    for i in (1..=keep).rev() {
        let older = generation(path, i);
        let newer = generation(path, i - 1);
        if !newer.exists() {
            continue;
        }
        if older.exists()
            && let Err(e) = std::fs::remove_file(&older)
        {
            eprintln!("failed to remove old log {}: {e}", older.display());
            continue;
        }
        if let Err(e) = std::fs::rename(&newer, &older) {
            eprintln!("failed to rotate log {}: {e}", newer.display());
        }
    }
}

/// Rotates `log_file` and installs the global subscriber writing to it.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    rotate_logs(log_file, LOG_ROTATION_COUNT);
    let file = open_append(log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;
    Ok(())
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: PathBuf) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn generation_names() {
        let log = Path::new("/logs/app.log");
        assert_eq!(generation(log, 0), log);
        assert_eq!(generation(log, 3), Path::new("/logs/app-3.log"));
    }

    #[test]
    fn rotation_shifts_each_generation() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("app.log");
        std::fs::write(&log, "current").unwrap();
        std::fs::write(generation(&log, 1), "previous").unwrap();

        rotate_logs(&log, 5);

        assert!(!log.exists());
        assert_eq!(read(generation(&log, 1)), "current");
        assert_eq!(read(generation(&log, 2)), "previous");
    }

    #[test]
    fn oldest_generation_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("app.log");
        std::fs::write(&log, "0").unwrap();
        for n in 1..=3 {
            std::fs::write(generation(&log, n), n.to_string()).unwrap();
        }

        rotate_logs(&log, 3);

        assert_eq!(read(generation(&log, 1)), "0");
        assert_eq!(read(generation(&log, 3)), "2");
        assert!(!generation(&log, 4).exists());
    }

    #[test]
    fn missing_log_is_not_rotated() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("app.log");
        rotate_logs(&log, 5);
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }
}
