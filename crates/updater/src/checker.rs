//! Update check and download staging.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::header::{CONTENT_DISPOSITION, ETAG, HeaderMap};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::UpdateError;

pub const DEFAULT_UPDATE_URL: &str = "https://sociallyshaped.net/api/update";
/// Installer file name used when the server sends no `Content-Disposition`.
pub const DEFAULT_INSTALLER_NAME: &str = "ReEnvisionAISetup.exe";

/// A release advertised by the update server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateInfo {
    pub url: String,
    /// Taken from the parent path segment of `url`.
    #[serde(default)]
    pub version: String,
}

/// Client for the update server.
pub struct UpdateChecker {
    http: reqwest::Client,
    base_url: String,
    version: String,
    stage_dir: PathBuf,
}

impl UpdateChecker {
    /// Creates a checker reporting `version` and staging under `stage_dir`.
    pub fn new(version: &str, stage_dir: impl Into<PathBuf>) -> Result<Self, UpdateError> {
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "reai/{version} ({} {})",
                server_arch(),
                std::env::consts::OS
            ))
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_UPDATE_URL.to_string(),
            version: version.to_string(),
            stage_dir: stage_dir.into(),
        })
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// Asks the server whether a newer release exists.
    ///
    /// `Ok(None)` means the current version is up to date (HTTP 204).
    pub async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError> {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let params = [
            ("os", std::env::consts::OS.to_string()),
            ("arch", server_arch().to_string()),
            ("version", self.version.clone()),
            ("ts", ts.to_string()),
        ];

        debug!(url = %self.base_url, "checking for available update");
        let resp = self.http.get(&self.base_url).query(&params).send().await?;
        let status = resp.status();

        if status == StatusCode::NO_CONTENT {
            debug!("check update response 204 (current version is up to date)");
            return Ok(None);
        }

        let body = resp.text().await?;
        if status != StatusCode::OK {
            return Err(UpdateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut info: UpdateInfo = serde_json::from_str(&body)?;
        let url = reqwest::Url::parse(&info.url)
            .map_err(|e| UpdateError::InvalidUrl(format!("{}: {e}", info.url)))?;
        info.version = version_from_url(&url);

        info!(url = %info.url, version = %info.version, "new update available");
        Ok(Some(info))
    }

    /// Downloads the release into `<stage>/<etag>/<filename>`.
    ///
    /// Returns the staged path. An already staged file with the same etag is
    /// reused; other stages are removed before downloading.
    pub async fn download(&self, info: &UpdateInfo) -> Result<PathBuf, UpdateError> {
        let head = self.http.head(&info.url).send().await?;
        if head.status() != StatusCode::OK {
            return Err(UpdateError::Status {
                status: head.status().as_u16(),
                body: String::new(),
            });
        }

        let filename = installer_name(head.headers());
        let staged = self.stage_dir.join(etag_dir(head.headers())).join(&filename);
        if staged.exists() {
            info!(path = %staged.display(), "update already downloaded");
            return Ok(staged);
        }

        self.cleanup_old_downloads().await;

        let mut resp = self.http.get(&info.url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(UpdateError::Status {
                status: resp.status().as_u16(),
                body: String::new(),
            });
        }
        let staged = self.stage_dir.join(etag_dir(resp.headers())).join(&filename);
        if let Some(parent) = staged.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdateError::io(parent, e))?;
        }

        let mut file = tokio::fs::File::create(&staged)
            .await
            .map_err(|e| UpdateError::io(&staged, e))?;

        let copied: Result<(), UpdateError> = async {
            while let Some(chunk) = resp.chunk().await? {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| UpdateError::io(&staged, e))?;
            }
            file.flush().await.map_err(|e| UpdateError::io(&staged, e))
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e);
        }

        info!(path = %staged.display(), "new update downloaded");
        Ok(staged)
    }

    /// Removes every entry in the stage directory.
    pub async fn cleanup_old_downloads(&self) {
        let mut entries = match tokio::fs::read_dir(&self.stage_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(error = %e, "failed to list stage dir");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            debug!(path = %path.display(), "cleaning up old download");
            let removed = match entry.file_type().await {
                Ok(t) if t.is_dir() => tokio::fs::remove_dir_all(&path).await,
                _ => tokio::fs::remove_file(&path).await,
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), error = %e, "failed to clean up stale update download");
            }
        }
    }
}

/// Architecture name the update server expects.
fn server_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Parent path segment of the release URL, e.g. `v0.2.0` for
/// `.../download/v0.2.0/ReEnvisionAISetup.exe`.
pub fn version_from_url(url: &reqwest::Url) -> String {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    match segments.len() {
        0 | 1 => String::new(),
        n => segments[n - 2].to_string(),
    }
}

/// Directory name derived from the ETag, `_` when absent.
fn etag_dir(headers: &HeaderMap) -> String {
    let raw = headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let tag = raw.trim().trim_start_matches("W/").trim_matches('"');
    if tag.is_empty() {
        debug!("no etag detected, falling back to filename based dedup");
        return "_".into();
    }
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn installer_name(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| DEFAULT_INSTALLER_NAME.to_string())
}

/// Extracts a bare file name from a `Content-Disposition` value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value.split(';').map(str::trim).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| val.trim().trim_matches('"'))
    })?;
    let name = Path::new(raw).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}
