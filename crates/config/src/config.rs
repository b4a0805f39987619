//! The configuration snapshot used for one container start.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Port used when the file leaves `default_port` unset or zero.
pub const DEFAULT_PORT: u16 = 31330;

/// What to do when no GPU is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoGpuPolicy {
    /// Do not start; show the thank-you status.
    #[default]
    ThankYou,
    /// Start the container without GPU flags.
    ContinueWithoutGpu,
}

/// Agent configuration, loaded fresh on every start attempt.
///
/// `token` comes from the credential store and `port` is the effective port
/// after the platform override; neither is read from or written to the file.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub container_name: String,

    #[serde(default)]
    pub container_image: String,

    #[serde(default)]
    pub initial_peers: String,

    #[serde(default)]
    pub model_name: String,

    #[serde(default)]
    pub default_port: u16,

    #[serde(default)]
    pub use_gpu: bool,

    #[serde(default)]
    pub no_gpu_policy: NoGpuPolicy,

    #[serde(skip)]
    pub token: String,

    #[serde(skip)]
    pub port: u16,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("container_name", &self.container_name)
            .field("container_image", &self.container_image)
            .field("initial_peers", &self.initial_peers)
            .field("model_name", &self.model_name)
            .field("default_port", &self.default_port)
            .field("use_gpu", &self.use_gpu)
            .field("no_gpu_policy", &self.no_gpu_policy)
            .field("token", &if self.token.is_empty() { "" } else { "[REDACTED]" })
            .field("port", &self.port)
            .finish()
    }
}

impl AppConfig {
    /// Parses and validates the JSON document at `path`.
    ///
    /// The effective `port` is set from `default_port`, falling back to
    /// [`DEFAULT_PORT`]. The token is left empty.
    pub fn parse(path: &Path, data: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig =
            serde_json::from_str(data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields {
                path: path.to_path_buf(),
                fields: missing,
            });
        }

        if config.default_port == 0 {
            config.default_port = DEFAULT_PORT;
        }
        config.port = config.default_port;
        Ok(config)
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.container_name.trim().is_empty() {
            missing.push("container_name");
        }
        if self.container_image.trim().is_empty() {
            missing.push("container_image");
        }
        if self.model_name.trim().is_empty() {
            missing.push("model_name");
        }
        missing
    }

    /// Initial peers, or `None` when not configured.
    pub fn initial_peers(&self) -> Option<&str> {
        let peers = self.initial_peers.trim();
        (!peers.is_empty()).then_some(peers)
    }
}
