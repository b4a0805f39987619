//! Configuration for the ReEnvision AI agent.
//!
//! Configuration is stored as JSON:
//! - Windows: `%LOCALAPPDATA%\ReEnvisionAI\config.json`
//! - macOS: `~/Library/Caches/ReEnvisionAI/config.json`
//! - Linux: `$XDG_CACHE_HOME/ReEnvisionAI/config.json` (or `~/.cache/...`)
//!
//! The access token never lives in the file; it comes from a
//! [`CredentialStore`]. A machine-wide [`PortOverride`] may replace the
//! configured port.

mod config;
mod credentials;
mod error;
mod loader;
mod port;

pub use config::{AppConfig, DEFAULT_PORT, NoGpuPolicy};
pub use credentials::{
    CredentialStore, EnvCredentialStore, TOKEN_ENV_VAR, TOKEN_TARGET, decode_utf16le,
    default_store,
};
pub use error::ConfigError;
pub use loader::{
    APP_DIR_NAME, CONFIG_FILE_NAME, ConfigLoader, FileConfigLoader, config_dir,
    default_config_path, ensure_config_dir,
};
pub use port::{
    FixedPort, NoPortOverride, PortOverride, REGISTRY_KEY, REGISTRY_VALUE, default_override,
    port_from_value,
};
