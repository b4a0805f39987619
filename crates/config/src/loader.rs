//! Loading the config file together with its token and port override.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::credentials::{self, CredentialStore, TOKEN_TARGET};
use crate::error::ConfigError;
use crate::port::{self, PortOverride};

/// Directory name under the user cache directory.
pub const APP_DIR_NAME: &str = "ReEnvisionAI";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Produces a fresh [`AppConfig`] on demand.
pub trait ConfigLoader: Send + Sync {
    fn load(&self) -> Result<AppConfig, ConfigError>;
}

/// Reads `config.json`, then the token and the port override.
pub struct FileConfigLoader {
    path: PathBuf,
    credentials: Box<dyn CredentialStore>,
    port_override: Box<dyn PortOverride>,
}

impl FileConfigLoader {
    /// Loader for `path` using the platform credential store and override.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            credentials: credentials::default_store(),
            port_override: port::default_override(),
        }
    }

    pub fn with_credentials(mut self, store: impl CredentialStore + 'static) -> Self {
        self.credentials = Box::new(store);
        self
    }

    pub fn with_port_override(mut self, source: impl PortOverride + 'static) -> Self {
        self.port_override = Box::new(source);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        info!(path = %self.path.display(), "using configuration file");

        let data = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let mut config = AppConfig::parse(&self.path, &data)?;

        if let Some(port) = self.port_override.port() {
            info!(port, "port overridden by machine setting");
            config.port = port;
        }

        config.token = self.credentials.secret(TOKEN_TARGET)?;
        debug!(
            container = %config.container_name,
            image = %config.container_image,
            model = %config.model_name,
            port = config.port,
            use_gpu = config.use_gpu,
            "configuration loaded"
        );
        Ok(config)
    }
}

/// `<user cache dir>/ReEnvisionAI`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    Ok(user_cache_dir()?.join(APP_DIR_NAME))
}

/// `<user cache dir>/ReEnvisionAI/config.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Creates the config directory if needed (owner/group only on Unix).
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Read {
        path: dir.clone(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o750));
    }

    Ok(dir)
}

fn user_cache_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .ok_or(ConfigError::NoCacheDir)
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join("Library").join("Caches"))
            .ok_or(ConfigError::NoCacheDir)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(dir) = std::env::var_os("XDG_CACHE_HOME").filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".cache"))
            .ok_or(ConfigError::NoCacheDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PORT;
    use crate::port::FixedPort;

    struct StaticSecret(Option<&'static str>);

    impl CredentialStore for StaticSecret {
        fn secret(&self, target: &str) -> Result<String, ConfigError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| ConfigError::CredentialNotFound(target.to_string()))
        }
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, body).unwrap();
        path
    }

    const VALID: &str = r#"{"container_name":"reai","container_image":"img:1","model_name":"m"}"#;

    #[test]
    fn loads_token_and_default_port() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FileConfigLoader::new(write_config(tmp.path(), VALID))
            .with_credentials(StaticSecret(Some("hf_xyz")))
            .with_port_override(port::NoPortOverride);

        let config = loader.load().unwrap();
        assert_eq!(config.token, "hf_xyz");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn port_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FileConfigLoader::new(write_config(tmp.path(), VALID))
            .with_credentials(StaticSecret(Some("hf_xyz")))
            .with_port_override(FixedPort(40000));

        let config = loader.load().unwrap();
        assert_eq!(config.port, 40000);
        assert_eq!(config.default_port, DEFAULT_PORT);
    }

    #[test]
    fn missing_token_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FileConfigLoader::new(write_config(tmp.path(), VALID))
            .with_credentials(StaticSecret(None))
            .with_port_override(port::NoPortOverride);

        let err = loader.load().unwrap_err();
        assert!(matches!(err, ConfigError::CredentialNotFound(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FileConfigLoader::new(tmp.path().join("absent.json"))
            .with_credentials(StaticSecret(Some("t")));

        let err = loader.load().unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn every_load_rereads_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), VALID);
        let loader = FileConfigLoader::new(&path)
            .with_credentials(StaticSecret(Some("t")))
            .with_port_override(port::NoPortOverride);
        assert_eq!(loader.load().unwrap().model_name, "m");

        std::fs::write(
            &path,
            r#"{"container_name":"reai","container_image":"img:1","model_name":"other"}"#,
        )
        .unwrap();
        assert_eq!(loader.load().unwrap().model_name, "other");
    }

    #[test]
    fn default_path_ends_with_app_dir() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with(Path::new(APP_DIR_NAME).join(CONFIG_FILE_NAME)));
        }
    }
}
