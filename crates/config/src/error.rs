use std::path::PathBuf;

/// Errors from loading the agent configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file {path} is missing required fields: {}", .fields.join(", "))]
    MissingFields {
        path: PathBuf,
        fields: Vec<&'static str>,
    },

    #[error("credential '{0}' not found")]
    CredentialNotFound(String),

    #[error("failed to read credential '{target}': {reason}")]
    Credential { target: String, reason: String },

    #[error("cannot determine the user cache directory")]
    NoCacheDir,
}
