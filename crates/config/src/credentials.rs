//! Access token lookup.
//!
//! On Windows the token lives in the Credential Manager as a generic
//! credential whose blob is UTF-16LE text. Elsewhere it is read from an
//! environment variable.

use crate::error::ConfigError;

/// Credential target holding the model hub token.
pub const TOKEN_TARGET: &str = "ReEnvisionAI/hf_token";

/// Environment variable used where no OS credential store is wired up.
pub const TOKEN_ENV_VAR: &str = "REAI_HF_TOKEN";

/// Source of secrets by target name.
pub trait CredentialStore: Send + Sync {
    fn secret(&self, target: &str) -> Result<String, ConfigError>;
}

/// Reads the secret from an environment variable, ignoring the target name.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
    var: String,
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR)
    }
}

impl EnvCredentialStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn secret(&self, target: &str) -> Result<String, ConfigError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ConfigError::CredentialNotFound(target.to_string())),
        }
    }
}

/// The platform's default credential store.
pub fn default_store() -> Box<dyn CredentialStore> {
    #[cfg(windows)]
    {
        Box::new(windows::WindowsCredentialStore)
    }

    #[cfg(not(windows))]
    {
        Box::new(EnvCredentialStore::default())
    }
}

/// Decodes a UTF-16LE credential blob, dropping a trailing NUL.
pub fn decode_utf16le(target: &str, blob: &[u8]) -> Result<String, ConfigError> {
    if blob.len() % 2 != 0 {
        return Err(ConfigError::Credential {
            target: target.to_string(),
            reason: format!("blob has odd length {}", blob.len()),
        });
    }
    let units: Vec<u16> = blob
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16(&units).map_err(|e| ConfigError::Credential {
        target: target.to_string(),
        reason: e.to_string(),
    })?;
    Ok(text.trim_end_matches('\0').to_string())
}

#[cfg(windows)]
mod windows {
    use std::ffi::c_void;

    use windows_sys::Win32::Foundation::{ERROR_NOT_FOUND, GetLastError};
    use windows_sys::Win32::Security::Credentials::{
        CRED_TYPE_GENERIC, CREDENTIALW, CredFree, CredReadW,
    };

    use super::{CredentialStore, decode_utf16le};
    use crate::error::ConfigError;

    /// Windows Credential Manager, generic credentials.
    pub(crate) struct WindowsCredentialStore;

    impl CredentialStore for WindowsCredentialStore {
        fn secret(&self, target: &str) -> Result<String, ConfigError> {
            let wide: Vec<u16> = target.encode_utf16().chain(std::iter::once(0)).collect();
            let mut cred: *mut CREDENTIALW = std::ptr::null_mut();

            // SAFETY: `wide` is NUL-terminated and outlives the call.
            let ok = unsafe { CredReadW(wide.as_ptr(), CRED_TYPE_GENERIC, 0, &mut cred) };
            if ok == 0 {
                // SAFETY: reads the calling thread's last error.
                let code = unsafe { GetLastError() };
                if code == ERROR_NOT_FOUND {
                    return Err(ConfigError::CredentialNotFound(target.to_string()));
                }
                return Err(ConfigError::Credential {
                    target: target.to_string(),
                    reason: format!("CredReadW failed with error {code}"),
                });
            }

            // SAFETY: CredReadW succeeded, so `cred` points at a valid
            // CREDENTIALW whose blob spans CredentialBlobSize bytes.
            let blob = unsafe {
                let c = &*cred;
                if c.CredentialBlob.is_null() || c.CredentialBlobSize == 0 {
                    Vec::new()
                } else {
                    std::slice::from_raw_parts(c.CredentialBlob, c.CredentialBlobSize as usize)
                        .to_vec()
                }
            };
            // SAFETY: `cred` was allocated by CredReadW.
            unsafe { CredFree(cred as *const c_void) };

            let token = decode_utf16le(target, &blob)?;
            if token.is_empty() {
                return Err(ConfigError::CredentialNotFound(target.to_string()));
            }
            Ok(token)
        }
    }
}
