//! Machine-wide override for the server port.

/// Registry key (under `HKEY_LOCAL_MACHINE`) written by the installer.
pub const REGISTRY_KEY: &str = r"SOFTWARE\ReEnvisionAI\ReEnvisionAI";
/// Value name holding the port.
pub const REGISTRY_VALUE: &str = "Port";

/// Supplies a port that takes precedence over the config file.
pub trait PortOverride: Send + Sync {
    /// `None` when no usable override exists.
    fn port(&self) -> Option<u16>;
}

/// No override.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPortOverride;

impl PortOverride for NoPortOverride {
    fn port(&self) -> Option<u16> {
        None
    }
}

/// A fixed override.
#[derive(Debug, Clone, Copy)]
pub struct FixedPort(pub u16);

impl PortOverride for FixedPort {
    fn port(&self) -> Option<u16> {
        Some(self.0)
    }
}

/// The platform's default override source.
pub fn default_override() -> Box<dyn PortOverride> {
    #[cfg(windows)]
    {
        Box::new(registry::RegistryPortOverride)
    }

    #[cfg(not(windows))]
    {
        Box::new(NoPortOverride)
    }
}

/// Narrows a stored integer to a usable port.
pub fn port_from_value(value: u64) -> Option<u16> {
    u16::try_from(value).ok().filter(|p| *p != 0)
}

#[cfg(windows)]
mod registry {
    use tracing::{info, warn};
    use winreg::RegKey;
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE};

    use super::{PortOverride, REGISTRY_KEY, REGISTRY_VALUE, port_from_value};

    pub(crate) struct RegistryPortOverride;

    impl PortOverride for RegistryPortOverride {
        fn port(&self) -> Option<u16> {
            let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
            let key = match hklm.open_subkey_with_flags(REGISTRY_KEY, KEY_QUERY_VALUE) {
                Ok(key) => key,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    info!(key = REGISTRY_KEY, "no port override in registry");
                    return None;
                }
                Err(e) => {
                    warn!(key = REGISTRY_KEY, error = %e, "error opening registry key");
                    return None;
                }
            };

            let value = key
                .get_value::<u32, _>(REGISTRY_VALUE)
                .map(u64::from)
                .or_else(|_| key.get_value::<u64, _>(REGISTRY_VALUE));

            match value {
                Ok(raw) => {
                    let port = port_from_value(raw);
                    if port.is_none() {
                        warn!(value = raw, "registry port override out of range, ignoring");
                    }
                    port
                }
                Err(e) => {
                    warn!(value = REGISTRY_VALUE, error = %e, "error reading registry port");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_narrowing() {
        assert_eq!(port_from_value(31330), Some(31330));
        assert_eq!(port_from_value(0), None);
        assert_eq!(port_from_value(70_000), None);
    }

    #[test]
    fn fixed_and_none() {
        assert_eq!(FixedPort(8080).port(), Some(8080));
        assert_eq!(NoPortOverride.port(), None);
    }
}
