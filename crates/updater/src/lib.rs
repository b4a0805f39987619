//! Self-update support for the ReEnvision AI agent.
//!
//! The [`UpdateChecker`] asks the update server whether a newer release
//! exists and stages the installer under `<stage>/<etag>/<file>`. The
//! background task repeats the check daily. On upgrade the staged installer
//! is launched detached and the app exits.

mod background;
mod checker;
mod error;
mod installer;
#[cfg(test)]
mod test_support;

pub use background::{Schedule, spawn_background_checker};
pub use checker::{
    DEFAULT_INSTALLER_NAME, DEFAULT_UPDATE_URL, UpdateChecker, UpdateInfo,
    filename_from_disposition, version_from_url,
};
pub use error::UpdateError;
pub use installer::{find_staged_installer, installer_args, launch_installer};
