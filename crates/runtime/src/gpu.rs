//! Nvidia GPU detection and CDI device setup for the podman VM.

use std::process::Output;
use std::time::Duration;

use tracing::{info, warn};

use crate::command::{CommandSpec, combined_output};
use crate::error::RuntimeError;

/// Bound on each GPU step: the `nvidia-smi` listing and the CDI generation
/// inside the podman machine.
pub const GPU_SETUP_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// `nvidia-smi --list-gpus`.
pub fn nvidia_probe_command() -> CommandSpec {
    CommandSpec::new("nvidia-smi", &["--list-gpus"])
}

/// Generates the nvidia CDI spec inside the podman machine so that
/// `--device=nvidia.com/gpu=all` resolves.
pub fn cdi_setup_command(podman: &str) -> CommandSpec {
    CommandSpec::new(
        podman,
        &[
            "machine",
            "ssh",
            "sudo nvidia-ctk cdi generate --output=/etc/cdi/nvidia.yaml",
        ],
    )
}

/// Runs the GPU listing command, bounded by `limit`.
///
/// A non-zero exit or an empty listing counts as "no GPU". Failing to run
/// the tool at all, including when it is not installed, is an error.
pub async fn probe_gpu(probe: &CommandSpec, limit: Duration) -> Result<bool, RuntimeError> {
    info!(command = %probe, "checking for Nvidia GPU");
    let output = tokio::time::timeout(limit, probe.output())
        .await
        .map_err(|_| RuntimeError::Timeout(limit))??;
    Ok(lists_gpu(&output))
}

/// True when the listing exited cleanly and printed at least one line.
pub fn lists_gpu(output: &Output) -> bool {
    if !output.status.success() {
        warn!(
            status = %output.status,
            output = %combined_output(output),
            "GPU listing finished with non-zero status"
        );
        return false;
    }
    let listing = String::from_utf8_lossy(&output.stdout);
    let count = listing.lines().filter(|l| !l.trim().is_empty()).count();
    if count > 0 {
        info!(gpus = count, "Nvidia GPU found");
    } else {
        info!("no Nvidia GPU found");
    }
    count > 0
}

/// Runs the CDI setup command, bounded by `limit`.
pub async fn prepare_gpu(setup: &CommandSpec, limit: Duration) -> Result<(), RuntimeError> {
    info!(command = %setup, "configuring GPU passthrough");
    let output = tokio::time::timeout(limit, setup.run_checked())
        .await
        .map_err(|_| RuntimeError::Timeout(limit))??;
    info!(output = %combined_output(&output), "GPU passthrough configured");
    Ok(())
}
