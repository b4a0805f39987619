//! The container runtime seam used by the lifecycle supervisor.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::command::CommandSpec;
use crate::error::RuntimeError;
use crate::gpu::{self, GPU_SETUP_TIMEOUT};
use crate::handle::{ProcessHandle, SpawnedProcess};
use crate::podman::RunSpec;
use crate::readiness::ReadinessProbe;

/// Boxed future returned by [`ContainerRuntime`] methods.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RuntimeError>> + Send + 'a>>;

/// Operations the supervisor needs from a container runtime.
pub trait ContainerRuntime: Send + Sync {
    /// Brings the runtime service up and waits until it answers.
    fn wait_until_ready<'a>(&'a self, cancel: &'a CancellationToken) -> RuntimeFuture<'a, ()>;

    /// Reports whether a usable GPU is present.
    fn probe_gpu(&self) -> RuntimeFuture<'_, bool>;

    /// Makes the GPU available to containers.
    fn prepare_gpu(&self) -> RuntimeFuture<'_, ()>;

    /// Starts the container in the foreground under `cancel`.
    fn spawn(&self, spec: &RunSpec, cancel: CancellationToken) -> Result<SpawnedProcess, RuntimeError>;

    /// Asks the runtime to stop the named container.
    fn stop<'a>(&'a self, container_name: &'a str) -> RuntimeFuture<'a, ()>;
}

/// [`ContainerRuntime`] backed by the `podman` CLI.
#[derive(Debug, Clone)]
pub struct PodmanRuntime {
    program: String,
    readiness: ReadinessProbe,
    gpu_probe: CommandSpec,
    gpu_setup: CommandSpec,
    gpu_setup_timeout: Duration,
}

impl Default for PodmanRuntime {
    fn default() -> Self {
        Self::new("podman")
    }
}

impl PodmanRuntime {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            readiness: ReadinessProbe::podman(program),
            gpu_probe: gpu::nvidia_probe_command(),
            gpu_setup: gpu::cdi_setup_command(program),
            gpu_setup_timeout: GPU_SETUP_TIMEOUT,
        }
    }

    /// Overrides the readiness probe (timeouts, commands).
    pub fn with_readiness(mut self, readiness: ReadinessProbe) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ContainerRuntime for PodmanRuntime {
    fn wait_until_ready<'a>(&'a self, cancel: &'a CancellationToken) -> RuntimeFuture<'a, ()> {
        Box::pin(self.readiness.wait_until_ready(cancel))
    }

    fn probe_gpu(&self) -> RuntimeFuture<'_, bool> {
        Box::pin(gpu::probe_gpu(&self.gpu_probe, self.gpu_setup_timeout))
    }

    fn prepare_gpu(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(gpu::prepare_gpu(&self.gpu_setup, self.gpu_setup_timeout))
    }

    fn spawn(&self, spec: &RunSpec, cancel: CancellationToken) -> Result<SpawnedProcess, RuntimeError> {
        info!(command = %spec.redacted(&self.program), "starting container");
        ProcessHandle::spawn(&self.program, &spec.args(), cancel)
    }

    fn stop<'a>(&'a self, container_name: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            info!(container = container_name, "stopping container");
            CommandSpec::new(&self.program, &["stop", container_name])
                .run_checked()
                .await
                .map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runtime_uses_podman() {
        let runtime = PodmanRuntime::default();
        assert_eq!(runtime.program(), "podman");
        assert_eq!(runtime.readiness.check.to_string(), "podman info");
        assert_eq!(runtime.gpu_probe.to_string(), "nvidia-smi --list-gpus");
        assert_eq!(runtime.gpu_setup_timeout, GPU_SETUP_TIMEOUT);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_failure_surfaces_command_error() {
        // `false` ignores its arguments and exits 1.
        let runtime = PodmanRuntime::new("false");
        let err = runtime.stop("reai-agent").await.unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_runs_program_with_run_args() {
        // `true` accepts any arguments and exits 0.
        let runtime = PodmanRuntime::new("true");
        let spec = RunSpec {
            container_name: "c".into(),
            image: "img".into(),
            model_name: "m".into(),
            token: "t".into(),
            initial_peers: None,
            port: 1,
            use_gpu: false,
            workload: Default::default(),
        };
        let spawned = runtime.spawn(&spec, CancellationToken::new()).unwrap();
        let mut handle = spawned.handle;
        handle.wait().await.unwrap();
    }
}
