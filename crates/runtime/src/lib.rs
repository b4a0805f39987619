//! Container runtime plumbing for the ReEnvision AI agent.
//!
//! - [`ProcessHandle`] supervises one long-running child (`podman run`)
//!   bound to a cancellation token.
//! - [`relay`] and [`RelayGroup`] forward child output into the log.
//! - [`ReadinessProbe`] waits for the container service to answer.
//! - [`ContainerRuntime`] is the seam the lifecycle supervisor drives;
//!   [`PodmanRuntime`] implements it with the `podman` CLI.

mod command;
mod container;
mod error;
mod gpu;
mod handle;
mod podman;
mod readiness;
mod relay;

pub use command::{CommandSpec, combined_output, hidden_command, run_captured};
pub use container::{ContainerRuntime, PodmanRuntime, RuntimeFuture};
pub use error::RuntimeError;
pub use gpu::{GPU_SETUP_TIMEOUT, lists_gpu, prepare_gpu, probe_gpu};
pub use handle::{ProcessHandle, SpawnedProcess};
pub use podman::{AGENT_GRID_VERSION, CACHE_VOLUME, RunSpec, Workload};
pub use readiness::{DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT, ReadinessProbe};
pub use relay::{LogSink, MAX_CHUNK, RelayGroup, StreamLabel, TracingSink, relay};
