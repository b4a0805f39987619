//! Fakes for driving the supervisor without podman.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reai_config::{AppConfig, ConfigError, ConfigLoader, NoGpuPolicy};
use reai_power::SleepInhibitor;
use reai_runtime::{
    ContainerRuntime, LogSink, ProcessHandle, RunSpec, RuntimeError, RuntimeFuture,
    SpawnedProcess, StreamLabel,
};
use reai_tray::TrayNotifier;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;
use crate::supervisor::{Supervisor, Timeouts};

pub(crate) fn config() -> AppConfig {
    AppConfig {
        container_name: "reai-agent".into(),
        container_image: "ghcr.io/reenvision-ai/agent-grid:1.3.1".into(),
        initial_peers: String::new(),
        model_name: "test/model".into(),
        default_port: 31330,
        use_gpu: true,
        no_gpu_policy: NoGpuPolicy::ThankYou,
        token: "hf_secret".into(),
        port: 31330,
    }
}

pub(crate) struct FakeConfig {
    config: Mutex<Result<AppConfig, String>>,
}

impl FakeConfig {
    pub(crate) fn ok(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(Ok(config)),
        }
    }

    pub(crate) fn missing_token() -> Self {
        Self {
            config: Mutex::new(Err("ReEnvisionAI/hf_token".into())),
        }
    }
}

impl ConfigLoader for FakeConfig {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        match &*self.config.lock().unwrap() {
            Ok(config) => Ok(config.clone()),
            Err(target) => Err(ConfigError::CredentialNotFound(target.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Readiness {
    Ready,
    Fail,
    /// Never ready; returns once the token is cancelled.
    UntilCancelled,
    /// Ready after a delay, ignoring cancellation.
    DelayIgnoringCancel(Duration),
}

pub(crate) struct FakeRuntime {
    pub readiness: Readiness,
    pub gpu: bool,
    /// `probe_gpu` fails as if `nvidia-smi` could not be run.
    pub gpu_fails: bool,
    /// `prepare_gpu` fails as if CDI generation exited non-zero.
    pub prepare_fails: bool,
    /// `spawn` fails as if `podman` could not be run.
    pub spawn_fails: bool,
    /// `sh -c` script standing in for `podman run`.
    pub script: String,
    /// Whether `stop` terminates the live process.
    pub stop_kills: bool,
    pub spawns: AtomicUsize,
    pub stops: AtomicUsize,
    /// Set if a spawn happened while an earlier process was still alive.
    pub overlapped: AtomicBool,
    pub last_spec: Mutex<Option<RunSpec>>,
    pids: Mutex<Vec<u32>>,
}

impl FakeRuntime {
    pub(crate) fn new(script: &str) -> Self {
        Self {
            readiness: Readiness::Ready,
            gpu: true,
            gpu_fails: false,
            prepare_fails: false,
            spawn_fails: false,
            script: script.to_string(),
            stop_kills: false,
            spawns: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
            last_spec: Mutex::new(None),
            pids: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

fn not_found(program: &str) -> RuntimeError {
    RuntimeError::Spawn {
        program: program.to_string(),
        source: std::io::ErrorKind::NotFound.into(),
    }
}

#[cfg(target_os = "linux")]
fn alive(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn alive(_pid: u32) -> bool {
    false
}

impl ContainerRuntime for FakeRuntime {
    fn wait_until_ready<'a>(&'a self, cancel: &'a CancellationToken) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            match self.readiness {
                Readiness::Ready => Ok(()),
                Readiness::Fail => Err(RuntimeError::Timeout(Duration::from_secs(300))),
                Readiness::UntilCancelled => {
                    cancel.cancelled().await;
                    Err(RuntimeError::Cancelled)
                }
                Readiness::DelayIgnoringCancel(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            }
        })
    }

    fn probe_gpu(&self) -> RuntimeFuture<'_, bool> {
        Box::pin(async move {
            if self.gpu_fails {
                return Err(not_found("nvidia-smi"));
            }
            Ok(self.gpu)
        })
    }

    fn prepare_gpu(&self) -> RuntimeFuture<'_, ()> {
        Box::pin(async move {
            if self.prepare_fails {
                return Err(RuntimeError::Timeout(Duration::from_secs(120)));
            }
            Ok(())
        })
    }

    fn spawn(&self, spec: &RunSpec, cancel: CancellationToken) -> Result<SpawnedProcess, RuntimeError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        if self.spawn_fails {
            return Err(not_found("podman"));
        }

        let mut pids = self.pids.lock().unwrap();
        if pids.iter().any(|&pid| alive(pid)) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let spawned = ProcessHandle::spawn("sh", &["-c".into(), self.script.clone()], cancel)?;
        pids.extend(spawned.handle.pid());
        Ok(spawned)
    }

    fn stop<'a>(&'a self, _container_name: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            self.stops.fetch_add(1, Ordering::SeqCst);
            let last = self.pids.lock().unwrap().last().copied();
            if let (true, Some(pid)) = (self.stop_kills, last) {
                let _ = tokio::process::Command::new("kill")
                    .arg("-TERM")
                    .arg(pid.to_string())
                    .status()
                    .await;
            }
            Ok(())
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeTray {
    pub statuses: Mutex<Vec<String>>,
    pub started: Mutex<Option<bool>>,
    pub first_use: AtomicUsize,
    pub updates: Mutex<Vec<String>>,
    pub quits: AtomicUsize,
}

impl FakeTray {
    pub(crate) fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub(crate) fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
}

impl TrayNotifier for FakeTray {
    fn change_status_text(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }

    fn set_started(&self) {
        *self.started.lock().unwrap() = Some(true);
    }

    fn set_stopped(&self) {
        *self.started.lock().unwrap() = Some(false);
    }

    fn display_first_use_notification(&self) {
        self.first_use.fetch_add(1, Ordering::SeqCst);
    }

    fn update_available(&self, version: &str) {
        self.updates.lock().unwrap().push(version.to_string());
    }

    fn quit(&self) {
        self.quits.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct MemorySink {
    pub lines: Mutex<Vec<(StreamLabel, String)>>,
}

impl LogSink for MemorySink {
    fn write(&self, label: StreamLabel, line: &str) {
        self.lines.lock().unwrap().push((label, line.to_string()));
    }
}

pub(crate) struct Harness {
    pub supervisor: Supervisor,
    pub runtime: Arc<FakeRuntime>,
    pub tray: Arc<FakeTray>,
    pub power: Arc<SleepInhibitor>,
    pub sink: Arc<MemorySink>,
}

pub(crate) fn test_timeouts() -> Timeouts {
    Timeouts {
        stop_command: Duration::from_secs(5),
        exit_grace: Duration::from_secs(5),
        relay_drain: Duration::from_millis(500),
        quit_grace: Duration::from_secs(2),
    }
}

pub(crate) fn harness(runtime: FakeRuntime) -> Harness {
    harness_with(runtime, FakeConfig::ok(config()))
}

pub(crate) fn harness_with(runtime: FakeRuntime, config: FakeConfig) -> Harness {
    let runtime = Arc::new(runtime);
    let tray = Arc::new(FakeTray::default());
    let power = Arc::new(SleepInhibitor::new());
    let sink = Arc::new(MemorySink::default());
    let supervisor = Supervisor::builder(Arc::new(config), runtime.clone(), tray.clone(), power.clone())
        .timeouts(test_timeouts())
        .log_sink(sink.clone())
        .build();
    Harness {
        supervisor,
        runtime,
        tray,
        power,
        sink,
    }
}

/// Waits (bounded) until the supervisor reports `want`.
pub(crate) async fn wait_for_state(states: &mut watch::Receiver<AppState>, want: AppState) {
    let reached = tokio::time::timeout(Duration::from_secs(10), states.wait_for(|s| *s == want))
        .await
        .is_ok();
    assert!(reached, "timed out waiting for {want}, at {}", *states.borrow());
}
