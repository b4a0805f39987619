//! Container lifecycle supervisor.
//!
//! One [`Supervisor`] owns the application state and at most one container
//! attempt. Start and stop requests return immediately; the work runs on
//! spawned tasks.
//!
//! # Locking
//!
//! Two mutexes guard the shared state: `state` and `slot`. When both are
//! needed they are taken in that order. Neither is held across an await.
//! Every transition runs its side effects (watch broadcast, tray, sleep
//! prevention) while `state` is held, so observers never see them out of
//! order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reai_config::{AppConfig, ConfigLoader, NoGpuPolicy};
use reai_power::SleepInhibitor;
use reai_runtime::{
    ContainerRuntime, LogSink, ProcessHandle, RelayGroup, RunSpec, SpawnedProcess, StreamLabel,
    TracingSink, Workload,
};
use reai_tray::TrayNotifier;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::state::AppState;

/// Time limits applied while stopping and quitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for the runtime's own stop command.
    pub stop_command: Duration,
    /// How long to wait for the process to exit after cancellation.
    pub exit_grace: Duration,
    /// How long output relays may drain after a cancelled wait.
    pub relay_drain: Duration,
    /// Extra time granted on quit beyond `stop_command`.
    pub quit_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            stop_command: Duration::from_secs(30),
            exit_grace: Duration::from_secs(10),
            relay_drain: Duration::from_secs(1),
            quit_grace: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    /// Upper bound for [`Supervisor::shutdown`].
    pub fn quit_budget(&self) -> Duration {
        self.stop_command + self.quit_grace
    }
}

/// Builds the `podman run` description for a loaded configuration.
pub fn container_spec(config: &AppConfig, use_gpu: bool) -> RunSpec {
    RunSpec {
        container_name: config.container_name.clone(),
        image: config.container_image.clone(),
        model_name: config.model_name.clone(),
        token: config.token.clone(),
        initial_peers: config.initial_peers().map(str::to_string),
        port: config.port,
        use_gpu,
        workload: Workload::default(),
    }
}

/// One start attempt and, once spawned, its process.
struct Attempt {
    generation: u64,
    cancel: CancellationToken,
    container_name: Option<String>,
    pid: Option<u32>,
    /// Flipped to `true` once the attempt is fully finished.
    done: watch::Sender<bool>,
}

#[derive(Default)]
struct ProcessSlot {
    generation: u64,
    attempt: Option<Attempt>,
}

enum StartOutcome {
    Spawned,
    NoGpu,
    Abandoned,
}

struct Inner {
    state: Mutex<AppState>,
    slot: Mutex<ProcessSlot>,
    state_tx: watch::Sender<AppState>,
    config: Arc<dyn ConfigLoader>,
    runtime: Arc<dyn ContainerRuntime>,
    tray: Arc<dyn TrayNotifier>,
    power: Arc<SleepInhibitor>,
    sink: Arc<dyn LogSink>,
    timeouts: Timeouts,
}

/// Drives the container through its lifecycle.
///
/// Cheap to clone; all clones share one state machine.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    config: Arc<dyn ConfigLoader>,
    runtime: Arc<dyn ContainerRuntime>,
    tray: Arc<dyn TrayNotifier>,
    power: Arc<SleepInhibitor>,
    sink: Arc<dyn LogSink>,
    timeouts: Timeouts,
}

impl SupervisorBuilder {
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Where container output goes. Defaults to [`TracingSink`].
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Supervisor {
        let (state_tx, _) = watch::channel(AppState::Stopped);
        Supervisor {
            inner: Arc::new(Inner {
                state: Mutex::new(AppState::Stopped),
                slot: Mutex::new(ProcessSlot::default()),
                state_tx,
                config: self.config,
                runtime: self.runtime,
                tray: self.tray,
                power: self.power,
                sink: self.sink,
                timeouts: self.timeouts,
            }),
        }
    }
}

impl Supervisor {
    pub fn builder(
        config: Arc<dyn ConfigLoader>,
        runtime: Arc<dyn ContainerRuntime>,
        tray: Arc<dyn TrayNotifier>,
        power: Arc<SleepInhibitor>,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            config,
            runtime,
            tray,
            power,
            sink: Arc::new(TracingSink),
            timeouts: Timeouts::default(),
        }
    }

    pub fn state(&self) -> AppState {
        *self.lock_state()
    }

    /// Receives every state change.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state_tx.subscribe()
    }

    /// PID of the live container process, if one is running.
    pub fn process_id(&self) -> Option<u32> {
        self.lock_slot().attempt.as_ref().and_then(|a| a.pid)
    }

    pub fn timeouts(&self) -> Timeouts {
        self.inner.timeouts
    }

    /// Begins a start attempt.
    ///
    /// Ignored unless the state is `Stopped`, `Error` or `Thankyou` and the
    /// previous attempt has fully finished. Returns the attempt's task.
    pub fn request_start(&self) -> Option<JoinHandle<()>> {
        let generation = {
            let mut state = self.lock_state();
            if !state.can_start() {
                debug!(state = %*state, "start requested while busy, ignoring");
                return None;
            }
            let mut slot = self.lock_slot();
            if slot.attempt.is_some() {
                warn!("previous container process still shutting down, ignoring start");
                return None;
            }
            slot.generation += 1;
            let generation = slot.generation;
            let (done, _) = watch::channel(false);
            slot.attempt = Some(Attempt {
                generation,
                cancel: CancellationToken::new(),
                container_name: None,
                pid: None,
                done,
            });
            drop(slot);
            self.enter(&mut state, AppState::Starting);
            generation
        };

        let supervisor = self.clone();
        Some(tokio::spawn(async move {
            supervisor.run_start(generation).await;
        }))
    }

    /// Begins stopping the container.
    ///
    /// Ignored unless the state is `Starting` or `Running`. Returns the stop
    /// task.
    pub fn request_stop(&self) -> Option<JoinHandle<()>> {
        {
            let mut state = self.lock_state();
            if !state.can_stop() {
                debug!(state = %*state, "stop requested while not running, ignoring");
                return None;
            }
            self.enter(&mut state, AppState::Stopping);
        }

        let supervisor = self.clone();
        Some(tokio::spawn(async move {
            supervisor.run_stop().await;
        }))
    }

    /// Stops the container if needed and waits, bounded by
    /// [`Timeouts::quit_budget`], for the lifecycle to settle.
    pub async fn shutdown(&self) {
        let budget = self.inner.timeouts.quit_budget();
        let task = match self.state() {
            AppState::Starting | AppState::Running => self.request_stop(),
            AppState::Stopping => None,
            _ => return,
        };

        info!("attempting graceful shutdown of container");
        let mut states = self.subscribe();
        let settled = async {
            if let Some(task) = task {
                let _ = task.await;
            }
            let _ = states.wait_for(|s| !s.is_active()).await;
        };
        if tokio::time::timeout(budget, settled).await.is_err() {
            warn!(timeout = ?budget, "timed out waiting for container to stop");
        }
    }

    async fn run_start(self, generation: u64) {
        let Some(cancel) = self.attempt_token(generation) else {
            return;
        };

        match self.start_container(generation, &cancel).await {
            Ok(StartOutcome::Spawned) => {}
            Ok(StartOutcome::NoGpu) => {
                self.conclude(generation, Some((&[AppState::Starting], AppState::Thankyou)));
            }
            Ok(StartOutcome::Abandoned) => {
                info!("container start abandoned");
                self.conclude(generation, None);
            }
            Err(e) if e.is_cancelled() => {
                info!("container start cancelled");
                self.conclude(generation, None);
            }
            Err(e) => {
                error!(error = %e, "failed to start container");
                self.conclude(generation, Some((&[AppState::Starting], AppState::Error)));
            }
        }
    }

    async fn start_container(
        &self,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<StartOutcome, LifecycleError> {
        let config = self.inner.config.load()?;
        self.record_container_name(generation, &config.container_name);
        info!(
            container = %config.container_name,
            image = %config.container_image,
            port = config.port,
            "starting container service"
        );

        self.inner.runtime.wait_until_ready(cancel).await?;

        let gpu_present = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StartOutcome::Abandoned),
            present = self.inner.runtime.probe_gpu() => present?,
        };

        let use_gpu = match (gpu_present, config.use_gpu) {
            (true, true) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(StartOutcome::Abandoned),
                    prepared = self.inner.runtime.prepare_gpu() => prepared?,
                }
                true
            }
            (true, false) => {
                info!("GPU present but disabled in configuration");
                false
            }
            (false, _) => match config.no_gpu_policy {
                NoGpuPolicy::ThankYou => {
                    info!("no Nvidia GPU detected, not starting container");
                    return Ok(StartOutcome::NoGpu);
                }
                NoGpuPolicy::ContinueWithoutGpu => {
                    warn!("no Nvidia GPU detected, starting container without GPU");
                    false
                }
            },
        };

        let spec = container_spec(&config, use_gpu);
        if !self.still_starting(generation, cancel) {
            return Ok(StartOutcome::Abandoned);
        }

        let spawned = self.inner.runtime.spawn(&spec, cancel.clone())?;
        self.adopt(generation, spawned);
        Ok(StartOutcome::Spawned)
    }

    /// Hands a spawned process to its watcher and enters `Running`.
    fn adopt(&self, generation: u64, spawned: SpawnedProcess) {
        let SpawnedProcess {
            handle,
            stdout,
            stderr,
        } = spawned;

        let mut relays = RelayGroup::new();
        relays.spawn(stdout, StreamLabel::Stdout, self.inner.sink.clone());
        relays.spawn(stderr, StreamLabel::Stderr, self.inner.sink.clone());

        let pid = handle.pid();
        if let Some(attempt) = self.lock_slot().current_mut(generation) {
            attempt.pid = pid;
        }
        info!(pid = ?pid, "container process started");

        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor.watch_process(generation, handle, relays).await;
        });

        self.transition_if(&[AppState::Starting], AppState::Running);
    }

    async fn watch_process(self, generation: u64, mut handle: ProcessHandle, mut relays: RelayGroup) {
        let pid = handle.pid();
        let result = handle.wait().await;
        let cancelled = matches!(&result, Err(e) if e.is_cancelled());

        if cancelled {
            if !relays.wait_timeout(self.inner.timeouts.relay_drain).await {
                debug!("output relays did not drain in time");
            }
        } else {
            relays.wait().await;
        }
        drop(handle);

        const LIVE: &[AppState] = &[AppState::Starting, AppState::Running];
        let stopping = self.state() == AppState::Stopping;
        match &result {
            _ if stopping || cancelled => {
                info!(pid = ?pid, "container process ended during stop");
                self.conclude(generation, None);
            }
            Ok(()) => {
                info!(pid = ?pid, "container process exited");
                self.conclude(generation, Some((LIVE, AppState::Stopped)));
            }
            Err(e) => {
                error!(pid = ?pid, error = %e, "container process exited unexpectedly");
                self.conclude(generation, Some((LIVE, AppState::Error)));
            }
        }
    }

    async fn run_stop(self) {
        let attempt = self.lock_slot().attempt.as_ref().map(|a| {
            (
                a.container_name.clone(),
                a.cancel.clone(),
                a.done.subscribe(),
            )
        });
        let Some((container_name, cancel, mut done)) = attempt else {
            self.transition_if(&[AppState::Stopping], AppState::Stopped);
            return;
        };

        if let Some(name) = container_name.as_deref() {
            let limit = self.inner.timeouts.stop_command;
            match tokio::time::timeout(limit, self.inner.runtime.stop(name)).await {
                Ok(Ok(())) => info!(container = name, "container stopped"),
                Ok(Err(e)) => warn!(container = name, error = %e, "failed to stop container"),
                Err(_) => warn!(container = name, timeout = ?limit, "timed out stopping container"),
            }
        }

        debug!("cancelling container process");
        cancel.cancel();

        let grace = self.inner.timeouts.exit_grace;
        let exited = tokio::time::timeout(grace, done.wait_for(|d| *d))
            .await
            .is_ok();
        if !exited {
            warn!(timeout = ?grace, "container process did not exit in time");
        }

        self.transition_if(&[AppState::Stopping], AppState::Stopped);
    }

    /// Clears the attempt, then applies `transition` if the current state
    /// is one of its sources. Without a transition the stop task owns the
    /// move to `Stopped`.
    fn conclude(&self, generation: u64, transition: Option<(&[AppState], AppState)>) {
        let mut state = self.lock_state();
        let finished = self
            .lock_slot()
            .attempt
            .take_if(|a| a.generation == generation);
        if let Some(attempt) = finished {
            attempt.done.send_replace(true);
        }

        if let Some((from, next)) = transition
            && from.contains(&*state)
        {
            self.enter(&mut state, next);
        }
    }

    fn transition_if(&self, from: &[AppState], next: AppState) -> bool {
        let mut state = self.lock_state();
        if !from.contains(&*state) {
            debug!(current = %*state, wanted = %next, "transition skipped");
            return false;
        }
        self.enter(&mut state, next);
        true
    }

    fn enter(&self, state: &mut AppState, next: AppState) {
        if *state == next {
            return;
        }
        info!(from = %*state, to = %next, "state transition");
        *state = next;
        self.inner.state_tx.send_replace(next);

        let tray = &self.inner.tray;
        tray.change_status_text(next.status_text());
        match next {
            AppState::Starting | AppState::Running => tray.set_started(),
            AppState::Stopping | AppState::Stopped | AppState::Error | AppState::Thankyou => {
                tray.set_stopped()
            }
        }

        let power = &self.inner.power;
        let applied = if next.keeps_awake() {
            power.prevent_sleep()
        } else {
            power.allow_sleep()
        };
        match applied {
            Ok(()) => {}
            Err(e) if e.is_noop() => {}
            Err(e) => warn!(error = %e, "failed to update sleep prevention"),
        }
    }

    fn attempt_token(&self, generation: u64) -> Option<CancellationToken> {
        self.lock_slot()
            .current_mut(generation)
            .map(|a| a.cancel.clone())
    }

    fn record_container_name(&self, generation: u64, name: &str) {
        if let Some(attempt) = self.lock_slot().current_mut(generation) {
            attempt.container_name = Some(name.to_string());
        }
    }

    /// Re-validates the attempt right before spawning.
    fn still_starting(&self, generation: u64, cancel: &CancellationToken) -> bool {
        let state = self.lock_state();
        let current = self
            .lock_slot()
            .current_mut(generation)
            .is_some_and(|a| a.pid.is_none());
        if *state != AppState::Starting || !current || cancel.is_cancelled() {
            warn!(state = %*state, "container start aborted before spawn");
            return false;
        }
        true
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_slot(&self) -> MutexGuard<'_, ProcessSlot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, next: AppState) {
        let mut state = self.lock_state();
        self.enter(&mut state, next);
    }
}

impl ProcessSlot {
    fn current_mut(&mut self, generation: u64) -> Option<&mut Attempt> {
        self.attempt
            .as_mut()
            .filter(|a| a.generation == generation)
    }
}
