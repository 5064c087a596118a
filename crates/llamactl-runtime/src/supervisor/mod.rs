//! The llama-server supervisor.
//!
//! `Supervisor` launches one server per model key, deduplicates concurrent
//! launches, routes client calls by key, aggregates memory, and tears servers
//! down. All bookkeeping lives behind one async mutex in an explicitly
//! constructed instance; there is no global state.
//!
//! # Lifecycle
//!
//! ```text
//! launch ─► port ─► spawn (under lock) ─► driver task ─┬─► marker  ─► Ready ─► launch Ok
//!                                                      └─► exit    ─► removed ─► launch Err
//! cleanup_process ─► Terminating ─► SIGTERM ─► (grace) ─► SIGKILL ─► removed
//! ```

mod coordinator;
mod driver;
mod output;
mod readiness;
mod registry;

pub use coordinator::{LaunchCoordinator, LaunchOutcome, LaunchRequest, LaunchResolver};
pub use output::OutputLogger;
pub use readiness::ReadinessDetector;
pub use registry::{ExitInfo, ManagedProcess, ProcessRegistry};

use crate::client::ServerClient;
use crate::command::build_command;
use crate::monitor::ResourceMonitor;
use crate::ports::{allocate_port, check_requested_port};
use crate::stream::spawn_stream_reader;
use async_trait::async_trait;
use driver::ProcessDriver;
use llamactl_core::{
    LaunchOptions, ModelKey, ModelParameters, NoopLogSink, OutputStream, ProcessState,
    ProcessStatsPort, ProcessSupervisor, ServerLogSinkPort, SupervisorConfig, SupervisorError,
    SupervisorEvent,
};
use registry::{DriverCommand, ExitWatch};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long to wait for the exit after a forced kill was delivered.
const FORCED_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 64;

/// Registry and pending launches, always locked together.
#[derive(Debug, Default)]
struct Tracked {
    registry: ProcessRegistry,
    launches: LaunchCoordinator,
}

/// State shared between the supervisor and its process drivers.
struct Shared {
    tracked: Mutex<Tracked>,
    events: broadcast::Sender<SupervisorEvent>,
    next_generation: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            tracked: Mutex::new(Tracked::default()),
            events: broadcast::channel(EVENT_CAPACITY).0,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Publish a lifecycle event. Dropped when nobody is subscribed.
    fn publish(&self, event: SupervisorEvent) {
        if self.events.receiver_count() > 0 {
            debug!(?event, "Publishing supervisor event");
            let _ = self.events.send(event);
        }
    }
}

/// Point-in-time view of a supervised server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub model_key: ModelKey,
    pub pid: Option<u32>,
    pub port: u16,
    pub state: ProcessState,
    pub started_at: i64,
}

impl From<&ManagedProcess> for ProcessSnapshot {
    fn from(process: &ManagedProcess) -> Self {
        Self {
            model_key: process.model_key.clone(),
            pid: process.pid,
            port: process.port,
            state: process.state,
            started_at: process.started_at,
        }
    }
}

/// Supervisor for local llama-server processes.
///
/// Cloning is cheap; clones share the same processes.
#[derive(Clone)]
pub struct Supervisor {
    config: SupervisorConfig,
    shared: Arc<Shared>,
    monitor: ResourceMonitor,
    http: reqwest::Client,
    log_sink: Arc<dyn ServerLogSinkPort>,
}

impl Supervisor {
    /// Create a supervisor with the `sysinfo` monitor and no log sink.
    pub fn new(config: SupervisorConfig) -> Result<Self, SupervisorError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SupervisorError::Client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            shared: Arc::new(Shared::new()),
            monitor: ResourceMonitor::default(),
            http,
            log_sink: Arc::new(NoopLogSink),
        })
    }

    /// Forward server output to `sink` in addition to `tracing`.
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn ServerLogSinkPort>) -> Self {
        self.log_sink = sink;
        self
    }

    /// Use a custom process statistics source for `memory_usage`.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<dyn ProcessStatsPort>) -> Self {
        self.monitor = ResourceMonitor::new(stats);
        self
    }

    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.shared.events.subscribe()
    }

    pub async fn state(&self, model_key: &ModelKey) -> Option<ProcessState> {
        let tracked = self.shared.tracked.lock().await;
        tracked.registry.get(model_key).map(|p| p.state)
    }

    pub async fn port(&self, model_key: &ModelKey) -> Option<u16> {
        let tracked = self.shared.tracked.lock().await;
        tracked.registry.get(model_key).map(|p| p.port)
    }

    pub async fn pid(&self, model_key: &ModelKey) -> Option<u32> {
        let tracked = self.shared.tracked.lock().await;
        tracked.registry.get(model_key).and_then(|p| p.pid)
    }

    pub async fn is_tracked(&self, model_key: &ModelKey) -> bool {
        self.shared.tracked.lock().await.registry.contains(model_key)
    }

    pub async fn has_pending_launch(&self, model_key: &ModelKey) -> bool {
        self.shared.tracked.lock().await.launches.contains(model_key)
    }

    /// Snapshot of every tracked server.
    pub async fn processes(&self) -> Vec<ProcessSnapshot> {
        let tracked = self.shared.tracked.lock().await;
        tracked.registry.iter().map(ProcessSnapshot::from).collect()
    }

    /// Ensure a server for `model_key` is running and ready.
    ///
    /// The port is chosen without the tracking lock held; the registry is
    /// re-checked once the lock is taken again.
    pub async fn launch(
        &self,
        model_key: &ModelKey,
        options: LaunchOptions,
    ) -> Result<(), SupervisorError> {
        let mut port = None;

        loop {
            let mut previous = {
                let mut tracked = self.shared.tracked.lock().await;

                if let Some(request) = tracked.launches.join(model_key) {
                    drop(tracked);
                    debug!(model_key = %model_key, "Joining in-flight launch");
                    return request.wait(model_key).await;
                }

                let existing = tracked
                    .registry
                    .get(model_key)
                    .map(|p| (p.state, p.exit_watch()));

                match existing {
                    Some((state, _)) if state.is_live() => {
                        debug!(model_key = %model_key, %state, "Server already running");
                        return Ok(());
                    }
                    Some((_, exit)) => {
                        port = None;
                        exit
                    }
                    None => match port.take() {
                        Some(port) if !tracked.registry.used_ports().contains(&port) => {
                            let request =
                                self.spawn_locked(&mut tracked, model_key, &options, port)?;
                            drop(tracked);
                            return request.wait(model_key).await;
                        }
                        _ => {
                            let used_ports = tracked.registry.used_ports();
                            drop(tracked);
                            port = Some(self.select_port(options.port, &used_ports).await?);
                            continue;
                        }
                    },
                }
            };

            debug!(model_key = %model_key, "Waiting for previous server to exit before relaunch");
            previous.wait().await;
        }
    }

    async fn select_port(
        &self,
        requested: Option<u16>,
        used_ports: &[u16],
    ) -> Result<u16, SupervisorError> {
        match requested {
            Some(port) => check_requested_port(&self.config.host, port, used_ports),
            None => allocate_port(&self.config.host, self.config.base_port, used_ports).await,
        }
    }

    /// Spawn a server on `port` and register it with a fresh launch request.
    ///
    /// Runs with the tracking lock held so the registry check, the spawn and
    /// the registration form one critical section.
    fn spawn_locked(
        &self,
        tracked: &mut Tracked,
        model_key: &ModelKey,
        options: &LaunchOptions,
        port: u16,
    ) -> Result<LaunchRequest, SupervisorError> {
        let mut command = build_command(
            &self.config.server_path,
            &self.config.host,
            model_key,
            options,
            port,
        );
        let mut child = command.spawn().map_err(|e| {
            warn!(model_key = %model_key, error = %e, "Failed to spawn llama-server");
            SupervisorError::SpawnFailure {
                model_key: model_key.to_string(),
                reason: format!("{}: {e}", self.config.server_path.display()),
            }
        })?;
        let pid = child.id();

        let (line_tx, lines) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, OutputStream::Stdout, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, OutputStream::Stderr, line_tx);
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let (control, commands) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (resolver, request) = LaunchRequest::channel(generation);

        let process = ManagedProcess::new(
            model_key.clone(),
            generation,
            pid,
            port,
            control,
            ExitWatch::new(exit_rx),
        );
        if tracked.registry.insert(process).is_err() {
            // Unreachable under the lock; `child` is killed on drop
            return Err(SupervisorError::SpawnFailure {
                model_key: model_key.to_string(),
                reason: "a server is already tracked for this key".to_string(),
            });
        }
        tracked.launches.register(model_key.clone(), request.clone());

        ProcessDriver {
            shared: Arc::clone(&self.shared),
            model_key: model_key.clone(),
            generation,
            port,
            child,
            lines,
            commands,
            exit_tx,
            resolver,
            output: OutputLogger::new(model_key.clone(), pid, Arc::clone(&self.log_sink)),
        }
        .spawn();

        info!(model_key = %model_key, pid = ?pid, port, generation, "Spawned llama-server");
        self.shared
            .publish(SupervisorEvent::spawned(model_key.clone(), pid, port));

        Ok(request)
    }

    /// Terminate the server for `model_key`, escalating to a forced kill.
    pub async fn cleanup_process(&self, model_key: &ModelKey) -> Result<(), SupervisorError> {
        let (generation, control, mut exit) = {
            let mut tracked = self.shared.tracked.lock().await;
            tracked.launches.remove(model_key);

            let Some(process) = tracked.registry.get_mut(model_key) else {
                debug!(model_key = %model_key, "No server tracked, nothing to clean up");
                return Ok(());
            };
            process.transition(ProcessState::Terminating);
            (process.generation, process.control(), process.exit_watch())
        };

        info!(model_key = %model_key, "Stopping server");
        self.shared
            .publish(SupervisorEvent::stopping(model_key.clone()));

        let result = self.terminate(model_key, &control, &mut exit).await;

        let mut tracked = self.shared.tracked.lock().await;
        tracked.registry.remove_generation(model_key, generation);
        tracked.launches.remove_generation(model_key, generation);

        result
    }

    async fn terminate(
        &self,
        model_key: &ModelKey,
        control: &mpsc::UnboundedSender<DriverCommand>,
        exit: &mut ExitWatch,
    ) -> Result<(), SupervisorError> {
        match send_terminate(control, false).await {
            Ok(()) => {
                if timeout(self.config.shutdown_grace, exit.wait()).await.is_ok() {
                    debug!(model_key = %model_key, "Server exited gracefully");
                    return Ok(());
                }
                warn!(
                    model_key = %model_key,
                    grace_ms = self.config.shutdown_grace.as_millis(),
                    "Server did not exit within grace period, forcing kill"
                );
            }
            Err(e) => {
                warn!(model_key = %model_key, error = %e, "Graceful termination failed, forcing kill");
            }
        }

        let failure = |reason: String| SupervisorError::TerminationFailure {
            model_key: model_key.to_string(),
            reason,
        };

        send_terminate(control, true)
            .await
            .map_err(|e| failure(format!("forced kill failed: {e}")))?;

        timeout(FORCED_EXIT_TIMEOUT, exit.wait())
            .await
            .map_err(|_| failure("process did not exit after forced kill".to_string()))?;

        Ok(())
    }

    /// Signal every tracked server and forget all of them.
    ///
    /// Does not escalate or wait; drivers reap the processes as they exit.
    pub async fn close(&self) {
        let processes = {
            let mut tracked = self.shared.tracked.lock().await;
            tracked.launches.clear();
            tracked.registry.drain()
        };

        let count = processes.len();
        for mut process in processes {
            process.transition(ProcessState::Terminating);
            if !process.signal_graceful() {
                debug!(model_key = %process.model_key, "Server already exited");
            }
            self.shared
                .publish(SupervisorEvent::stopping(process.model_key.clone()));
        }

        info!(count, "Closed supervisor");
    }

    /// Sum of resident memory (bytes) across tracked servers.
    pub async fn memory_usage(&self) -> u64 {
        let pids = self.shared.tracked.lock().await.registry.pids();
        self.monitor.memory_usage(&pids).await
    }

    /// Tokenize `text` with the server for `model_key`.
    pub async fn encode(
        &self,
        model_key: &ModelKey,
        text: &str,
    ) -> Result<Vec<i32>, SupervisorError> {
        let (client, generation) = self.route(model_key).await?;
        let tokens = client.encode(text).await?;
        self.mark_running(model_key, generation).await;
        Ok(tokens)
    }

    /// Read the loaded model's parameters from the server for `model_key`.
    pub async fn model_parameters(
        &self,
        model_key: &ModelKey,
    ) -> Result<ModelParameters, SupervisorError> {
        let (client, generation) = self.route(model_key).await?;
        let params = client.model_parameters().await?;
        self.mark_running(model_key, generation).await;
        Ok(params)
    }

    /// Resolve the client for `model_key`'s server.
    async fn route(&self, model_key: &ModelKey) -> Result<(ServerClient, u64), SupervisorError> {
        let tracked = self.shared.tracked.lock().await;
        let process = tracked
            .registry
            .get(model_key)
            .ok_or_else(|| SupervisorError::NotRunning(model_key.to_string()))?;

        match process.state {
            ProcessState::Spawning => Err(SupervisorError::NotReady(model_key.to_string())),
            ProcessState::Ready | ProcessState::Running => Ok((
                ServerClient::with_client(self.http.clone(), &self.config.host, process.port),
                process.generation,
            )),
            ProcessState::Terminating | ProcessState::Terminated => {
                Err(SupervisorError::NotRunning(model_key.to_string()))
            }
        }
    }

    async fn mark_running(&self, model_key: &ModelKey, generation: u64) {
        let mut tracked = self.shared.tracked.lock().await;
        if let Some(process) = tracked.registry.get_generation_mut(model_key, generation) {
            if process.state == ProcessState::Ready {
                process.transition(ProcessState::Running);
            }
        }
    }
}

/// Send a termination request to a driver and wait for its answer.
///
/// A driver that is gone has already reaped its child, which counts as done.
async fn send_terminate(
    control: &mpsc::UnboundedSender<DriverCommand>,
    force: bool,
) -> io::Result<()> {
    let (reply, rx) = oneshot::channel();
    if control
        .send(DriverCommand::Terminate {
            force,
            reply: Some(reply),
        })
        .is_err()
    {
        return Ok(());
    }
    rx.await.unwrap_or(Ok(()))
}

#[async_trait]
impl ProcessSupervisor for Supervisor {
    async fn launch(
        &self,
        model_key: &ModelKey,
        options: LaunchOptions,
    ) -> Result<(), SupervisorError> {
        Self::launch(self, model_key, options).await
    }

    async fn cleanup_process(&self, model_key: &ModelKey) -> Result<(), SupervisorError> {
        Self::cleanup_process(self, model_key).await
    }

    async fn close(&self) {
        Self::close(self).await;
    }

    async fn memory_usage(&self) -> u64 {
        Self::memory_usage(self).await
    }

    async fn encode(&self, model_key: &ModelKey, text: &str) -> Result<Vec<i32>, SupervisorError> {
        Self::encode(self, model_key, text).await
    }

    async fn model_parameters(
        &self,
        model_key: &ModelKey,
    ) -> Result<ModelParameters, SupervisorError> {
        Self::model_parameters(self, model_key).await
    }
}
