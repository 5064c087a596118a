//! Per-process driver task.
//!
//! One driver owns each server's `Child`. It races output lines, termination
//! commands and process exit in a single loop, so readiness and exit are
//! decided by one state machine and signals only ever reach an un-reaped
//! child.

use super::coordinator::LaunchResolver;
use super::output::OutputLogger;
use super::readiness::ReadinessDetector;
use super::registry::{DriverCommand, ExitInfo};
use super::Shared;
use crate::shutdown;
use crate::stream::OutputLine;
use llamactl_core::{ModelKey, OutputStream, ProcessState, SupervisorError, SupervisorEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// How long to keep collecting buffered output after the process exited.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

pub(super) struct ProcessDriver {
    pub shared: Arc<Shared>,
    pub model_key: ModelKey,
    pub generation: u64,
    pub port: u16,
    pub child: Child,
    pub lines: mpsc::UnboundedReceiver<OutputLine>,
    pub commands: mpsc::UnboundedReceiver<DriverCommand>,
    pub exit_tx: watch::Sender<Option<ExitInfo>>,
    pub resolver: LaunchResolver,
    pub output: OutputLogger,
}

impl ProcessDriver {
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let mut readiness = ReadinessDetector::new();
        let mut ready = false;

        let status = loop {
            tokio::select! {
                // Output already produced is handled before a concurrent exit
                biased;

                Some(line) = self.lines.recv() => {
                    ready |= self.on_line(&line, &mut readiness).await;
                }
                Some(command) = self.commands.recv() => self.handle(command),
                status = self.child.wait() => break status,
            }
        };

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(model_key = %self.model_key, error = %e, "Failed to wait for server process");
                None
            }
        };

        ready |= self.drain_output(&mut readiness).await;
        self.finish(code, ready).await;
    }

    /// Forward one line and check stdout for the readiness record.
    ///
    /// Returns true if this line made the server ready.
    async fn on_line(&self, line: &OutputLine, readiness: &mut ReadinessDetector) -> bool {
        self.output.forward(line.stream, &line.text);
        line.stream == OutputStream::Stdout
            && readiness.observe(&line.text)
            && self.mark_ready().await
    }

    /// Move the entry to `Ready` and resolve the launch.
    ///
    /// The marker only counts while the process is still `Spawning`; once a
    /// cleanup has started, the launch is settled by the exit instead.
    async fn mark_ready(&self) -> bool {
        let mut tracked = self.shared.tracked.lock().await;

        let promoted = tracked
            .registry
            .get_generation_mut(&self.model_key, self.generation)
            .is_some_and(|p| p.state == ProcessState::Spawning && p.transition(ProcessState::Ready));

        if !promoted {
            debug!(
                model_key = %self.model_key,
                "Readiness marker ignored, termination already requested"
            );
            return false;
        }

        tracked
            .launches
            .remove_generation(&self.model_key, self.generation);
        self.resolver.resolve(Ok(()));
        drop(tracked);

        info!(model_key = %self.model_key, port = self.port, "Server is ready");
        self.shared
            .publish(SupervisorEvent::ready(self.model_key.clone(), self.port));
        true
    }

    fn handle(&mut self, command: DriverCommand) {
        let DriverCommand::Terminate { force, reply } = command;

        let result = if force {
            shutdown::force_kill(&mut self.child)
        } else {
            shutdown::request_graceful(&self.child)
        };

        match &result {
            Ok(()) => debug!(model_key = %self.model_key, force, "Termination signal sent"),
            Err(e) => warn!(model_key = %self.model_key, force, error = %e, "Termination signal failed"),
        }

        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    /// Handle output still buffered when the process exited.
    ///
    /// A marker read here still resolves the launch; the entry stays
    /// `Spawning` until `finish` removes it.
    async fn drain_output(&mut self, readiness: &mut ReadinessDetector) -> bool {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        let mut ready = false;
        while let Ok(Some(line)) = timeout_at(deadline, self.lines.recv()).await {
            ready |= self.on_line(&line, readiness).await;
        }
        ready
    }

    /// Forget the process, settle any pending launch, and publish the exit.
    async fn finish(self, code: Option<i32>, ready: bool) {
        {
            let mut tracked = self.shared.tracked.lock().await;
            if let Some(mut process) = tracked
                .registry
                .remove_generation(&self.model_key, self.generation)
            {
                process.transition(ProcessState::Terminated);
            }
            tracked
                .launches
                .remove_generation(&self.model_key, self.generation);
            self.resolver
                .resolve(Err(SupervisorError::ProcessExitedBeforeReady {
                    model_key: self.model_key.to_string(),
                    exit_code: code,
                }));
        }

        self.exit_tx.send_replace(Some(ExitInfo { code }));

        if ready {
            info!(model_key = %self.model_key, exit_code = ?code, "Server exited");
        } else {
            warn!(model_key = %self.model_key, exit_code = ?code, "Server exited before it was ready");
        }
        self.shared.publish(SupervisorEvent::exited(
            self.model_key.clone(),
            code,
            !ready,
        ));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::supervisor::coordinator::LaunchRequest;
    use crate::supervisor::registry::{ExitWatch, ManagedProcess};
    use llamactl_core::NoopLogSink;
    use tokio::process::Command;

    const MARKER: &str = r#"{"level":"INFO","message":"HTTP server listening"}"#;

    #[tokio::test]
    async fn test_marker_read_after_exit_resolves_launch() {
        let shared = Arc::new(Shared::new());
        let key = ModelKey::new("/m/a.gguf").unwrap();
        let generation = 1;

        let child = Command::new("sh")
            .args(["-c", "exit 0"])
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id();
        let (line_tx, lines) = mpsc::unbounded_channel();
        let (control, commands) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (resolver, request) = LaunchRequest::channel(generation);
        let mut exit = ExitWatch::new(exit_rx.clone());

        {
            let mut tracked = shared.tracked.lock().await;
            tracked
                .registry
                .insert(ManagedProcess::new(
                    key.clone(),
                    generation,
                    pid,
                    8080,
                    control,
                    ExitWatch::new(exit_rx),
                ))
                .unwrap();
            tracked.launches.register(key.clone(), request.clone());
        }

        ProcessDriver {
            shared: Arc::clone(&shared),
            model_key: key.clone(),
            generation,
            port: 8080,
            child,
            lines,
            commands,
            exit_tx,
            resolver,
            output: OutputLogger::new(key.clone(), pid, Arc::new(NoopLogSink)),
        }
        .spawn();

        // The child is reaped long before this; only the drain can see it
        tokio::time::sleep(Duration::from_millis(100)).await;
        line_tx
            .send(OutputLine {
                stream: OutputStream::Stdout,
                text: MARKER.to_string(),
            })
            .unwrap();

        assert!(request.wait(&key).await.is_ok());
        assert_eq!(exit.wait().await, Some(ExitInfo { code: Some(0) }));

        let tracked = shared.tracked.lock().await;
        assert!(!tracked.registry.contains(&key));
        assert!(!tracked.launches.contains(&key));
    }
}
