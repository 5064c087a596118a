//! Registry of supervised processes, keyed by model key.

use llamactl_core::{ModelKey, ProcessState};
use std::collections::HashMap;
use std::io;
use tokio::sync::{mpsc, oneshot, watch};

/// Exit information published by a process driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
}

/// Requests handled by the task that owns a process's `Child`.
#[derive(Debug)]
pub enum DriverCommand {
    Terminate {
        force: bool,
        reply: Option<oneshot::Sender<io::Result<()>>>,
    },
}

/// Receiver side of a process's exit notification.
#[derive(Debug, Clone)]
pub struct ExitWatch(watch::Receiver<Option<ExitInfo>>);

impl ExitWatch {
    pub const fn new(rx: watch::Receiver<Option<ExitInfo>>) -> Self {
        Self(rx)
    }

    /// Wait until the process has exited.
    ///
    /// A driver that vanished without publishing counts as exited; it owned
    /// the child, and `kill_on_drop` took the child down with it.
    pub async fn wait(&mut self) -> Option<ExitInfo> {
        self.0
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|info| *info)
    }
}

/// A supervised server process.
///
/// The `Child` itself is owned by the process driver task; this entry holds
/// the channel to that task and everything needed for routing and monitoring.
#[derive(Debug)]
pub struct ManagedProcess {
    pub model_key: ModelKey,
    /// Launch round; distinguishes successive processes for the same key.
    pub generation: u64,
    pub pid: Option<u32>,
    pub port: u16,
    pub state: ProcessState,
    /// Unix timestamp in milliseconds
    pub started_at: i64,
    control: mpsc::UnboundedSender<DriverCommand>,
    exit: ExitWatch,
}

impl ManagedProcess {
    pub fn new(
        model_key: ModelKey,
        generation: u64,
        pid: Option<u32>,
        port: u16,
        control: mpsc::UnboundedSender<DriverCommand>,
        exit: ExitWatch,
    ) -> Self {
        Self {
            model_key,
            generation,
            pid,
            port,
            state: ProcessState::Spawning,
            started_at: chrono::Utc::now().timestamp_millis(),
            control,
            exit,
        }
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&mut self, next: ProcessState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn control(&self) -> mpsc::UnboundedSender<DriverCommand> {
        self.control.clone()
    }

    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }

    /// Fire-and-forget SIGTERM. Returns false if the driver is already gone.
    pub fn signal_graceful(&self) -> bool {
        self.control
            .send(DriverCommand::Terminate {
                force: false,
                reply: None,
            })
            .is_ok()
    }
}

/// Currently supervised processes.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    processes: HashMap<ModelKey, ManagedProcess>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a process, refusing to replace an existing entry for its key.
    pub fn insert(&mut self, process: ManagedProcess) -> Result<(), ManagedProcess> {
        if self.processes.contains_key(&process.model_key) {
            return Err(process);
        }
        self.processes.insert(process.model_key.clone(), process);
        Ok(())
    }

    pub fn get(&self, model_key: &ModelKey) -> Option<&ManagedProcess> {
        self.processes.get(model_key)
    }

    pub fn get_mut(&mut self, model_key: &ModelKey) -> Option<&mut ManagedProcess> {
        self.processes.get_mut(model_key)
    }

    /// Get the entry for `model_key` only if it belongs to `generation`.
    pub fn get_generation_mut(
        &mut self,
        model_key: &ModelKey,
        generation: u64,
    ) -> Option<&mut ManagedProcess> {
        self.processes
            .get_mut(model_key)
            .filter(|p| p.generation == generation)
    }

    /// Remove the entry for `model_key` only if it belongs to `generation`.
    ///
    /// Stale notifications from an earlier round never evict a newer process.
    pub fn remove_generation(
        &mut self,
        model_key: &ModelKey,
        generation: u64,
    ) -> Option<ManagedProcess> {
        if self.get(model_key)?.generation != generation {
            return None;
        }
        self.processes.remove(model_key)
    }

    pub fn contains(&self, model_key: &ModelKey) -> bool {
        self.processes.contains_key(model_key)
    }

    /// PIDs of all tracked processes that have one.
    pub fn pids(&self) -> Vec<u32> {
        self.processes.values().filter_map(|p| p.pid).collect()
    }

    pub fn used_ports(&self) -> Vec<u16> {
        self.processes.values().map(|p| p.port).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.processes.values()
    }

    pub fn drain(&mut self) -> Vec<ManagedProcess> {
        self.processes.drain().map(|(_, p)| p).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
