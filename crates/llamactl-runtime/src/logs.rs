//! Server log capture.
//!
//! `ServerLogManager` is a `ServerLogSinkPort` that keeps the most recent
//! records of every supervised server in a ring buffer and re-broadcasts each
//! record to live subscribers (for example a host UI log pane).

use llamactl_core::{LogRecord, ModelKey, OutputStream, ServerLogSinkPort};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Maximum number of log records kept per server
const MAX_LOG_LINES: usize = 5000;

/// A single captured record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLogEntry {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub model_key: ModelKey,
    pub pid: Option<u32>,
    pub stream: OutputStream,
    pub record: LogRecord,
}

impl ServerLogEntry {
    pub fn new(model_key: ModelKey, pid: Option<u32>, stream: OutputStream, record: LogRecord) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            model_key,
            pid,
            stream,
            record,
        }
    }
}

/// Ring buffer storing recent records for one server
#[derive(Debug, Default)]
struct LogBuffer {
    lines: VecDeque<ServerLogEntry>,
}

impl LogBuffer {
    fn push(&mut self, entry: ServerLogEntry) {
        if self.lines.len() >= MAX_LOG_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(entry);
    }
}

/// Buffers and broadcasts server output for all supervised servers.
pub struct ServerLogManager {
    buffers: RwLock<HashMap<ModelKey, LogBuffer>>,
    broadcast_tx: broadcast::Sender<ServerLogEntry>,
}

impl ServerLogManager {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1000);
        Self {
            buffers: RwLock::new(HashMap::new()),
            broadcast_tx,
        }
    }

    /// Recent records for one server, oldest first.
    pub fn get_logs(&self, model_key: &ModelKey) -> Vec<ServerLogEntry> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        buffers
            .get(model_key)
            .map(|b| b.lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Receive every record appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerLogEntry> {
        self.broadcast_tx.subscribe()
    }

    pub fn clear_logs(&self, model_key: &ModelKey) {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        buffers.remove(model_key);
    }
}

impl Default for ServerLogManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLogSinkPort for ServerLogManager {
    fn append(&self, model_key: &ModelKey, pid: Option<u32>, stream: OutputStream, record: LogRecord) {
        let entry = ServerLogEntry::new(model_key.clone(), pid, stream, record);

        {
            let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
            buffers
                .entry(model_key.clone())
                .or_default()
                .push(entry.clone());
        }

        // No receivers is fine
        let _ = self.broadcast_tx.send(entry);
    }
}
