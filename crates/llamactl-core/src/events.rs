//! Supervisor lifecycle events.
//!
//! These events are published by the runtime whenever a supervised server
//! changes state, so a host UI can mirror server status without polling.

use serde::{Deserialize, Serialize};

use crate::domain::ModelKey;

/// Server lifecycle event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SupervisorEvent {
    /// The OS process was created.
    #[serde(rename_all = "camelCase")]
    Spawned {
        model_key: ModelKey,
        pid: Option<u32>,
        port: u16,
        timestamp: i64,
    },
    /// The readiness marker was observed.
    #[serde(rename_all = "camelCase")]
    Ready {
        model_key: ModelKey,
        port: u16,
        timestamp: i64,
    },
    /// Termination was requested by the host.
    #[serde(rename_all = "camelCase")]
    Stopping { model_key: ModelKey, timestamp: i64 },
    /// The OS process exited.
    #[serde(rename_all = "camelCase")]
    Exited {
        model_key: ModelKey,
        exit_code: Option<i32>,
        /// Whether the exit happened before readiness.
        before_ready: bool,
        timestamp: i64,
    },
}

impl SupervisorEvent {
    /// Current time as Unix milliseconds.
    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub fn spawned(model_key: ModelKey, pid: Option<u32>, port: u16) -> Self {
        Self::Spawned {
            model_key,
            pid,
            port,
            timestamp: Self::now_ms(),
        }
    }

    pub fn ready(model_key: ModelKey, port: u16) -> Self {
        Self::Ready {
            model_key,
            port,
            timestamp: Self::now_ms(),
        }
    }

    pub fn stopping(model_key: ModelKey) -> Self {
        Self::Stopping {
            model_key,
            timestamp: Self::now_ms(),
        }
    }

    pub fn exited(model_key: ModelKey, exit_code: Option<i32>, before_ready: bool) -> Self {
        Self::Exited {
            model_key,
            exit_code,
            before_ready,
            timestamp: Self::now_ms(),
        }
    }

    /// The model key this event refers to.
    pub const fn model_key(&self) -> &ModelKey {
        match self {
            Self::Spawned { model_key, .. }
            | Self::Ready { model_key, .. }
            | Self::Stopping { model_key, .. }
            | Self::Exited { model_key, .. } => model_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let key = ModelKey::new("/m/a.gguf").unwrap();
        let value = serde_json::to_value(SupervisorEvent::exited(key, Some(1), true)).unwrap();
        assert_eq!(value["type"], "exited");
        assert_eq!(value["modelKey"], "/m/a.gguf");
        assert_eq!(value["exitCode"], 1);
        assert_eq!(value["beforeReady"], true);
    }
}
