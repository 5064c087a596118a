//! Error types shared by the supervisor and its hosts.

use thiserror::Error;

/// Errors surfaced by supervisor operations.
///
/// The type is `Clone` because a single launch outcome is delivered to every
/// caller that joined the same in-flight launch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// The model key is empty or not path-like.
    #[error("Invalid model key: {0}")]
    InvalidModelKey(String),

    /// The OS could not create the server process.
    #[error("Failed to spawn server for {model_key}: {reason}")]
    SpawnFailure { model_key: String, reason: String },

    /// The server exited before emitting the readiness marker.
    #[error("Server for {model_key} exited before it was ready (exit code: {exit_code:?})")]
    ProcessExitedBeforeReady {
        model_key: String,
        exit_code: Option<i32>,
    },

    /// Both graceful and forced termination failed.
    #[error("Failed to terminate server for {model_key}: {reason}")]
    TerminationFailure { model_key: String, reason: String },

    /// No server is registered under the key.
    #[error("No server is running for {0}")]
    NotRunning(String),

    /// The server is registered but has not become ready.
    #[error("Server for {0} is not ready yet")]
    NotReady(String),

    /// No usable port could be found for a new server.
    #[error("Port allocation failed: {0}")]
    PortAllocation(String),

    /// The HTTP request to a running server failed.
    #[error("Server request failed: {0}")]
    Client(String),
}

impl SupervisorError {
    /// Returns true if retrying the launch immediately may succeed.
    #[must_use]
    pub const fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailure { .. } | Self::ProcessExitedBeforeReady { .. }
        )
    }
}

/// A structured-looking output line could not be decoded.
///
/// Never surfaced to callers; the output logger reports it and moves on.
#[derive(Debug, Error)]
pub enum LogParseError {
    #[error("Could not parse server output line {line:?}: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The batched OS statistics query failed.
///
/// Degrades to a zero memory reading; never surfaced to callers.
#[derive(Debug, Clone, Error)]
#[error("Process statistics query failed: {0}")]
pub struct ResourceQueryError(pub String);
