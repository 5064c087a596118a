//! Core domain types and port definitions for llamactl.
//!
//! This crate holds everything the supervisor runtime and its hosts agree on:
//! model keys, launch options, the process state machine, server log records,
//! lifecycle events, configuration, and the port traits that the runtime
//! implements. It has no process, filesystem, or network code of its own.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;

// Re-export commonly used types for convenience
pub use config::{
    ConfigError, DEFAULT_BASE_PORT, DEFAULT_HOST, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_GRACE,
    SupervisorConfig, default_server_path,
};
pub use domain::{
    DEFAULT_CONTEXT_SIZE, DEFAULT_GPU_LAYERS, DEFAULT_THREADS, LaunchOptions, LogRecord,
    ModelKey, ModelParameters, OutputStream, ProcessState, READINESS_MARKER, StructuredLog,
};
pub use error::{LogParseError, ResourceQueryError, SupervisorError};
pub use events::SupervisorEvent;
pub use ports::{NoopLogSink, ProcessStatsPort, ProcessSupervisor, ServerLogSinkPort};
