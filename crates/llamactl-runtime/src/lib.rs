//! Process supervision runtime for llama-server instances.
//!
//! This crate implements the `ProcessSupervisor` port from `llamactl-core`:
//! it spawns one llama-server per model key, detects readiness from the
//! server's JSON log output, forwards server output to `tracing` and a log
//! sink, aggregates resident memory, routes client calls to the right port,
//! and terminates servers gracefully with forced-kill escalation.
#![deny(unsafe_code)]

pub mod client;
mod command;
pub mod logs;
pub mod monitor;
mod ports;
pub mod shutdown;
mod stream;
pub mod supervisor;

pub use client::ServerClient;
pub use logs::{ServerLogEntry, ServerLogManager};
pub use monitor::{ResourceMonitor, SysinfoStats};
pub use supervisor::{ProcessSnapshot, Supervisor};
