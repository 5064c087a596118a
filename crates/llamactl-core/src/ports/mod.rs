//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the supervisor expects from infrastructure and
//! the interface it offers to hosts. They contain no implementation details.
//!
//! # Design Rules
//!
//! - No `tokio::process` or HTTP client types in any signature
//! - Intent-based methods for the supervisor (not implementation-leaking)
//! - Monitoring and logging ports never return errors that callers must handle

mod process_stats;
mod process_supervisor;
mod server_log_sink;

pub use process_stats::{ProcessStatsPort, ResidentMemory};
pub use process_supervisor::ProcessSupervisor;
pub use server_log_sink::{NoopLogSink, ServerLogSinkPort};
