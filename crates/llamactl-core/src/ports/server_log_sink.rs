//! Server log sink port for structured log capture.
//!
//! This port abstracts the destination for forwarded server output, allowing
//! a no-op sink for headless use and a buffered, broadcasting sink for hosts
//! that display server logs.

use crate::domain::{LogRecord, ModelKey, OutputStream};

/// Port for appending server output records to a sink.
///
/// Implementations must be thread-safe and must not block; they are called
/// from the task that drains the server's pipes.
pub trait ServerLogSinkPort: Send + Sync {
    /// Append one record from a server process.
    ///
    /// # Arguments
    ///
    /// * `model_key` - Key of the server that produced the record
    /// * `pid` - OS process id of that server, when known
    /// * `stream` - Pipe the line was read from
    /// * `record` - The decoded line
    fn append(&self, model_key: &ModelKey, pid: Option<u32>, stream: OutputStream, record: LogRecord);
}

/// A no-op log sink that discards all records.
///
/// Useful for CLI usage where records already go to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct NoopLogSink;

impl ServerLogSinkPort for NoopLogSink {
    fn append(&self, _: &ModelKey, _: Option<u32>, _: OutputStream, _: LogRecord) {}
}
