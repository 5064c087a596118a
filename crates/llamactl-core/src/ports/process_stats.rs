//! Process statistics port.
//!
//! Abstracts the OS query behind `memory_usage`, so the aggregation logic can
//! be exercised without real processes and OS failures can be simulated.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::ResourceQueryError;

/// Resident memory in bytes, keyed by PID.
pub type ResidentMemory = HashMap<u32, u64>;

/// Port for batched OS process statistics.
#[async_trait]
pub trait ProcessStatsPort: Send + Sync {
    /// Query resident memory for all `pids` in one batch.
    ///
    /// PIDs the OS no longer knows are omitted from the result rather than
    /// reported as zero.
    async fn resident_memory(&self, pids: &[u32]) -> Result<ResidentMemory, ResourceQueryError>;
}
