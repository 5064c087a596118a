//! Resident-memory aggregation across supervised servers.
//!
//! `memory_usage` is a best-effort monitoring signal: a failed OS query is
//! logged and reported as `0`, never as an error.

use async_trait::async_trait;
use llamactl_core::ports::{ProcessStatsPort, ResidentMemory};
use llamactl_core::ResourceQueryError;
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// `ProcessStatsPort` backed by `sysinfo`.
///
/// The refresh runs on the blocking pool; it reads `/proc` on Linux and can
/// take a noticeable amount of time with many processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoStats;

#[async_trait]
impl ProcessStatsPort for SysinfoStats {
    async fn resident_memory(&self, pids: &[u32]) -> Result<ResidentMemory, ResourceQueryError> {
        let pids = pids.to_vec();
        tokio::task::spawn_blocking(move || {
            let targets: Vec<Pid> = pids.iter().copied().map(Pid::from_u32).collect();
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::Some(&targets), true);

            pids.iter()
                .filter_map(|pid| {
                    system
                        .process(Pid::from_u32(*pid))
                        .map(|process| (*pid, process.memory()))
                })
                .collect()
        })
        .await
        .map_err(|e| ResourceQueryError(e.to_string()))
    }
}

/// Aggregates resident memory for a set of PIDs.
#[derive(Clone)]
pub struct ResourceMonitor {
    stats: Arc<dyn ProcessStatsPort>,
}

impl ResourceMonitor {
    pub fn new(stats: Arc<dyn ProcessStatsPort>) -> Self {
        Self { stats }
    }

    /// Sum of resident memory in bytes, or `0` if the query fails.
    pub async fn memory_usage(&self, pids: &[u32]) -> u64 {
        if pids.is_empty() {
            return 0;
        }

        match self.stats.resident_memory(pids).await {
            Ok(usage) => {
                let total: u64 = usage.values().sum();
                debug!(processes = usage.len(), total_bytes = total, "Aggregated resident memory");
                total
            }
            Err(e) => {
                warn!(error = %e, "Memory usage query failed, reporting 0");
                0
            }
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new(Arc::new(SysinfoStats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Stats {}

        #[async_trait]
        impl ProcessStatsPort for Stats {
            async fn resident_memory(&self, pids: &[u32]) -> Result<ResidentMemory, ResourceQueryError>;
        }
    }

    #[tokio::test]
    async fn test_empty_pid_list_skips_query() {
        let mut stats = MockStats::new();
        stats.expect_resident_memory().never();

        let monitor = ResourceMonitor::new(Arc::new(stats));
        assert_eq!(monitor.memory_usage(&[]).await, 0);
    }

    #[tokio::test]
    async fn test_sums_all_entries() {
        let mut stats = MockStats::new();
        stats
            .expect_resident_memory()
            .withf(|pids| pids == [10, 20, 30])
            .times(1)
            .returning(|_| Ok(ResidentMemory::from([(10, 1_000), (20, 2_500)])));

        let monitor = ResourceMonitor::new(Arc::new(stats));
        // PID 30 is gone; it simply does not contribute
        assert_eq!(monitor.memory_usage(&[10, 20, 30]).await, 3_500);
    }

    #[tokio::test]
    async fn test_query_failure_reports_zero() {
        let mut stats = MockStats::new();
        stats
            .expect_resident_memory()
            .times(1)
            .returning(|_| Err(ResourceQueryError("permission denied".to_string())));

        let monitor = ResourceMonitor::new(Arc::new(stats));
        assert_eq!(monitor.memory_usage(&[42]).await, 0);
    }

    #[tokio::test]
    async fn test_sysinfo_reports_own_process() {
        let pid = std::process::id();
        let usage = SysinfoStats.resident_memory(&[pid]).await.unwrap();
        assert!(usage.get(&pid).copied().unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn test_sysinfo_omits_unknown_pids() {
        let usage = SysinfoStats.resident_memory(&[u32::MAX - 1]).await.unwrap();
        assert!(usage.is_empty());
    }
}
