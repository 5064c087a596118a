//! Readiness detection on server stdout.

use llamactl_core::StructuredLog;

/// Watches output for the readiness record and fires at most once.
#[derive(Debug, Default)]
pub struct ReadinessDetector {
    fired: bool,
}

impl ReadinessDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of output. A chunk may hold any number of lines.
    ///
    /// Returns true exactly once: for the chunk containing the first
    /// readiness record. Lines that fail to parse are ignored here; the
    /// output logger reports them.
    pub fn observe(&mut self, chunk: &str) -> bool {
        if self.fired {
            return false;
        }

        let found = chunk
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| StructuredLog::parse(line).ok())
            .any(|record| record.is_readiness_marker());

        if found {
            self.fired = true;
        }
        found
    }

    pub const fn has_fired(&self) -> bool {
        self.fired
    }
}
