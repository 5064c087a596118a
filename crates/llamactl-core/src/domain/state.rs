//! Lifecycle state machine of a supervised process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a managed server process.
///
/// ```text
/// Spawning ──► Ready ──► Running ──► Terminating ──► Terminated
///    │           │                        ▲
///    │           └────────────────────────┤
///    ├────────────────────────────────────┘
///    └──────────────────────────────────────────────► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Spawned, readiness marker not seen yet.
    Spawning,
    /// Readiness marker seen; launch resolved.
    Ready,
    /// Serving requests routed by the supervisor.
    Running,
    /// Termination requested, exit not observed yet.
    Terminating,
    /// Exit observed.
    Terminated,
}

impl ProcessState {
    /// Whether `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ProcessState::{Ready, Running, Spawning, Terminated, Terminating};
        matches!(
            (self, next),
            (Spawning, Ready | Terminating | Terminated)
                | (Ready, Running | Terminating | Terminated)
                | (Running, Terminating | Terminated)
                | (Terminating, Terminated)
        )
    }

    /// Whether the server can accept client requests.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Whether this is the final state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Spawning => "spawning",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}
