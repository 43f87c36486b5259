//! Source monitoring core
//!
//! Turns the lifecycle signals of one monitored source into a two-valued
//! activity state. Split into the subscription manager (what is bound and
//! how each signal is interpreted), the detection state machine, and the
//! rewire supervisor that re-establishes the subscription with bounded
//! retries.

mod detection;
mod rewire;
mod subscription;

pub use detection::{Action, DetectionState, Detector, Transition};
pub use rewire::{RetryOutcome, RetryPolicy, RewireSupervisor, RewireTrigger};
pub use subscription::{Route, SubscriptionManager};

use crate::host::SourceInfo;

/// The source currently being monitored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredSource {
    pub name: String,
    pub kind: String,
    /// Capture-class sources emit `hooked`/`unhooked`
    pub supports_hook_signals: bool,
}

impl MonitoredSource {
    pub fn from_info(info: SourceInfo, hook_capable_kinds: &[String]) -> Self {
        let supports_hook_signals = hook_capable_kinds.iter().any(|kind| *kind == info.kind);
        Self {
            name: info.name,
            kind: info.kind,
            supports_hook_signals,
        }
    }

    /// Hook signals are authoritative only when the source has them and the
    /// user prefers them
    pub fn hook_driven(&self, prefer_hook_signals: bool) -> bool {
        self.supports_hook_signals && prefer_hook_signals
    }
}

/// User preference consumed read-only by the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    /// Name of the source to monitor; empty means "none selected"
    pub source_name: String,
    pub prefer_hook_signals: bool,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            source_name: String::new(),
            prefer_hook_signals: true,
        }
    }
}
