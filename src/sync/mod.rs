//! Synchronization engine - serializes host events, reconfiguration and
//! retries onto one consumer that owns all monitoring state

mod dispatcher;
mod engine;

pub use dispatcher::{dispatcher_channel, DispatcherHandle, TaskQueue};
pub use engine::{create_status_channel, MonitorEngine};

use crate::host::HostEvent;
use crate::monitor::{DetectionState, Preference, RewireTrigger};

/// Work items drained by the engine in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Something happened in the host
    Host(HostEvent),
    /// New preference from the configuration surface
    Reconfigure(Preference),
    /// Tear down and re-establish the subscription
    Rewire(RewireTrigger),
    /// Scheduled retry for a rewire episode
    Retry { episode: u64 },
    /// Stop the engine
    Shutdown,
}

/// Status updates from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// No source bound
    Unmonitored,
    /// Subscription failed, retry scheduled
    WaitingForSource { name: String, attempt: u32 },
    /// Bound and tracking
    Monitoring {
        source: String,
        state: DetectionState,
    },
    /// Retry budget spent for the current episode
    Exhausted { name: String },
    /// Engine stopped
    Stopped,
}
