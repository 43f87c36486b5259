//! Error taxonomy for the monitoring core
//!
//! Nothing in here is fatal to the process. Every variant degrades to
//! "currently unmonitored" or to a logged, skipped host command.

use std::fmt;

/// Host command that the replay controller issues or gates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Query whether the replay buffer is running
    Status,
    /// Start the replay buffer
    Start,
    /// Stop the replay buffer
    Stop,
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCommand::Status => write!(f, "replay buffer status"),
            HostCommand::Start => write!(f, "replay buffer start"),
            HostCommand::Stop => write!(f, "replay buffer stop"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The host could not resolve the configured source name
    #[error("source '{name}' not found")]
    SourceNotFound { name: String },

    /// Transport failure while resolving or binding a source
    #[error("host unavailable: {source}")]
    HostUnavailable {
        #[source]
        source: anyhow::Error,
    },

    /// The host rejected a replay buffer command
    #[error("{command} failed: {source}")]
    HostCommandFailure {
        command: HostCommand,
        #[source]
        source: anyhow::Error,
    },

    /// Retry budget spent without a successful subscription
    #[error("gave up subscribing to '{name}' after {attempts} attempts")]
    SubscriptionExhausted { name: String, attempts: u32 },
}

impl MonitorError {
    /// Whether the rewire supervisor should schedule another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MonitorError::SourceNotFound { .. } | MonitorError::HostUnavailable { .. }
        )
    }
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
