//! Rewire supervisor
//!
//! Tracks one reconnection episode at a time. A failed subscribe schedules a
//! single-shot retry that re-enters the dispatcher queue as
//! [`Task::Retry`]; a new episode, a success or a shutdown cancels it.

use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::RewireConfig;
use crate::sync::{DispatcherHandle, Task};

/// What started a rewire episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewireTrigger {
    /// Engine start / host load
    Startup,
    /// Active scene collection changed
    CollectionChanged,
    /// Monitored source name or hook preference changed
    PreferenceChanged,
}

impl fmt::Display for RewireTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewireTrigger::Startup => write!(f, "startup"),
            RewireTrigger::CollectionChanged => write!(f, "scene collection changed"),
            RewireTrigger::PreferenceChanged => write!(f, "preference changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&RewireConfig> for RetryPolicy {
    fn from(config: &RewireConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Result of reporting a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Scheduled { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

#[derive(Debug)]
struct RetryState {
    attempt: u32,
}

#[derive(Debug)]
pub struct RewireSupervisor {
    policy: RetryPolicy,
    episode: u64,
    retry: Option<RetryState>,
    pending: Option<JoinHandle<()>>,
}

impl RewireSupervisor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            episode: 0,
            retry: None,
            pending: None,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start a new episode, cancelling whatever the previous one scheduled
    pub fn begin(&mut self, trigger: RewireTrigger) -> u64 {
        self.cancel_pending();
        self.episode += 1;
        self.retry = Some(RetryState { attempt: 0 });
        debug!("Rewire episode {} started ({})", self.episode, trigger);
        self.episode
    }

    /// Whether a scheduled retry still belongs to the live episode
    pub fn accepts(&self, episode: u64) -> bool {
        self.retry.is_some() && episode == self.episode
    }

    /// Count the attempt about to be made
    pub fn next_attempt(&mut self) -> u32 {
        let retry = self.retry.get_or_insert(RetryState { attempt: 0 });
        retry.attempt += 1;
        retry.attempt
    }

    /// The subscription succeeded; returns how many attempts it took
    pub fn succeed(&mut self) -> u32 {
        self.cancel_pending();
        self.retry.take().map(|retry| retry.attempt).unwrap_or(0)
    }

    /// The last attempt failed: schedule another one or give up
    pub fn fail(&mut self, dispatcher: &DispatcherHandle) -> RetryOutcome {
        let attempts = self.retry.as_ref().map(|retry| retry.attempt).unwrap_or(0);

        if attempts >= self.policy.max_attempts || self.retry.is_none() {
            self.cancel_pending();
            self.retry = None;
            return RetryOutcome::Exhausted { attempts };
        }

        self.cancel_pending();
        let delay = self.policy.delay;
        let episode = self.episode;
        let dispatcher = dispatcher.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            dispatcher.send(Task::Retry { episode }).await;
        }));

        RetryOutcome::Scheduled {
            attempt: attempts + 1,
            delay,
        }
    }

    /// Drop the current episode without a result
    pub fn abandon(&mut self) {
        self.cancel_pending();
        self.retry = None;
    }

    /// Whether a retry timer is still armed
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for RewireSupervisor {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
