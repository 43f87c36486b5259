//! Monitor engine
//!
//! The single consumer of the dispatcher queue. Owns the subscription, the
//! detection state and the replay controller, and is the only place any of
//! them change.

use std::ops::ControlFlow;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::MonitorError;
use crate::host::{Host, HostEvent, SignalKind};
use crate::monitor::{
    Action, DetectionState, Detector, MonitoredSource, Preference, RetryOutcome, RetryPolicy,
    RewireSupervisor, RewireTrigger, Route, SubscriptionManager, Transition,
};
use crate::replay::{LogConfirmation, ReplayController, SaveConfirmation};

use super::{DispatcherHandle, EngineStatus, Task, TaskQueue};

pub struct MonitorEngine<H: Host> {
    host: H,
    /// Preference the current subscription was built from
    preference: Preference,
    subscriptions: SubscriptionManager,
    detector: Detector,
    replay: ReplayController,
    supervisor: RewireSupervisor,
    queue: TaskQueue,
    /// Handed to retry timers so they re-enter the queue
    dispatcher: DispatcherHandle,
    status_tx: broadcast::Sender<EngineStatus>,
}

impl<H: Host> MonitorEngine<H> {
    pub fn new(
        host: H,
        config: &Config,
        queue: TaskQueue,
        dispatcher: DispatcherHandle,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        Self {
            host,
            preference: config.preference(),
            subscriptions: SubscriptionManager::new(config.monitor.hook_capable_kinds.clone()),
            detector: Detector::new(),
            replay: ReplayController::new(Box::new(LogConfirmation)),
            supervisor: RewireSupervisor::new(RetryPolicy::from(&config.rewire)),
            queue,
            dispatcher,
            status_tx,
        }
    }

    /// Replace the save confirmation hook (defaults to logging the path)
    pub fn with_confirmation(mut self, confirmation: Box<dyn SaveConfirmation>) -> Self {
        self.replay = ReplayController::new(confirmation);
        self
    }

    /// Queue the startup rewire, then drain the queue until shutdown
    pub async fn run(&mut self) {
        info!("Monitor engine starting");

        self.dispatcher
            .send(Task::Rewire(RewireTrigger::Startup))
            .await;

        while let Some(task) = self.queue.next().await {
            if self.handle(task).await.is_break() {
                break;
            }
        }

        self.shutdown().await;
        info!("Monitor engine stopped");
    }

    /// Process one task to completion
    async fn handle(&mut self, task: Task) -> ControlFlow<()> {
        match task {
            Task::Host(event) => self.on_host_event(event).await,
            Task::Reconfigure(preference) => {
                if preference == self.preference {
                    debug!("Preference unchanged, not rewiring");
                } else {
                    info!(
                        "Monitored source set to '{}' (prefer hook signals: {})",
                        preference.source_name, preference.prefer_hook_signals
                    );
                    self.preference = preference;
                    self.rewire(RewireTrigger::PreferenceChanged).await;
                }
            }
            Task::Rewire(trigger) => self.rewire(trigger).await,
            Task::Retry { episode } => {
                if self.supervisor.accepts(episode) {
                    self.attempt_subscribe().await;
                } else {
                    debug!("Dropping stale retry for rewire episode {}", episode);
                }
            }
            Task::Shutdown => {
                info!("Shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Signal { source, signal } => self.on_signal(&source, signal).await,
            HostEvent::ReplayBuffer(event) => self.replay.on_event(&event),
            HostEvent::SourceRemoved { source } => {
                if self.subscriptions.is_bound_to(&source) {
                    warn!("Monitored source '{}' was removed", source);
                    self.disconnect().await;
                }
            }
            HostEvent::SourceRenamed { from, to } => {
                if self.subscriptions.is_bound_to(&from) {
                    warn!("Monitored source '{}' was renamed to '{}'", from, to);
                    self.disconnect().await;
                }
            }
            HostEvent::CollectionChanged { collection } => {
                info!("Scene collection changed to '{}'", collection);
                self.rewire(RewireTrigger::CollectionChanged).await;
            }
            HostEvent::HostExiting => {
                info!("OBS is exiting");
                self.supervisor.abandon();
                self.disconnect().await;
            }
        }
    }

    async fn on_signal(&mut self, source: &str, signal: SignalKind) {
        match self.subscriptions.route(source, signal) {
            None => {}
            Some(Route::Observed) => {
                debug!("'{}' {} (not authoritative, ignored)", source, signal);
            }
            Some(Route::Authoritative) => {
                debug!("'{}' {}", source, signal);
                if let Some(transition) = self.detector.apply(signal) {
                    self.on_transition(transition).await;
                }
            }
        }
    }

    async fn on_transition(&mut self, transition: Transition) {
        let source = self
            .subscriptions
            .current()
            .map(|source| source.name.clone())
            .unwrap_or_default();
        info!(
            "'{}' is now {:?} (was {:?})",
            source, transition.to, transition.from
        );
        self.publish(EngineStatus::Monitoring {
            source,
            state: transition.to,
        });

        if let Some(action) = transition.action() {
            self.issue(action).await;
        }
    }

    /// Failures are logged; detection state follows the source, not the host
    async fn issue(&self, action: Action) {
        let result = match action {
            Action::Start => self.replay.start(&self.host).await,
            Action::Stop => self.replay.stop(&self.host).await,
        };
        if let Err(e) = result {
            error!("{}", e);
        }
    }

    /// Start a new episode: tear down, reset, and try to subscribe again
    async fn rewire(&mut self, trigger: RewireTrigger) {
        info!("Rewiring monitored source ({})", trigger);
        self.supervisor.begin(trigger);
        self.disconnect().await;

        if self.preference.source_name.is_empty() {
            info!("No source configured, Replay Buffer will not be managed");
            self.supervisor.abandon();
            return;
        }

        self.attempt_subscribe().await;
    }

    async fn attempt_subscribe(&mut self) {
        let attempt = self.supervisor.next_attempt();
        let name = self.preference.source_name.clone();
        debug!(
            "Subscribing to '{}' (attempt {}/{})",
            name,
            attempt,
            self.supervisor.policy().max_attempts
        );

        match self
            .subscriptions
            .subscribe(&self.host, &self.preference)
            .await
        {
            Ok(source) => {
                let attempts = self.supervisor.succeed();
                if attempts > 1 {
                    info!("Subscribed to '{}' after {} attempts", name, attempts);
                }
                self.publish(EngineStatus::Monitoring {
                    source: name,
                    state: self.detector.state(),
                });
                self.initial_sync(&source).await;
            }
            Err(e) if e.is_retryable() => match self.supervisor.fail(&self.dispatcher) {
                RetryOutcome::Scheduled { attempt, delay } => {
                    warn!("{}, retrying in {:?}", e, delay);
                    self.publish(EngineStatus::WaitingForSource { name, attempt });
                }
                RetryOutcome::Exhausted { attempts } => {
                    debug!("Last attempt failed: {}", e);
                    let exhausted = MonitorError::SubscriptionExhausted {
                        name: name.clone(),
                        attempts,
                    };
                    error!("{}", exhausted);
                    self.publish(EngineStatus::Exhausted { name });
                }
            },
            Err(e) => {
                error!("{}", e);
                self.supervisor.abandon();
                self.publish(EngineStatus::Unmonitored);
            }
        }
    }

    /// One-time state query for sources driven by generic signals. Hook
    /// driven sources wait for their first authoritative signal.
    async fn initial_sync(&mut self, source: &MonitoredSource) {
        if self.subscriptions.hook_driven() {
            info!("Waiting for '{}' to hook", source.name);
            return;
        }

        match self.host.query_activity(&source.name).await {
            Ok(Some(active)) => {
                if let Some(transition) = self.detector.sync(active) {
                    self.on_transition(transition).await;
                }
            }
            Ok(None) => debug!("Activity of '{}' unknown, waiting for signals", source.name),
            Err(e) => warn!("Failed to query activity of '{}': {:#}", source.name, e),
        }
    }

    /// Release the subscription and forget the detection state. Losing an
    /// active source counts as losing activity.
    async fn disconnect(&mut self) {
        let released = self.subscriptions.unsubscribe(&self.host).await;
        let previous = self.detector.reset();

        if previous == DetectionState::Active {
            self.issue(Action::Stop).await;
        }
        if released.is_some() {
            self.publish(EngineStatus::Unmonitored);
        }
    }

    async fn shutdown(&mut self) {
        if self.supervisor.has_pending() {
            debug!("Cancelling pending subscribe retry");
        }
        self.supervisor.abandon();
        self.subscriptions.unsubscribe(&self.host).await;
        self.detector.reset();

        let discarded = self.queue.close_and_discard();
        if discarded > 0 {
            debug!("Discarded {} queued tasks", discarded);
        }
        if self.dispatcher.dropped() > 0 {
            warn!(
                "{} tasks were dropped on a full queue",
                self.dispatcher.dropped()
            );
        }
        info!("{} replays saved this session", self.replay.saves());
        self.publish(EngineStatus::Stopped);
    }

    fn publish(&self, status: EngineStatus) {
        let _ = self.status_tx.send(status);
    }
}

/// Status channel for observers of the engine
pub fn create_status_channel() -> (
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    broadcast::channel(16)
}
