//! Signal subscription manager
//!
//! Owns the binding to exactly one monitored source. A binding is a typed
//! handler table: for every [`SignalKind`] it records whether the signal is
//! bound at all and whether it drives detection or is only observed.

use tracing::{debug, info, warn};

use crate::error::{MonitorError, MonitorResult};
use crate::host::{Host, SignalKind};

use super::{MonitoredSource, Preference};

/// How a bound signal is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Drives detection state transitions
    Authoritative,
    /// Received and logged, never changes state
    Observed,
}

/// Handler table keyed by signal kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerTable {
    routes: [Option<Route>; SignalKind::ALL.len()],
}

impl HandlerTable {
    /// Build the table for a source. Generic signals are always bound; hook
    /// signals are bound only when they are authoritative.
    pub fn for_source(source: &MonitoredSource, prefer_hook_signals: bool) -> Self {
        let hook_driven = source.hook_driven(prefer_hook_signals);
        let mut routes = [None; SignalKind::ALL.len()];

        for kind in SignalKind::ALL {
            routes[kind as usize] = match (kind.is_hook(), hook_driven) {
                (true, true) => Some(Route::Authoritative),
                (true, false) => None,
                (false, true) => Some(Route::Observed),
                (false, false) => Some(Route::Authoritative),
            };
        }

        Self { routes }
    }

    pub fn route(&self, kind: SignalKind) -> Option<Route> {
        self.routes[kind as usize]
    }

    /// Every bound signal, in declaration order
    pub fn signals(&self) -> Vec<SignalKind> {
        SignalKind::ALL
            .into_iter()
            .filter(|kind| self.route(*kind).is_some())
            .collect()
    }

    /// Whether hook signals are the authoritative ones
    pub fn hook_driven(&self) -> bool {
        self.route(SignalKind::Hooked) == Some(Route::Authoritative)
    }
}

#[derive(Debug)]
struct Subscription {
    source: MonitoredSource,
    handlers: HandlerTable,
}

/// Binds and releases the monitored source
#[derive(Debug)]
pub struct SubscriptionManager {
    hook_capable_kinds: Vec<String>,
    current: Option<Subscription>,
}

impl SubscriptionManager {
    pub fn new(hook_capable_kinds: Vec<String>) -> Self {
        Self {
            hook_capable_kinds,
            current: None,
        }
    }

    /// Bind the source named in `preference`, replacing any existing binding.
    ///
    /// On failure nothing is left bound.
    pub async fn subscribe<H: Host>(
        &mut self,
        host: &H,
        preference: &Preference,
    ) -> MonitorResult<MonitoredSource> {
        self.unsubscribe(host).await;

        let name = preference.source_name.as_str();
        if name.is_empty() {
            return Err(MonitorError::SourceNotFound {
                name: String::new(),
            });
        }

        let info = host
            .resolve_source(name)
            .await
            .map_err(|source| MonitorError::HostUnavailable { source })?
            .ok_or_else(|| MonitorError::SourceNotFound {
                name: name.to_string(),
            })?;

        let source = MonitoredSource::from_info(info, &self.hook_capable_kinds);
        let handlers = HandlerTable::for_source(&source, preference.prefer_hook_signals);
        let signals = handlers.signals();

        host.bind_signals(&source.name, &signals)
            .await
            .map_err(|source| MonitorError::HostUnavailable { source })?;

        info!(
            "Connected to source '{}' (kind: {}, hook signals: {})",
            source.name,
            source.kind,
            if handlers.hook_driven() {
                "authoritative"
            } else {
                "unused"
            }
        );
        debug!("Bound signals for '{}': {:?}", source.name, signals);

        self.current = Some(Subscription {
            source: source.clone(),
            handlers,
        });
        Ok(source)
    }

    /// Release the current binding, if any. Always leaves the manager empty.
    pub async fn unsubscribe<H: Host>(&mut self, host: &H) -> Option<MonitoredSource> {
        let subscription = self.current.take()?;

        if let Err(e) = host.unbind_signals(&subscription.source.name).await {
            warn!(
                "Failed to release signals for '{}': {}",
                subscription.source.name, e
            );
        }
        info!("Disconnected from source '{}'", subscription.source.name);

        Some(subscription.source)
    }

    /// How a signal from `source` should be handled, or `None` if it is not
    /// bound for the monitored source
    pub fn route(&self, source: &str, kind: SignalKind) -> Option<Route> {
        self.current
            .as_ref()
            .filter(|subscription| subscription.source.name == source)
            .and_then(|subscription| subscription.handlers.route(kind))
    }

    pub fn current(&self) -> Option<&MonitoredSource> {
        self.current.as_ref().map(|subscription| &subscription.source)
    }

    pub fn is_bound_to(&self, source: &str) -> bool {
        self.current().is_some_and(|current| current.name == source)
    }

    pub fn hook_driven(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|subscription| subscription.handlers.hook_driven())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    fn manager() -> SubscriptionManager {
        SubscriptionManager::new(vec!["game_capture".to_string()])
    }

    fn preference(name: &str, prefer_hooks: bool) -> Preference {
        Preference {
            source_name: name.to_string(),
            prefer_hook_signals: prefer_hooks,
        }
    }

    #[test]
    fn test_hook_driven_table() {
        let source = MonitoredSource {
            name: "Game".into(),
            kind: "game_capture".into(),
            supports_hook_signals: true,
        };
        let table = HandlerTable::for_source(&source, true);

        assert_eq!(table.route(SignalKind::Hooked), Some(Route::Authoritative));
        assert_eq!(table.route(SignalKind::Unhooked), Some(Route::Authoritative));
        assert_eq!(table.route(SignalKind::Activate), Some(Route::Observed));
        assert_eq!(table.route(SignalKind::Hide), Some(Route::Observed));
        assert_eq!(table.signals().len(), 6);
        assert!(table.hook_driven());
    }

    #[test]
    fn test_generic_table_when_hooks_not_preferred() {
        let source = MonitoredSource {
            name: "Game".into(),
            kind: "game_capture".into(),
            supports_hook_signals: true,
        };
        let table = HandlerTable::for_source(&source, false);

        assert_eq!(table.route(SignalKind::Hooked), None);
        assert_eq!(table.route(SignalKind::Show), Some(Route::Authoritative));
        assert_eq!(
            table.signals(),
            vec![
                SignalKind::Activate,
                SignalKind::Deactivate,
                SignalKind::Show,
                SignalKind::Hide
            ]
        );
        assert!(!table.hook_driven());
    }

    #[tokio::test]
    async fn test_subscribe_missing_source_leaves_nothing_bound() {
        let host = MockHost::new();
        let mut manager = manager();

        let err = manager
            .subscribe(&host, &preference("Game", true))
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::SourceNotFound { ref name } if name == "Game"));
        assert!(manager.current().is_none());
        assert!(host.state().bind_calls.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_bind_error_leaves_nothing_bound() {
        let host = MockHost::new().with_source("Game", "game_capture");
        host.state().fail_binds = 1;
        let mut manager = manager();

        let err = manager
            .subscribe(&host, &preference("Game", true))
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::HostUnavailable { .. }));
        assert!(err.is_retryable());
        assert!(manager.current().is_none());
        assert_eq!(manager.route("Game", SignalKind::Hooked), None);
        let state = host.state();
        assert_eq!(state.bind_calls.len(), 1);
        assert_eq!(state.bound, None);
    }

    #[tokio::test]
    async fn test_subscribe_resolve_error_is_host_unavailable() {
        let host = MockHost::new().with_source("Game", "game_capture");
        host.state().fail_resolves = 1;
        let mut manager = manager();

        let err = manager
            .subscribe(&host, &preference("Game", true))
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::HostUnavailable { .. }));
        assert!(manager.current().is_none());
        assert!(host.state().bind_calls.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_replaces_previous_binding() {
        let host = MockHost::new()
            .with_source("Game", "game_capture")
            .with_source("Slides", "image_source");
        let mut manager = manager();

        manager
            .subscribe(&host, &preference("Game", true))
            .await
            .unwrap();
        let slides = manager
            .subscribe(&host, &preference("Slides", true))
            .await
            .unwrap();

        assert!(!slides.supports_hook_signals);
        assert!(manager.is_bound_to("Slides"));
        assert!(!manager.is_bound_to("Game"));

        let state = host.state();
        assert_eq!(state.unbind_calls, vec!["Game".to_string()]);
        assert_eq!(state.bound.as_deref(), Some("Slides"));
    }

    #[tokio::test]
    async fn test_routes_only_for_bound_source() {
        let host = MockHost::new().with_source("Game", "game_capture");
        let mut manager = manager();
        manager
            .subscribe(&host, &preference("Game", true))
            .await
            .unwrap();

        assert_eq!(
            manager.route("Game", SignalKind::Hooked),
            Some(Route::Authoritative)
        );
        assert_eq!(manager.route("Other", SignalKind::Hooked), None);
        assert!(manager.hook_driven());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_noop_when_unbound() {
        let host = MockHost::new();
        let mut manager = manager();

        assert!(manager.unsubscribe(&host).await.is_none());
        assert!(host.state().unbind_calls.is_empty());
    }
}
