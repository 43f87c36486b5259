//! OBS WebSocket controller implementation

use anyhow::{Context, Result};
use futures::Stream;
use obws::events::Event;
use obws::requests::EventSubscription;
use obws::Client;
use tracing::{debug, info};

use crate::config::ObsConfig;
use crate::host::{Host, SignalKind, SourceInfo};

/// Controller for OBS WebSocket communication
pub struct ObsController {
    client: Client,
}

impl ObsController {
    /// Connect to obs-websocket
    pub async fn connect(config: &ObsConfig) -> Result<Self> {
        let client = Client::connect(&config.host, config.port, config.password.as_deref())
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to OBS WebSocket at {}:{}",
                    config.host, config.port
                )
            })?;

        let version = client.general().version().await?;
        info!(
            "Connected to OBS {} (obs-websocket {})",
            version.obs_version, version.obs_web_socket_version
        );

        Ok(Self { client })
    }

    /// Raw event stream; ends when the connection closes
    pub fn events(&self) -> Result<impl Stream<Item = Event>> {
        self.client
            .events()
            .context("Failed to subscribe to OBS events")
    }

    /// Every input in the current scene collection
    pub async fn list_sources(&self) -> Result<Vec<SourceInfo>> {
        let inputs = self
            .client
            .inputs()
            .list(None)
            .await
            .context("Failed to list OBS inputs")?;

        Ok(inputs
            .into_iter()
            .map(|input| SourceInfo {
                name: input.id.name,
                kind: input.unversioned_kind,
            })
            .collect())
    }
}

/// The default subscription plus the high-volume input events `signals` needs
fn subscription_for(signals: &[SignalKind]) -> EventSubscription {
    let mut subscription = EventSubscription::ALL;
    if signals
        .iter()
        .any(|s| matches!(s, SignalKind::Activate | SignalKind::Deactivate))
    {
        subscription |= EventSubscription::INPUT_ACTIVE_STATE_CHANGED;
    }
    if signals
        .iter()
        .any(|s| matches!(s, SignalKind::Show | SignalKind::Hide))
    {
        subscription |= EventSubscription::INPUT_SHOW_STATE_CHANGED;
    }
    subscription
}

impl Host for ObsController {
    async fn resolve_source(&self, name: &str) -> Result<Option<SourceInfo>> {
        let sources = self.list_sources().await?;
        Ok(sources.into_iter().find(|source| source.name == name))
    }

    async fn bind_signals(&self, source: &str, signals: &[SignalKind]) -> Result<()> {
        // Hook signals come through vendor events, which the default set covers
        self.client
            .reidentify(subscription_for(signals))
            .await
            .with_context(|| format!("Failed to subscribe to signals for '{}'", source))?;
        debug!("Subscribed to {:?} for '{}'", signals, source);
        Ok(())
    }

    async fn unbind_signals(&self, source: &str) -> Result<()> {
        self.client
            .reidentify(EventSubscription::ALL)
            .await
            .with_context(|| format!("Failed to unsubscribe signals for '{}'", source))?;
        debug!("Unsubscribed signals for '{}'", source);
        Ok(())
    }

    async fn query_activity(&self, source: &str) -> Result<Option<bool>> {
        let status = self
            .client
            .sources()
            .active(source.into())
            .await
            .with_context(|| format!("Failed to query activity of '{}'", source))?;
        Ok(Some(status.active || status.showing))
    }

    async fn replay_buffer_active(&self) -> Result<bool> {
        self.client
            .replay_buffer()
            .status()
            .await
            .context("Failed to query Replay Buffer status")
    }

    async fn start_replay_buffer(&self) -> Result<()> {
        self.client
            .replay_buffer()
            .start()
            .await
            .context("Failed to start Replay Buffer")
    }

    async fn stop_replay_buffer(&self) -> Result<()> {
        self.client
            .replay_buffer()
            .stop()
            .await
            .context("Failed to stop Replay Buffer")
    }
}
