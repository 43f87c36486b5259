//! obs-websocket event translation

use futures::{Stream, StreamExt};
use obws::events::{Event, OutputState};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::host::{HostEvent, ReplayBufferEvent, SignalKind};
use crate::sync::{DispatcherHandle, Task};

/// Map an obs-websocket event onto the host events the core understands.
/// Hook signals are only accepted from `hook_vendor`.
pub fn translate(event: Event, hook_vendor: &str) -> Option<HostEvent> {
    match event {
        Event::InputActiveStateChanged { id, active } => Some(HostEvent::Signal {
            source: id.name,
            signal: if active {
                SignalKind::Activate
            } else {
                SignalKind::Deactivate
            },
        }),
        Event::InputShowStateChanged { id, showing } => Some(HostEvent::Signal {
            source: id.name,
            signal: if showing {
                SignalKind::Show
            } else {
                SignalKind::Hide
            },
        }),
        Event::VendorEvent {
            vendor_name,
            event_type,
            event_data,
        } if vendor_name == hook_vendor => hook_signal(&event_type, &event_data),
        Event::CustomEvent(data) => {
            let vendor = data.get("vendor").and_then(Value::as_str)?;
            if vendor != hook_vendor {
                return None;
            }
            let event_type = data.get("eventType").and_then(Value::as_str)?;
            hook_signal(event_type, &data)
        }
        Event::ReplayBufferStateChanged { state, .. } => match state {
            OutputState::Started => Some(HostEvent::ReplayBuffer(ReplayBufferEvent::Started)),
            OutputState::Stopped => Some(HostEvent::ReplayBuffer(ReplayBufferEvent::Stopped)),
            _ => None,
        },
        Event::ReplayBufferSaved { path } => {
            Some(HostEvent::ReplayBuffer(ReplayBufferEvent::Saved { path }))
        }
        Event::InputRemoved { id } => Some(HostEvent::SourceRemoved { source: id.name }),
        Event::InputNameChanged {
            old_name, new_name, ..
        } => Some(HostEvent::SourceRenamed {
            from: old_name,
            to: new_name,
        }),
        Event::CurrentSceneCollectionChanged { name } => {
            Some(HostEvent::CollectionChanged { collection: name })
        }
        Event::ExitStarted => Some(HostEvent::HostExiting),
        _ => None,
    }
}

/// `hooked` / `unhooked` with a `sourceName` field
fn hook_signal(event_type: &str, data: &Value) -> Option<HostEvent> {
    let signal = SignalKind::from_name(event_type).filter(|signal| signal.is_hook())?;
    let source = data.get("sourceName").and_then(Value::as_str)?;
    Some(HostEvent::Signal {
        source: source.to_string(),
        signal,
    })
}

/// Forward translated events into the dispatcher until the stream ends,
/// then ask the engine to shut down
pub fn spawn_event_pump<S>(
    events: S,
    hook_vendor: String,
    dispatcher: DispatcherHandle,
) -> JoinHandle<()>
where
    S: Stream<Item = Event> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::pin!(events);

        while let Some(event) = events.next().await {
            let Some(host_event) = translate(event, &hook_vendor) else {
                continue;
            };
            debug!("Host event: {:?}", host_event);
            if !dispatcher.send(Task::Host(host_event)).await {
                // Engine gone
                return;
            }
        }

        info!("OBS event stream closed");
        dispatcher.send(Task::Shutdown).await;
    })
}
