//! Host interface
//!
//! The monitoring core talks to the host application (OBS) only through the
//! [`Host`] trait and only learns about the host through [`HostEvent`]s that
//! arrive on the dispatcher queue.

use anyhow::Result;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

/// Lifecycle signals a monitored source can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Capture source attached to its target (capture-class sources only)
    Hooked,
    /// Capture source detached from its target (capture-class sources only)
    Unhooked,
    /// Source became active in the program output
    Activate,
    /// Source left the program output
    Deactivate,
    /// Source became visible anywhere (preview, projector, program)
    Show,
    /// Source is no longer visible anywhere
    Hide,
}

impl SignalKind {
    pub const ALL: [SignalKind; 6] = [
        SignalKind::Hooked,
        SignalKind::Unhooked,
        SignalKind::Activate,
        SignalKind::Deactivate,
        SignalKind::Show,
        SignalKind::Hide,
    ];

    /// Hook signals only exist on capture-class sources
    pub fn is_hook(self) -> bool {
        matches!(self, SignalKind::Hooked | SignalKind::Unhooked)
    }

    /// Whether this signal means "the source is live"
    pub fn indicates_activity(self) -> bool {
        matches!(
            self,
            SignalKind::Hooked | SignalKind::Activate | SignalKind::Show
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Hooked => "hooked",
            SignalKind::Unhooked => "unhooked",
            SignalKind::Activate => "activate",
            SignalKind::Deactivate => "deactivate",
            SignalKind::Show => "show",
            SignalKind::Hide => "hide",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SignalKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A source as resolved by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    /// Unversioned input kind, e.g. `game_capture` or `image_source`
    pub kind: String,
}

/// Replay buffer lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayBufferEvent {
    Started,
    Stopped,
    Saved { path: PathBuf },
}

/// Everything the host can tell the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A source emitted a lifecycle signal
    Signal { source: String, signal: SignalKind },
    /// Replay buffer changed state or saved a clip
    ReplayBuffer(ReplayBufferEvent),
    /// A source was destroyed
    SourceRemoved { source: String },
    /// A source was renamed
    SourceRenamed { from: String, to: String },
    /// The active scene collection changed (all sources reloaded)
    CollectionChanged { collection: String },
    /// The host began shutting down
    HostExiting,
}

/// Queries and commands the core issues against the host
pub trait Host {
    /// Resolve a source by name. `Ok(None)` when the host has no such source.
    fn resolve_source(&self, name: &str) -> impl Future<Output = Result<Option<SourceInfo>>>;

    /// Start delivering the given signals for `source`
    fn bind_signals(&self, source: &str, signals: &[SignalKind]) -> impl Future<Output = Result<()>>;

    /// Stop delivering signals for `source`
    fn unbind_signals(&self, source: &str) -> impl Future<Output = Result<()>>;

    /// One-shot active/showing query. `Ok(None)` when the host cannot tell.
    fn query_activity(&self, source: &str) -> impl Future<Output = Result<Option<bool>>>;

    fn replay_buffer_active(&self) -> impl Future<Output = Result<bool>>;

    fn start_replay_buffer(&self) -> impl Future<Output = Result<()>>;

    fn stop_replay_buffer(&self) -> impl Future<Output = Result<()>>;
}
