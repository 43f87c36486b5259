//! Replay controller
//!
//! Issues start/stop against the host Replay Buffer, gated on the status the
//! host reports right before the command. Failures are returned to the
//! caller for logging and never feed back into detection state.

mod confirm;

pub use confirm::{from_config as confirmation_from_config, LogConfirmation, SaveConfirmation};

use tracing::{debug, info};

use crate::error::{HostCommand, MonitorError, MonitorResult};
use crate::host::{Host, ReplayBufferEvent};

/// What a start/stop call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command was sent to the host
    Issued,
    /// The host already was in the requested state
    AlreadyInState,
}

pub struct ReplayController {
    confirmation: Box<dyn SaveConfirmation>,
    saves: u64,
}

impl ReplayController {
    pub fn new(confirmation: Box<dyn SaveConfirmation>) -> Self {
        Self {
            confirmation,
            saves: 0,
        }
    }

    /// Start the replay buffer unless the host reports it running
    pub async fn start<H: Host>(&self, host: &H) -> MonitorResult<CommandOutcome> {
        if self.host_running(host).await? {
            debug!("Replay Buffer already running, not starting");
            return Ok(CommandOutcome::AlreadyInState);
        }

        host.start_replay_buffer()
            .await
            .map_err(|source| MonitorError::HostCommandFailure {
                command: HostCommand::Start,
                source,
            })?;
        info!("Replay Buffer: start requested");
        Ok(CommandOutcome::Issued)
    }

    /// Stop the replay buffer unless the host reports it stopped
    pub async fn stop<H: Host>(&self, host: &H) -> MonitorResult<CommandOutcome> {
        if !self.host_running(host).await? {
            debug!("Replay Buffer not running, not stopping");
            return Ok(CommandOutcome::AlreadyInState);
        }

        host.stop_replay_buffer()
            .await
            .map_err(|source| MonitorError::HostCommandFailure {
                command: HostCommand::Stop,
                source,
            })?;
        info!("Replay Buffer: stop requested");
        Ok(CommandOutcome::Issued)
    }

    /// Host-side replay buffer notifications
    pub fn on_event(&mut self, event: &ReplayBufferEvent) {
        match event {
            ReplayBufferEvent::Started => debug!("Replay Buffer reported started"),
            ReplayBufferEvent::Stopped => debug!("Replay Buffer reported stopped"),
            ReplayBufferEvent::Saved { path } => {
                self.saves += 1;
                debug!("Replay Buffer reported saved: {:?}", path);
                self.confirmation.confirm(path);
            }
        }
    }

    /// Replays saved since the controller was created
    pub fn saves(&self) -> u64 {
        self.saves
    }

    async fn host_running<H: Host>(&self, host: &H) -> MonitorResult<bool> {
        host.replay_buffer_active()
            .await
            .map_err(|source| MonitorError::HostCommandFailure {
                command: HostCommand::Status,
                source,
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// Confirmation hook that remembers every saved path
    #[derive(Clone, Default)]
    pub(crate) struct RecordingConfirmation {
        pub paths: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl SaveConfirmation for RecordingConfirmation {
        fn confirm(&self, path: &Path) {
            self.paths.lock().unwrap().push(path.to_path_buf());
        }
    }

    #[tokio::test]
    async fn test_start_is_gated_on_host_status() {
        let host = MockHost::new();
        let replay = ReplayController::new(Box::new(LogConfirmation));

        assert_eq!(replay.start(&host).await.unwrap(), CommandOutcome::Issued);
        assert_eq!(
            replay.start(&host).await.unwrap(),
            CommandOutcome::AlreadyInState
        );
        assert_eq!(host.state().starts, 1);
    }

    #[tokio::test]
    async fn test_stop_skipped_when_not_running() {
        let host = MockHost::new();
        let replay = ReplayController::new(Box::new(LogConfirmation));

        assert_eq!(
            replay.stop(&host).await.unwrap(),
            CommandOutcome::AlreadyInState
        );
        host.state().replay_active = true;
        assert_eq!(replay.stop(&host).await.unwrap(), CommandOutcome::Issued);
        assert_eq!(host.state().stops, 1);
    }

    #[tokio::test]
    async fn test_command_failure_is_reported() {
        let host = MockHost::new();
        host.state().fail_commands = true;
        let replay = ReplayController::new(Box::new(LogConfirmation));

        let err = replay.start(&host).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::HostCommandFailure {
                command: HostCommand::Start,
                ..
            }
        ));
    }

    #[test]
    fn test_saved_invokes_confirmation() {
        let confirmation = RecordingConfirmation::default();
        let mut replay = ReplayController::new(Box::new(confirmation.clone()));

        replay.on_event(&ReplayBufferEvent::Started);
        replay.on_event(&ReplayBufferEvent::Saved {
            path: PathBuf::from("/clips/replay.mkv"),
        });

        assert_eq!(replay.saves(), 1);
        assert_eq!(
            *confirmation.paths.lock().unwrap(),
            vec![PathBuf::from("/clips/replay.mkv")]
        );
    }
}
