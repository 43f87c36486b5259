//! Save confirmation hooks
//!
//! Invoked on the dispatcher for every saved replay, so implementations must
//! return immediately and push any real work elsewhere.

use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info, warn};

use crate::config::ConfirmationConfig;

pub trait SaveConfirmation: Send + Sync {
    fn confirm(&self, path: &Path);
}

/// Logs the saved path and nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfirmation;

impl SaveConfirmation for LogConfirmation {
    fn confirm(&self, path: &Path) {
        info!("Replay saved: {}", path.display());
    }
}

/// Runs a user command with the saved path appended as the last argument
#[derive(Debug, Clone)]
pub struct CommandConfirmation {
    program: String,
    args: Vec<String>,
}

impl CommandConfirmation {
    /// `None` for an empty argv
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl SaveConfirmation for CommandConfirmation {
    fn confirm(&self, path: &Path) {
        let spawned = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to run save confirmation '{}': {}", self.program, e);
                return;
            }
        };

        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!("Save confirmation '{}' finished", program);
                }
                Ok(status) => warn!("Save confirmation '{}' exited with {}", program, status),
                Err(e) => warn!("Save confirmation '{}' failed: {}", program, e),
            }
        });
    }
}

/// Pick the confirmation hook described by the configuration
pub fn from_config(config: &ConfirmationConfig) -> Box<dyn SaveConfirmation> {
    match CommandConfirmation::new(&config.command) {
        Some(command) => {
            info!("Replay saves will run '{}'", command.program);
            Box::new(command)
        }
        None => Box::new(LogConfirmation),
    }
}
