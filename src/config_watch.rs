//! Config file watcher
//!
//! Re-reads the config file when it changes on disk and hands a new
//! [`Preference`] to the engine. Editors save in bursts (truncate, write,
//! rename), so unchanged preferences are swallowed here.
//!
//! Only the monitored source and the hook preference apply live. The other
//! sections are read once at startup; edits to them are reported as needing
//! a restart.

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::monitor::Preference;
use crate::sync::{DispatcherHandle, Task};

/// Remembers what was last forwarded so repeats are not sent again
#[derive(Debug)]
pub struct ConfigTracker {
    last: Preference,
    startup: Config,
    reported: Vec<&'static str>,
}

impl ConfigTracker {
    pub fn new(startup: &Config) -> Self {
        Self {
            last: startup.preference(),
            startup: startup.clone(),
            reported: Vec::new(),
        }
    }

    /// `Some` when the preference in `config` differs from what was last seen
    pub fn observe(&mut self, config: &Config) -> Option<Preference> {
        let pref = config.preference();
        if pref == self.last {
            return None;
        }
        self.last = pref.clone();
        Some(pref)
    }

    /// Settings in `config` that differ from startup and only apply after a
    /// restart. `None` unless the set changed since it was last reported.
    pub fn restart_required(&mut self, config: &Config) -> Option<Vec<&'static str>> {
        let changed = restart_only_changes(&self.startup, config);
        if changed == self.reported {
            return None;
        }
        self.reported = changed.clone();
        Some(changed).filter(|changed| !changed.is_empty())
    }
}

fn restart_only_changes(startup: &Config, config: &Config) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if startup.monitor.hook_capable_kinds != config.monitor.hook_capable_kinds {
        changed.push("monitor.hook_capable_kinds");
    }
    if startup.obs != config.obs {
        changed.push("obs");
    }
    if startup.rewire != config.rewire {
        changed.push("rewire");
    }
    if startup.dispatcher != config.dispatcher {
        changed.push("dispatcher");
    }
    if startup.confirmation != config.confirmation {
        changed.push("confirmation");
    }
    changed
}

/// Keeps the OS watcher alive; dropping it stops watching
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

/// Watch `config_path` and submit [`Task::Reconfigure`] on relevant edits
pub fn watch_config(
    config_path: &Path,
    startup: &Config,
    dispatcher: DispatcherHandle,
) -> Result<ConfigWatcher> {
    let dir = config_path
        .parent()
        .context("Config path has no parent directory")?
        .to_path_buf();
    let file_name = config_path
        .file_name()
        .context("Config path has no file name")?
        .to_os_string();
    let config_path = config_path.to_path_buf();
    let mut tracker = ConfigTracker::new(startup);

    // Watching the directory survives editors that replace the file
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!("Config watcher error: {}", e);
                return;
            }
        };

        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        if !event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
        {
            return;
        }

        let Some(config) = reload(&config_path) else {
            return;
        };
        if let Some(changed) = tracker.restart_required(&config) {
            warn!(
                "Config changes to {} take effect after a restart",
                changed.join(", ")
            );
        }
        if let Some(pref) = tracker.observe(&config) {
            info!(
                "Config changed: source '{}', prefer hook signals: {}",
                pref.source_name, pref.prefer_hook_signals
            );
            dispatcher.submit(Task::Reconfigure(pref));
        }
    })
    .context("Failed to create config watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch config directory: {:?}", dir))?;
    debug!("Watching {:?} for config changes", dir);

    Ok(ConfigWatcher { _watcher: watcher })
}

fn reload(path: &Path) -> Option<Config> {
    match Config::read_from(path) {
        Ok(config) => Some(config),
        Err(e) => {
            // Half-written files are common mid-save
            debug!("Ignoring unreadable config: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::dispatcher_channel;
    use std::time::Duration;

    fn pref(name: &str, hook: bool) -> Preference {
        Preference {
            source_name: name.to_string(),
            prefer_hook_signals: hook,
        }
    }

    fn config(source: &str) -> Config {
        let mut config = Config::default();
        config.monitor.source_name = source.to_string();
        config
    }

    #[test]
    fn test_tracker_forwards_only_changes() {
        let mut tracker = ConfigTracker::new(&config("Game"));

        assert_eq!(tracker.observe(&config("Game")), None);
        let mut no_hooks = config("Game");
        no_hooks.monitor.prefer_hook_signals = false;
        assert_eq!(tracker.observe(&no_hooks), Some(pref("Game", false)));
        assert_eq!(tracker.observe(&no_hooks), None);
        assert_eq!(tracker.observe(&config("Camera")), Some(pref("Camera", true)));
    }

    #[test]
    fn test_restart_only_settings_reported_once() {
        let mut tracker = ConfigTracker::new(&config("Game"));
        assert_eq!(tracker.restart_required(&config("Camera")), None);

        let mut edited = config("Game");
        edited.monitor.hook_capable_kinds.push("xcomposite_input".to_string());
        edited.rewire.max_attempts = 10;
        assert_eq!(
            tracker.restart_required(&edited),
            Some(vec!["monitor.hook_capable_kinds", "rewire"])
        );
        // Same edit saved again
        assert_eq!(tracker.restart_required(&edited), None);
        // A retarget in the same file still applies live
        edited.monitor.source_name = "Camera".to_string();
        assert_eq!(tracker.observe(&edited), Some(pref("Camera", true)));

        edited.obs.port = 4460;
        assert_eq!(
            tracker.restart_required(&edited),
            Some(vec!["monitor.hook_capable_kinds", "obs", "rewire"])
        );

        // Reverted: nothing left to report, and a later edit reports again
        assert_eq!(tracker.restart_required(&config("Game")), None);
        let mut queue = config("Game");
        queue.dispatcher.queue_capacity = 8;
        assert_eq!(tracker.restart_required(&queue), Some(vec!["dispatcher"]));
    }

    #[test]
    fn test_reload_skips_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[monitor\n").unwrap();
        assert!(reload(&path).is_none());

        std::fs::write(&path, "[monitor]\nsource_name = \"Game\"\n").unwrap();
        assert_eq!(reload(&path).unwrap().preference(), pref("Game", true));
    }

    #[tokio::test]
    async fn test_edit_submits_reconfigure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[monitor]\nsource_name = \"Game\"\n").unwrap();

        let (handle, mut queue) = dispatcher_channel(16);
        let _watcher = watch_config(&path, &config("Game"), handle).unwrap();

        std::fs::write(&path, "[monitor]\nsource_name = \"Camera\"\n").unwrap();

        let task = tokio::time::timeout(Duration::from_secs(10), queue.next())
            .await
            .expect("no reconfigure after edit");
        assert_eq!(task, Some(Task::Reconfigure(pref("Camera", true))));
    }
}
