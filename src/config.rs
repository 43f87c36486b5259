//! Configuration management for replay-autopilot

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::monitor::Preference;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which source to monitor and how to interpret its signals
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// obs-websocket connection
    #[serde(default)]
    pub obs: ObsConfig,

    /// Resubscription retry budget
    #[serde(default)]
    pub rewire: RewireConfig,

    /// Event queue sizing
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// What to do when a replay is saved
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Name of the source to monitor (empty = none)
    #[serde(default)]
    pub source_name: String,

    /// Use hooked/unhooked from capture sources instead of activation/visibility
    #[serde(default = "default_true")]
    pub prefer_hook_signals: bool,

    /// Input kinds that emit hook signals
    #[serde(default = "default_hook_capable_kinds")]
    pub hook_capable_kinds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,

    #[serde(default = "default_obs_port")]
    pub port: u16,

    /// obs-websocket server password, if authentication is enabled
    #[serde(default)]
    pub password: Option<String>,

    /// Vendor name that hook signals are published under
    #[serde(default = "default_hook_vendor")]
    pub hook_vendor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewireConfig {
    /// Subscribe attempts per rewire episode
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (ms)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum queued tasks before non-blocking producers start dropping
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Command (argv) run after each save, with the replay path appended
    #[serde(default)]
    pub command: Vec<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_hook_capable_kinds() -> Vec<String> {
    vec!["game_capture".to_string(), "window_capture".to_string()]
}

fn default_obs_host() -> String {
    "localhost".to_string()
}

fn default_obs_port() -> u16 {
    4455
}

fn default_hook_vendor() -> String {
    "replay-autopilot".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2000 // OBS may still be loading the scene collection at startup
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source_name: String::new(),
            prefer_hook_signals: true,
            hook_capable_kinds: default_hook_capable_kinds(),
        }
    }
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
            hook_vendor: default_hook_vendor(),
        }
    }
}

impl Default for RewireConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            obs: ObsConfig::default(),
            rewire: RewireConfig::default(),
            dispatcher: DispatcherConfig::default(),
            confirmation: ConfirmationConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default location), creating a
    /// default file if none exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            Self::read_from(&config_path)
        } else {
            // Create default config
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Parse an existing config file
    pub fn read_from(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        config.config_path = Some(config_path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "replay-autopilot", "agent")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// The read-only preference handed to the monitoring core
    pub fn preference(&self) -> Preference {
        Preference {
            source_name: self.monitor.source_name.trim().to_string(),
            prefer_hook_signals: self.monitor.prefer_hook_signals,
        }
    }

    /// Whether sources of `kind` emit hook signals
    pub fn is_hook_capable(&self, kind: &str) -> bool {
        self.monitor.hook_capable_kinds.iter().any(|k| k == kind)
    }
}
