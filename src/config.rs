//! Application configuration
//!
//! Loaded from TOML. Every section has defaults matching the reference
//! six-position deployment, so an empty file (or no file) yields a working
//! configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub assistant: AssistantConfig,
    pub api: ApiConfig,
    pub input: InputConfig,
    pub player: PlayerConfig,
    pub connectivity: ConnectivityConfig,
    pub supervisor: SupervisorConfig,
    /// Channel selected when no line is asserted at boot, and the fallback
    /// for unknown mappings
    pub default_channel: String,
    /// Ordered channel table. Order defines playlist ordinals.
    pub channels: Vec<ChannelConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            assistant: AssistantConfig::default(),
            api: ApiConfig::default(),
            input: InputConfig::default(),
            player: PlayerConfig::default(),
            connectivity: ConnectivityConfig::default(),
            supervisor: SupervisorConfig::default(),
            default_channel: "ANR".to_string(),
            channels: ChannelConfig::reference_table(),
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Load from an explicit path, else the per-user config file, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => {
                tracing::info!("No configuration file found, using built-in defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Check the invariants the rest of the system relies on
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::Config("at least one channel is required".into()));
        }

        let mut pins = HashSet::new();
        let mut names = HashSet::new();
        let mut stations = HashSet::new();
        for channel in &self.channels {
            if !pins.insert(channel.pin) {
                return Err(Error::Config(format!("pin {} is used twice", channel.pin)));
            }
            if !names.insert(channel.name.as_str()) {
                return Err(Error::Config(format!("channel {} is defined twice", channel.name)));
            }
            if !stations.insert(channel.station.as_str()) {
                return Err(Error::Config(format!(
                    "station {} is mapped twice",
                    channel.station
                )));
            }
            if channel.url.trim().is_empty() {
                return Err(Error::Config(format!("channel {} has no url", channel.name)));
            }
        }

        if !names.contains(self.default_channel.as_str()) {
            return Err(Error::Config(format!(
                "default channel {} is not configured",
                self.default_channel
            )));
        }

        let input = &self.input;
        if input.sample_count == 0 {
            return Err(Error::Config("input.sample_count must be positive".into()));
        }
        if input.confirm_threshold == 0 || input.confirm_threshold > input.sample_count {
            return Err(Error::Config(format!(
                "input.confirm_threshold must be within 1..={}",
                input.sample_count
            )));
        }

        Ok(())
    }
}

/// Per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dk", "rotary-radio", "rotary-radio")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device/model identifier reported to the assistant integration
    pub model_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model_id: "rotary-radio".to_string(),
        }
    }
}

/// Voice assistant integration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub enabled: bool,
    /// Delay before the assistant dispatcher starts listening
    pub startup_delay_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            startup_delay_ms: DEFAULT_ASSISTANT_DELAY_MS,
        }
    }
}

impl AssistantConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Local HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub http_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: IpAddr::from([127, 0, 0, 1]),
            http_port: DEFAULT_API_PORT,
        }
    }
}

/// Input line backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputBackend {
    /// Linux sysfs GPIO interface
    Sysfs,
    /// In-memory lines, all idle
    Simulated,
}

/// Input sampling and debouncing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub backend: InputBackend,
    pub sysfs_root: PathBuf,
    /// Kernel GPIO number of pin 0 on the sysfs chip
    pub sysfs_base: u32,
    /// Edge source polling interval
    pub poll_interval_ms: u64,
    /// Minimum spacing between two edges on the same line
    pub bounce_ms: u64,
    pub sample_count: usize,
    pub sample_interval_ms: u64,
    pub confirm_threshold: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: InputBackend::Sysfs,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            sysfs_base: 0,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            bounce_ms: DEFAULT_BOUNCE_MS,
            sample_count: DEFAULT_SAMPLE_COUNT,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            confirm_threshold: DEFAULT_CONFIRM_THRESHOLD,
        }
    }
}

impl InputConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn bounce_time(&self) -> Duration {
        Duration::from_millis(self.bounce_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// External player invocation and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub program: PathBuf,
    /// Arguments placed before every command (e.g. `--host`)
    pub args: Vec<String>,
    pub clear_delay_ms: u64,
    pub add_delay_ms: u64,
    pub settle_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/mpc"),
            args: Vec::new(),
            clear_delay_ms: DEFAULT_CLEAR_DELAY_MS,
            add_delay_ms: DEFAULT_ADD_DELAY_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

/// Connectivity probe target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            host: "www.google.com".to_string(),
            port: 80,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

/// How a cold restart is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// Tear down and rebuild every resource inside the running process
    InProcess,
    /// Replace the process image with a fresh launch of the executable
    Exec,
}

/// Recovery loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub restart_delay_ms: u64,
    pub restart_mode: RestartMode,
    /// Pause between playlist initialization and the boot scan
    pub boot_delay_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            restart_mode: RestartMode::InProcess,
            boot_delay_ms: DEFAULT_BOOT_DELAY_MS,
        }
    }
}

impl SupervisorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.boot_delay_ms)
    }
}

/// One selector position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub pin: u32,
    /// Station name in the registry
    pub station: String,
    pub url: String,
}

impl ChannelConfig {
    pub fn new(name: &str, pin: u32, station: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            pin,
            station: station.to_string(),
            url: url.to_string(),
        }
    }

    /// The six-position reference deployment
    pub fn reference_table() -> Vec<ChannelConfig> {
        vec![
            Self::new("ANR", 5, "ANR", "http://stream.anr.dk/anr"),
            Self::new("RADIO_SOFT", 6, "RADIO_SOFT", "http://onair.100fmlive.dk/soft_live.mp3"),
            Self::new("P3", 13, "P3", "http://live-icy.gss.dr.dk/A/A05H.mp3"),
            Self::new("NORDJYSKE", 19, "NORDJYSKE", "http://stream.anr.dk/nordjyske"),
            Self::new("NOVA", 26, "NOVA", "http://stream.novafm.dk/nova128"),
            Self::new("ABC", 16, "ABC", "http://89.249.7.68/abc"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.len(), 6);
        assert_eq!(config.channels[0].pin, 5);
        assert_eq!(config.input.bounce_ms, 900);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.default_channel, "ANR");
        assert_eq!(config.supervisor.restart_mode, RestartMode::InProcess);
    }

    #[test]
    fn test_sysfs_base_parsed() {
        let config = AppConfig::from_toml_str("[input]\nsysfs_base = 512\n").unwrap();
        assert_eq!(config.input.sysfs_base, 512);
        assert_eq!(AppConfig::default().input.sysfs_base, 0);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let text = r#"
            default_channel = "B"

            [assistant]
            enabled = true

            [input]
            backend = "simulated"
            sample_count = 7
            confirm_threshold = 4

            [[channels]]
            name = "A"
            pin = 2
            station = "Alpha"
            url = "http://a"

            [[channels]]
            name = "B"
            pin = 3
            station = "Beta"
            url = "http://b"
        "#;
        let config = AppConfig::from_toml_str(text).unwrap();
        assert!(config.assistant.enabled);
        assert_eq!(config.input.backend, InputBackend::Simulated);
        assert_eq!(config.input.sample_count, 7);
        assert_eq!(config.input.sample_interval_ms, 10);
        assert_eq!(config.channels.len(), 2);
    }

    #[test]
    fn test_duplicate_pin_rejected() {
        let mut config = AppConfig::default();
        config.channels[1].pin = config.channels[0].pin;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_default_rejected() {
        let mut config = AppConfig::default();
        config.default_channel = "NOPE".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_above_sample_count_rejected() {
        let mut config = AppConfig::default();
        config.input.confirm_threshold = 6;
        assert!(config.validate().is_err());
    }
}
