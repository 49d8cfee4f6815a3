//! TOML configuration: embedded defaults merged with an optional user file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use synclock_types::{ClockConfig, AVERAGING_TAPS, DISCONNECT_TICKS};

use crate::event_log::DEFAULT_CAPACITY;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Error from loading or storing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError(e.to_string())
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    tracking: TrackingConfig,
    #[serde(default)]
    events: EventsConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    divisor: Option<u8>,
    multiplier: Option<u8>,
    period_ticks: Option<u32>,
    lock: Option<bool>,
}

#[derive(Deserialize, Default)]
struct TrackingConfig {
    disconnect_ticks: Option<u64>,
    averaging_taps: Option<usize>,
}

#[derive(Deserialize, Default)]
struct EventsConfig {
    capacity: Option<usize>,
}

/// Engine tuning that is not part of the persisted clock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub disconnect_ticks: u64,
    pub averaging_taps: usize,
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            disconnect_ticks: DISCONNECT_TICKS,
            averaging_taps: AVERAGING_TAPS,
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct Config {
    defaults: DefaultsConfig,
    tracking: TrackingConfig,
    events: EventsConfig,
}

impl Config {
    /// Embedded defaults overridden by the user file, if any. Never fails:
    /// unreadable or malformed user files are logged and ignored.
    pub fn load() -> Self {
        let mut base = embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match read_file(&path) {
                    Ok(user) => merge(&mut base, user),
                    Err(e) => {
                        log::warn!(target: "config", "ignoring config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Self::from_file(base)
    }

    /// Embedded defaults overridden by the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut base = embedded();
        merge(&mut base, read_file(path)?);
        Ok(Self::from_file(base))
    }

    /// Embedded defaults overridden by a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut base = embedded();
        merge(&mut base, toml::from_str(contents)?);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            defaults: file.defaults,
            tracking: file.tracking,
            events: file.events,
        }
    }

    /// Initial clock configuration, clamped into range.
    pub fn clock(&self) -> ClockConfig {
        let fallback = ClockConfig::default();
        ClockConfig {
            divisor: self.defaults.divisor.unwrap_or(fallback.divisor),
            multiplier: self.defaults.multiplier.unwrap_or(fallback.multiplier),
            period_ticks: self.defaults.period_ticks.unwrap_or(fallback.period_ticks),
            lock_enabled: self.defaults.lock.unwrap_or(fallback.lock_enabled),
        }
        .sanitized()
    }

    pub fn engine(&self) -> EngineSettings {
        let fallback = EngineSettings::default();
        EngineSettings {
            disconnect_ticks: self
                .tracking
                .disconnect_ticks
                .unwrap_or(fallback.disconnect_ticks)
                .max(1),
            averaging_taps: self
                .tracking
                .averaging_taps
                .unwrap_or(fallback.averaging_taps)
                .clamp(2, AVERAGING_TAPS),
            event_capacity: self
                .events
                .capacity
                .unwrap_or(fallback.event_capacity)
                .max(1),
        }
    }
}

fn embedded() -> ConfigFile {
    toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
        log::error!(target: "config", "embedded config.toml is malformed: {}", e);
        ConfigFile::default()
    })
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("synclock").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.defaults.divisor.is_some() {
        base.defaults.divisor = user.defaults.divisor;
    }
    if user.defaults.multiplier.is_some() {
        base.defaults.multiplier = user.defaults.multiplier;
    }
    if user.defaults.period_ticks.is_some() {
        base.defaults.period_ticks = user.defaults.period_ticks;
    }
    if user.defaults.lock.is_some() {
        base.defaults.lock = user.defaults.lock;
    }
    if user.tracking.disconnect_ticks.is_some() {
        base.tracking.disconnect_ticks = user.tracking.disconnect_ticks;
    }
    if user.tracking.averaging_taps.is_some() {
        base.tracking.averaging_taps = user.tracking.averaging_taps;
    }
    if user.events.capacity.is_some() {
        base.events.capacity = user.events.capacity;
    }
}
