//! Persisted clock record.
//!
//! The engine only produces and consumes [`ClockConfig`] values; where they
//! live is up to the host. [`JsonFileStore`] keeps them in a JSON file.

use std::path::{Path, PathBuf};

use synclock_types::ClockConfig;

use crate::config::ConfigError;

pub trait ConfigStore {
    /// The stored record, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<ClockConfig>, ConfigError>;

    fn save(&self, config: &ClockConfig) -> Result<(), ConfigError>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Option<ClockConfig>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let config: ClockConfig = serde_json::from_str(&contents)?;
        Ok(Some(config.sanitized()))
    }

    fn save(&self, config: &ClockConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json)?;
        log::debug!(target: "clock::store", "saved clock config to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("clock.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("clock.json"));
        let config = ClockConfig::new(3, 12, 640).with_lock(true);
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));
    }

    #[test]
    fn test_loaded_record_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.json");
        std::fs::write(&path, r#"{"divisor":0,"multiplier":40,"period_ticks":0}"#).unwrap();
        let loaded = JsonFileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded, ClockConfig::new(1, 16, 1));
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonFileStore::new(&path).load().is_err());
    }
}
