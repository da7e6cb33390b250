/// Settings persistence
///
/// String-keyed scalar store used for the per-channel volume multipliers.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Key/value scalar store
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;
}

/// In-memory store (nothing survives the process)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, builder style
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by one JSON object on disk, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// one is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(values) => {
                    tracing::debug!("Loaded audio settings from: {}", path.display());
                    values
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No audio settings at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!("Failed to read settings file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| {
                ConfigError::DirectoryCreationFailed {
                    path: parent.display().to_string(),
                    source,
                }
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: self.path.display().to_string(),
            source,
        };

        let json = serde_json::to_string_pretty(&self.values).map_err(|e| save_failed(Box::new(e)))?;
        std::fs::write(&self.path, json).map_err(|e| save_failed(Box::new(e)))?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new().with("a", "1");
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert!(store.get("b").is_none());

        store.set("b", "0.5").unwrap();
        assert_eq!(store.get("b").as_deref(), Some("0.5"));
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("audio-settings.json");

        let mut store = JsonFileStore::open(&path);
        assert!(store.get("audio.volume.music").is_none());
        store.set("audio.volume.music", "0.25").unwrap();

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get("audio.volume.music").as_deref(), Some("0.25"));
    }

    #[test]
    fn test_json_store_ignores_corrupt_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("audio-settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert!(store.get("audio.volume.sfx").is_none());
        assert_eq!(store.path(), path.as_path());
    }
}
