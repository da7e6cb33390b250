use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Application folder under the platform config directory
pub const APP_DIR_NAME: &str = "AudioSession";

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_stop_fade_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cadence of the cooperative event loop and engine readiness polling
    #[serde(default = "default_poll_interval_ms")]
    pub engine_poll_interval_ms: u64,

    /// Where volume multipliers are persisted (platform default when absent)
    #[serde(default)]
    pub settings_file: Option<PathBuf>,

    /// Fade used when music is stopped without an explicit duration
    #[serde(default = "default_stop_fade_ms")]
    pub default_stop_fade_ms: u64,

    /// Base directory for relative asset references
    #[serde(default)]
    pub asset_root: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine_poll_interval_ms: default_poll_interval_ms(),
            settings_file: None,
            default_stop_fade_ms: default_stop_fade_ms(),
            asset_root: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source,
        };

        let content = fs::read_to_string(path).map_err(|e| load_failed(Box::new(e)))?;
        let config: SessionConfig = serde_json::from_str(&content).map_err(|e| load_failed(Box::new(e)))?;
        config.validate()?;

        tracing::info!("✓ Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Load from the platform config directory
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source,
        };

        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Platform config directory for this application
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::app_dir().map(|dir| dir.join("config.json"))
    }

    /// Resolved location of the persisted multipliers
    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .or_else(|| Self::app_dir().map(|dir| dir.join("audio-settings.json")))
            .unwrap_or_else(|| PathBuf::from("audio-settings.json"))
    }

    pub fn asset_root(&self) -> PathBuf {
        self.asset_root.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.engine_poll_interval_ms, 50);
        assert_eq!(config.default_stop_fade_ms, 1000);
        assert!(config.settings_file.is_none());
        assert_eq!(config.asset_root(), PathBuf::from("."));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let config = SessionConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cfg").join("config.json");

        let config = SessionConfig {
            engine_poll_interval_ms: 20,
            settings_file: Some(dir.path().join("volumes.json")),
            default_stop_fade_ms: 0,
            asset_root: Some(PathBuf::from("/srv/audio")),
        };
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.settings_path(), dir.path().join("volumes.json"));
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_stop_fade_ms": 250 }"#).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded.default_stop_fade_ms, 250);
        assert_eq!(loaded.engine_poll_interval_ms, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "engine_poll_interval_ms": 0 }"#).unwrap();

        assert!(matches!(
            SessionConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
