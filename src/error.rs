use thiserror::Error;

/// Audio errors raised by playback engine adapters.
///
/// The session never hands these back to its callers: it logs them and
/// degrades to a silent no-op. Adapters and tests see them directly.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio asset: {source_ref} ({reason})")]
    LoadFailed { source_ref: String, reason: String },

    #[error("Playback was refused for {source_ref} ({reason})")]
    PlayFailed { source_ref: String, reason: String },

    #[error("Playback engine is not initialized yet")]
    EngineUnavailable,

    #[error("Failed to open audio output: {0}")]
    OutputUnavailable(String),
}

impl AudioError {
    pub fn load(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        AudioError::LoadFailed {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    pub fn play(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        AudioError::PlayFailed {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
