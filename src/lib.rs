pub mod audio_system;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod persistence;
pub mod state;

pub use audio_system::{AudioSession, Channel, MusicOptions, PlayOutcome, SfxOptions, VoiceOptions};
pub use config::SessionConfig;
pub use error::{AppResult, AudioError, ConfigError};
