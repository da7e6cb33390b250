/// Playback engine adapter
///
/// The capability surface the session drives. An adapter owns the actual
/// sound-output library; nothing above this trait knows which one is in use.
use std::fmt;

use crossbeam_channel::Sender;

use super::effects::Fade;
use crate::error::AudioError;

/// Opaque handle of one sound instance inside an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(pub u64);

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters for a new sound instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreateOptions {
    /// Initial output volume (0.0-1.0)
    pub volume: f32,

    pub looped: bool,

    /// Hint that the asset is long and should be streamed rather than buffered
    pub streaming: bool,

    /// Playback rate (1.0 = normal speed)
    pub rate: f32,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            volume: 1.0,
            looped: false,
            streaming: false,
            rate: 1.0,
        }
    }
}

/// Notifications an engine posts back to the session
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine finished initializing
    Ready,

    /// Output context transitioned to running
    Unlocked,

    Loaded { handle: EngineHandle },

    LoadError { handle: EngineHandle, reason: String },

    /// Playback actually began (or resumed)
    Started { handle: EngineHandle },

    /// Platform refused to start playback
    PlayError { handle: EngineHandle, reason: String },

    FadeComplete { handle: EngineHandle },

    /// Track reached its natural end
    Ended { handle: EngineHandle },
}

/// Sound-output capability set
///
/// Operations on unknown or released handles must be silent no-ops, and an
/// engine must not post further events for a handle after `release`.
pub trait PlaybackEngine {
    /// Register the channel every engine event is posted to
    fn attach(&mut self, events: Sender<EngineEvent>);

    /// Whether the engine finished initializing
    fn is_ready(&self) -> bool;

    /// Whether the output context is running (autoplay unlocked)
    fn is_unlocked(&self) -> bool;

    /// Explicit unlock attempt; true when the context is running afterwards
    fn try_unlock(&mut self) -> bool;

    /// Create a paused sound instance. Load failures may be reported either
    /// here or later through `EngineEvent::LoadError`.
    fn create(&mut self, source_ref: &str, options: CreateOptions) -> Result<EngineHandle, AudioError>;

    /// Warm the asset cache; completion arrives as `Loaded` / `LoadError`
    fn preload(&mut self, source_ref: &str) -> Result<EngineHandle, AudioError>;

    fn play(&mut self, handle: EngineHandle);

    fn pause(&mut self, handle: EngineHandle);

    fn stop(&mut self, handle: EngineHandle);

    fn release(&mut self, handle: EngineHandle);

    /// Ramp volume, then post `FadeComplete`. A later fade, `set_volume`,
    /// `stop` or `release` on the same handle cancels it.
    fn fade(&mut self, handle: EngineHandle, fade: Fade);

    fn set_volume(&mut self, handle: EngineHandle, volume: f32);

    /// Current output level of a handle (before master volume), including
    /// any fade in progress
    fn volume(&self, handle: EngineHandle) -> Option<f32>;

    fn is_playing(&self, handle: EngineHandle) -> bool;

    fn set_master_volume(&mut self, volume: f32);

    /// Cooperative tick for engines that detect state changes by polling
    fn poll(&mut self) {}
}
