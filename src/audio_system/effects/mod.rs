/// Playback options
///
/// Option records for the three play operations, with builder methods in the
/// style of an effect chain, plus the volume and fade helpers they rely on.

pub mod fade;
pub mod volume;

use std::fmt;

pub use fade::Fade;
pub use volume::{clamp01, effective_volume, ChannelVolume};

/// Callback run once after a track ends naturally
pub type EndCallback = Box<dyn FnOnce()>;

/// Options for background music
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicOptions {
    /// Requested volume before the channel multiplier (0.0-1.0)
    pub base_volume: f32,

    pub looped: bool,

    /// Fade in duration in milliseconds (0 = start at full level)
    pub fade_in_ms: u64,

    /// Fade the previous track out instead of cutting it
    pub crossfade: bool,

    pub crossfade_ms: u64,
}

impl Default for MusicOptions {
    fn default() -> Self {
        Self {
            base_volume: 0.7,
            looped: true,
            fade_in_ms: 1000,
            crossfade: true,
            crossfade_ms: 2000,
        }
    }
}

impl MusicOptions {
    /// Set base volume
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.base_volume = clamp01(volume);
        self
    }

    pub fn with_loop(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    /// Set fade in duration
    pub fn with_fade_in(mut self, ms: u64) -> Self {
        self.fade_in_ms = ms;
        self
    }

    /// Crossfade from the previous track over `ms`
    pub fn with_crossfade(mut self, ms: u64) -> Self {
        self.crossfade = true;
        self.crossfade_ms = ms;
        self
    }

    /// Cut the previous track immediately
    pub fn without_crossfade(mut self) -> Self {
        self.crossfade = false;
        self
    }
}

/// Options for a sound effect
pub struct SfxOptions {
    pub base_volume: f32,

    /// Playback rate (1.0 = normal speed)
    pub rate: f32,

    pub on_end: Option<EndCallback>,
}

impl Default for SfxOptions {
    fn default() -> Self {
        Self {
            base_volume: 0.8,
            rate: 1.0,
            on_end: None,
        }
    }
}

impl SfxOptions {
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.base_volume = clamp01(volume);
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn on_end(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_end = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for SfxOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfxOptions")
            .field("base_volume", &self.base_volume)
            .field("rate", &self.rate)
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// Options for a voice line
pub struct VoiceOptions {
    pub base_volume: f32,

    pub on_end: Option<EndCallback>,

    /// Stop every other active voice line first
    pub stop_previous: bool,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            base_volume: 1.0,
            on_end: None,
            stop_previous: true,
        }
    }
}

impl VoiceOptions {
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.base_volume = clamp01(volume);
        self
    }

    pub fn on_end(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_end = Some(Box::new(callback));
        self
    }

    /// Let this line overlap lines that are already playing
    pub fn overlapping(mut self) -> Self {
        self.stop_previous = false;
        self
    }
}

impl fmt::Debug for VoiceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceOptions")
            .field("base_volume", &self.base_volume)
            .field("on_end", &self.on_end.is_some())
            .field("stop_previous", &self.stop_previous)
            .finish()
    }
}
