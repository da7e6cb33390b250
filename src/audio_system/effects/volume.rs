/// Volume math
///
/// Effective output is always the caller's base volume times the channel
/// multiplier, clamped to [0, 1].

/// Clamp a level into [0, 1]. NaN maps to 0.
pub fn clamp01(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Effective volume of a track with `base` volume on a channel at `multiplier`
pub fn effective_volume(base: f32, multiplier: f32) -> f32 {
    clamp01(clamp01(base) * clamp01(multiplier))
}

/// Volume settings of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelVolume {
    /// Volume multiplier (0.0-1.0)
    multiplier: f32,

    muted: bool,
}

impl ChannelVolume {
    /// Create channel settings with the given multiplier, unmuted
    pub fn new(multiplier: f32) -> Self {
        Self {
            multiplier: clamp01(multiplier),
            muted: false,
        }
    }

    /// Get the multiplier
    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    /// Set the multiplier
    pub fn set_multiplier(&mut self, multiplier: f32) {
        self.multiplier = clamp01(multiplier);
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Output level for a track with `base` volume; zero while muted
    pub fn output_for(&self, base: f32) -> f32 {
        if self.muted {
            0.0
        } else {
            effective_volume(base, self.multiplier)
        }
    }
}

impl Default for ChannelVolume {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            muted: false,
        }
    }
}
