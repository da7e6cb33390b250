/// Audio channels
///
/// The three independent mixing channels a session routes playback through.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Mixing channel of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Background music (at most one track at a time)
    Music,

    /// Short sound effects
    Sfx,

    /// Voice lines / narration
    Voice,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Music => write!(f, "music"),
            Channel::Sfx => write!(f, "sfx"),
            Channel::Voice => write!(f, "voice"),
        }
    }
}

impl Channel {
    /// Every channel, in a stable order
    pub const ALL: [Channel; 3] = [Channel::Music, Channel::Sfx, Channel::Voice];

    /// Store key of this channel's persisted volume multiplier
    pub fn multiplier_key(&self) -> &'static str {
        match self {
            Channel::Music => "audio.volume.music",
            Channel::Sfx => "audio.volume.sfx",
            Channel::Voice => "audio.volume.voice",
        }
    }

    /// Whether muting the channel tears down its active handles.
    ///
    /// Music keeps running at zero output so an unmute picks it back up.
    pub fn releases_on_mute(&self) -> bool {
        match self {
            Channel::Music => false,
            Channel::Sfx | Channel::Voice => true,
        }
    }

    fn index(&self) -> usize {
        match self {
            Channel::Music => 0,
            Channel::Sfx => 1,
            Channel::Voice => 2,
        }
    }
}

/// Fixed-size table with one slot per channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerChannel<T> {
    slots: [T; 3],
}

impl<T: Copy> PerChannel<T> {
    pub fn splat(value: T) -> Self {
        Self { slots: [value; 3] }
    }

    pub fn get(&self, channel: Channel) -> T {
        self.slots[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: T) {
        self.slots[channel.index()] = value;
    }
}
