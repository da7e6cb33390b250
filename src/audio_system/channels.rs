/// Channel state
///
/// Mute flags and volume multipliers for the three channels. Multipliers are
/// persisted through a `SettingsStore`; mute flags live for the session only.
/// The all-muted flag is always derived, never stored.
use serde::Serialize;

use super::effects::{clamp01, ChannelVolume};
use super::source::{Channel, PerChannel};
use crate::persistence::SettingsStore;

/// Mute flags at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MuteSnapshot {
    pub music: bool,
    pub sfx: bool,
    pub voice: bool,
    pub all: bool,
}

/// Volume multipliers at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MultiplierSnapshot {
    pub music: f32,
    pub sfx: f32,
    pub voice: f32,
}

pub struct ChannelState {
    volumes: PerChannel<ChannelVolume>,
    store: Box<dyn SettingsStore>,
}

impl ChannelState {
    /// Load persisted multipliers; absent or unparsable values fall back to 1.0
    pub fn load(store: Box<dyn SettingsStore>) -> Self {
        let mut volumes = PerChannel::splat(ChannelVolume::default());
        for channel in Channel::ALL {
            let multiplier = store
                .get(channel.multiplier_key())
                .and_then(|raw| raw.trim().parse::<f32>().ok())
                .map(clamp01)
                .unwrap_or(1.0);
            volumes.set(channel, ChannelVolume::new(multiplier));
        }

        tracing::debug!(
            "Loaded volume multipliers: music={} sfx={} voice={}",
            volumes.get(Channel::Music).multiplier(),
            volumes.get(Channel::Sfx).multiplier(),
            volumes.get(Channel::Voice).multiplier()
        );

        Self { volumes, store }
    }

    pub fn is_muted(&self, channel: Channel) -> bool {
        self.volumes.get(channel).is_muted()
    }

    /// Set a mute flag. Returns true if the flag changed.
    pub fn set_muted(&mut self, channel: Channel, muted: bool) -> bool {
        let mut volume = self.volumes.get(channel);
        if volume.is_muted() == muted {
            return false;
        }
        volume.set_muted(muted);
        self.volumes.set(channel, volume);
        true
    }

    pub fn all_muted(&self) -> bool {
        Channel::ALL.iter().all(|channel| self.is_muted(*channel))
    }

    pub fn multiplier(&self, channel: Channel) -> f32 {
        self.volumes.get(channel).multiplier()
    }

    /// Clamp, store and persist a multiplier. Returns the stored value.
    pub fn set_multiplier(&mut self, channel: Channel, multiplier: f32) -> f32 {
        let mut volume = self.volumes.get(channel);
        volume.set_multiplier(multiplier);
        self.volumes.set(channel, volume);

        let stored = volume.multiplier();
        if let Err(e) = self.store.set(channel.multiplier_key(), &stored.to_string()) {
            tracing::warn!(%channel, "Failed to persist volume multiplier: {}", e);
        }
        stored
    }

    /// Output level for a track on `channel` with `base` volume
    pub fn output_for(&self, channel: Channel, base: f32) -> f32 {
        self.volumes.get(channel).output_for(base)
    }

    pub fn mute_snapshot(&self) -> MuteSnapshot {
        MuteSnapshot {
            music: self.is_muted(Channel::Music),
            sfx: self.is_muted(Channel::Sfx),
            voice: self.is_muted(Channel::Voice),
            all: self.all_muted(),
        }
    }

    pub fn multiplier_snapshot(&self) -> MultiplierSnapshot {
        MultiplierSnapshot {
            music: self.multiplier(Channel::Music),
            sfx: self.multiplier(Channel::Sfx),
            voice: self.multiplier(Channel::Voice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_defaults_without_stored_values() {
        let state = ChannelState::load(Box::new(MemoryStore::new()));
        for channel in Channel::ALL {
            assert_eq!(state.multiplier(channel), 1.0);
            assert!(!state.is_muted(channel));
        }
        assert!(!state.all_muted());
    }

    #[test]
    fn test_stored_values_are_parsed_and_clamped() {
        let store = MemoryStore::new()
            .with("audio.volume.music", "0.3")
            .with("audio.volume.sfx", "7")
            .with("audio.volume.voice", "loud");
        let state = ChannelState::load(Box::new(store));

        assert!((state.multiplier(Channel::Music) - 0.3).abs() < 1e-6);
        assert_eq!(state.multiplier(Channel::Sfx), 1.0);
        assert_eq!(state.multiplier(Channel::Voice), 1.0);
    }

    #[test]
    fn test_all_muted_is_derived() {
        let mut state = ChannelState::load(Box::new(MemoryStore::new()));
        assert!(state.set_muted(Channel::Music, true));
        assert!(state.set_muted(Channel::Sfx, true));
        assert!(!state.all_muted());

        assert!(state.set_muted(Channel::Voice, true));
        assert!(state.all_muted());

        // Same value again is not a change
        assert!(!state.set_muted(Channel::Voice, true));

        state.set_muted(Channel::Sfx, false);
        assert!(!state.all_muted());
        assert!(!state.mute_snapshot().all);
    }

    #[test]
    fn test_set_multiplier_clamps() {
        let mut state = ChannelState::load(Box::new(MemoryStore::new()));
        assert_eq!(state.set_multiplier(Channel::Voice, 1.7), 1.0);
        assert_eq!(state.set_multiplier(Channel::Voice, -3.0), 0.0);
        assert_eq!(state.multiplier_snapshot().voice, 0.0);
    }

    #[test]
    fn test_output_respects_mute() {
        let mut state = ChannelState::load(Box::new(MemoryStore::new()));
        state.set_multiplier(Channel::Music, 0.5);
        assert!((state.output_for(Channel::Music, 0.7) - 0.35).abs() < 1e-6);

        state.set_muted(Channel::Music, true);
        assert_eq!(state.output_for(Channel::Music, 0.7), 0.0);
    }
}
