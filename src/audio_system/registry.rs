/// Track registry
///
/// Every live sound instance the session owns: the single music slot, the
/// sound-effect and voice-line maps, and music handles still fading out after
/// being replaced or stopped. Removal goes through `take`, so a handle leaves
/// the registry exactly once.
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::effects::EndCallback;
use super::engine::EngineHandle;
use super::source::Channel;

/// Per-play-call identifier, never reused within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Play requested, engine has not confirmed the start yet
    Loading,
    Playing,
    Paused,

    /// Playback was refused and no retry is pending
    Stalled,
}

/// One active sound instance
pub struct TrackHandle {
    pub instance: InstanceId,
    pub engine: EngineHandle,
    pub source_ref: String,

    /// Caller-requested volume before the channel multiplier
    pub base_volume: f32,

    pub channel: Channel,
    pub looped: bool,
    pub state: TrackState,

    /// Fade-in to start once the engine reports playback began
    pub pending_fade_in_ms: Option<u64>,

    /// Whether a play error already consumed the single retry
    pub retried: bool,

    pub on_end: Option<EndCallback>,
}

impl TrackHandle {
    pub fn new(
        instance: InstanceId,
        engine: EngineHandle,
        source_ref: impl Into<String>,
        channel: Channel,
        base_volume: f32,
    ) -> Self {
        Self {
            instance,
            engine,
            source_ref: source_ref.into(),
            base_volume,
            channel,
            looped: false,
            state: TrackState::Loading,
            pending_fade_in_ms: None,
            retried: false,
            on_end: None,
        }
    }
}

impl fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackHandle")
            .field("instance", &self.instance)
            .field("engine", &self.engine)
            .field("source_ref", &self.source_ref)
            .field("base_volume", &self.base_volume)
            .field("channel", &self.channel)
            .field("state", &self.state)
            .finish()
    }
}

/// The background music slot
#[derive(Debug)]
pub struct MusicSlot {
    /// Key used to detect a request for the track that is already playing
    pub source_key: String,
    pub track: TrackHandle,
}

/// Where a handle currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLocation {
    Music,
    Sfx(InstanceId),
    Voice(InstanceId),

    /// Fading out, released when the fade completes
    Retiring,
}

#[derive(Debug, Default)]
pub struct TrackRegistry {
    music: Option<MusicSlot>,
    sfx: HashMap<InstanceId, TrackHandle>,
    voice: HashMap<InstanceId, TrackHandle>,
    retiring: HashMap<EngineHandle, TrackHandle>,
    next_instance: u64,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_instance_id(&mut self) -> InstanceId {
        self.next_instance += 1;
        InstanceId(self.next_instance)
    }

    pub fn music(&self) -> Option<&MusicSlot> {
        self.music.as_ref()
    }

    pub fn music_mut(&mut self) -> Option<&mut MusicSlot> {
        self.music.as_mut()
    }

    /// Fill the music slot. The slot must be empty; callers retire the
    /// previous track first.
    pub fn set_music(&mut self, slot: MusicSlot) {
        debug_assert!(self.music.is_none(), "music slot already populated");
        self.music = Some(slot);
    }

    pub fn take_music(&mut self) -> Option<MusicSlot> {
        self.music.take()
    }

    /// Register a sound effect or voice line
    pub fn insert(&mut self, track: TrackHandle) {
        let instance = track.instance;
        match track.channel {
            Channel::Sfx => {
                self.sfx.insert(instance, track);
            }
            Channel::Voice => {
                self.voice.insert(instance, track);
            }
            Channel::Music => {
                tracing::error!("Music tracks belong in the music slot, dropping {}", instance);
            }
        }
    }

    /// Park a track that is fading out
    pub fn retire(&mut self, track: TrackHandle) {
        self.retiring.insert(track.engine, track);
    }

    pub fn locate(&self, handle: EngineHandle) -> Option<TrackLocation> {
        if self.music.as_ref().is_some_and(|slot| slot.track.engine == handle) {
            return Some(TrackLocation::Music);
        }
        if let Some(track) = self.sfx.values().find(|t| t.engine == handle) {
            return Some(TrackLocation::Sfx(track.instance));
        }
        if let Some(track) = self.voice.values().find(|t| t.engine == handle) {
            return Some(TrackLocation::Voice(track.instance));
        }
        if self.retiring.contains_key(&handle) {
            return Some(TrackLocation::Retiring);
        }
        None
    }

    /// Live (non-retiring) track owning `handle`
    pub fn track_mut(&mut self, handle: EngineHandle) -> Option<&mut TrackHandle> {
        match self.locate(handle)? {
            TrackLocation::Music => self.music.as_mut().map(|slot| &mut slot.track),
            TrackLocation::Sfx(id) => self.sfx.get_mut(&id),
            TrackLocation::Voice(id) => self.voice.get_mut(&id),
            TrackLocation::Retiring => None,
        }
    }

    /// Remove the track owning `handle`, wherever it lives
    pub fn take(&mut self, handle: EngineHandle) -> Option<(TrackLocation, TrackHandle)> {
        let location = self.locate(handle)?;
        let track = match location {
            TrackLocation::Music => self.music.take().map(|slot| slot.track),
            TrackLocation::Sfx(id) => self.sfx.remove(&id),
            TrackLocation::Voice(id) => self.voice.remove(&id),
            TrackLocation::Retiring => self.retiring.remove(&handle),
        }?;
        Some((location, track))
    }

    /// Remove every sound effect or voice line
    pub fn drain_channel(&mut self, channel: Channel) -> Vec<TrackHandle> {
        match channel {
            Channel::Sfx => self.sfx.drain().map(|(_, t)| t).collect(),
            Channel::Voice => self.voice.drain().map(|(_, t)| t).collect(),
            Channel::Music => self.music.take().map(|slot| slot.track).into_iter().collect(),
        }
    }

    pub fn drain_retiring(&mut self) -> Vec<TrackHandle> {
        self.retiring.drain().map(|(_, t)| t).collect()
    }

    /// Every live track, music first
    pub fn live_tracks_mut(&mut self) -> impl Iterator<Item = &mut TrackHandle> {
        self.music
            .iter_mut()
            .map(|slot| &mut slot.track)
            .chain(self.sfx.values_mut())
            .chain(self.voice.values_mut())
    }

    /// Live tracks on one channel
    pub fn channel_tracks_mut(&mut self, channel: Channel) -> impl Iterator<Item = &mut TrackHandle> {
        self.live_tracks_mut().filter(move |t| t.channel == channel)
    }

    pub fn count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Music => usize::from(self.music.is_some()),
            Channel::Sfx => self.sfx.len(),
            Channel::Voice => self.voice.len(),
        }
    }

    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }
}
