/// Recording playback engine
///
/// An in-memory engine that plays nothing. It records every call, tracks the
/// state of each handle, and lets its owner fire engine events by hand, so
/// session behavior can be driven step by step without audio hardware.
use std::collections::{BTreeMap, HashMap, HashSet};

use crossbeam_channel::Sender;

use super::effects::{clamp01, Fade};
use super::engine::{CreateOptions, EngineEvent, EngineHandle, PlaybackEngine};
use crate::error::AudioError;

/// One call made against the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Create {
        handle: EngineHandle,
        source_ref: String,
        options: CreateOptions,
    },
    Preload {
        handle: EngineHandle,
        source_ref: String,
    },
    Play(EngineHandle),
    Pause(EngineHandle),
    Stop(EngineHandle),
    Release(EngineHandle),
    Fade(EngineHandle, Fade),
    SetVolume(EngineHandle, f32),
    SetMasterVolume(f32),
    TryUnlock(bool),
}

/// State of one handle as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrack {
    pub source_ref: String,
    pub volume: f32,
    pub looped: bool,
    pub rate: f32,
    pub playing: bool,
    pub released: bool,

    /// Fade in progress, if any
    pub fade: Option<Fade>,

    /// Number of release calls, including redundant ones
    pub release_calls: usize,
}

pub struct RecordingEngine {
    events: Option<Sender<EngineEvent>>,
    ready: bool,
    unlocked: bool,
    auto_start: bool,
    missing_assets: HashSet<String>,
    failing_loads: HashSet<String>,
    failing_plays: HashMap<String, usize>,
    tracks: BTreeMap<EngineHandle, RecordedTrack>,
    preloads: BTreeMap<EngineHandle, String>,
    calls: Vec<EngineCall>,
    next_handle: u64,
    master_volume: f32,
}

impl RecordingEngine {
    /// Ready, unlocked engine that confirms every play immediately
    pub fn new() -> Self {
        Self {
            events: None,
            ready: true,
            unlocked: true,
            auto_start: true,
            missing_assets: HashSet::new(),
            failing_loads: HashSet::new(),
            failing_plays: HashMap::new(),
            tracks: BTreeMap::new(),
            preloads: BTreeMap::new(),
            calls: Vec::new(),
            next_handle: 0,
            master_volume: 1.0,
        }
    }

    /// Ready engine whose output context still needs an unlock
    pub fn locked() -> Self {
        Self {
            unlocked: false,
            ..Self::new()
        }
    }

    /// Engine that is still initializing
    pub fn uninitialized() -> Self {
        Self {
            ready: false,
            unlocked: false,
            ..Self::new()
        }
    }

    /// Don't post `Started` on play; tests call `start` themselves
    pub fn without_auto_start(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// `create` / `preload` fail synchronously for this asset
    pub fn with_missing_asset(mut self, source_ref: &str) -> Self {
        self.missing_assets.insert(source_ref.to_string());
        self
    }

    /// Loading this asset fails asynchronously with a `LoadError` event
    pub fn with_failing_load(mut self, source_ref: &str) -> Self {
        self.failing_loads.insert(source_ref.to_string());
        self
    }

    /// The next `times` play calls for this asset post `PlayError`
    pub fn with_failing_play(mut self, source_ref: &str, times: usize) -> Self {
        self.failing_plays.insert(source_ref.to_string(), times);
        self
    }

    /// Post an event as if the engine produced it
    pub fn emit(&self, event: EngineEvent) {
        match &self.events {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => tracing::debug!("RecordingEngine not attached, dropping {:?}", event),
        }
    }

    /// Finish initializing
    pub fn become_ready(&mut self) {
        self.ready = true;
        self.emit(EngineEvent::Ready);
    }

    /// Output context starts running (e.g. first user gesture)
    pub fn unlock_context(&mut self) {
        self.unlocked = true;
        self.emit(EngineEvent::Unlocked);
    }

    /// Confirm playback start of a handle
    pub fn start(&mut self, handle: EngineHandle) {
        self.emit(EngineEvent::Started { handle });
    }

    /// Run every fade in progress to its end
    pub fn complete_fades(&mut self) {
        let mut done = Vec::new();
        for (handle, track) in self.tracks.iter_mut() {
            if let Some(fade) = track.fade.take() {
                track.volume = fade.to;
                done.push(*handle);
            }
        }
        for handle in done {
            self.emit(EngineEvent::FadeComplete { handle });
        }
    }

    /// Move every fade in progress to the level it reaches after
    /// `elapsed_ms`, leaving it running
    pub fn advance_fades(&mut self, elapsed_ms: u64) {
        for track in self.tracks.values_mut() {
            if let Some(fade) = track.fade {
                track.volume = fade.level_at(elapsed_ms);
            }
        }
    }

    /// Natural end of a track
    pub fn finish(&mut self, handle: EngineHandle) {
        if let Some(track) = self.tracks.get_mut(&handle) {
            track.playing = false;
        }
        self.emit(EngineEvent::Ended { handle });
    }

    /// Report an asynchronous load failure for a handle
    pub fn fail_load(&mut self, handle: EngineHandle, reason: &str) {
        self.emit(EngineEvent::LoadError {
            handle,
            reason: reason.to_string(),
        });
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn track(&self, handle: EngineHandle) -> Option<&RecordedTrack> {
        self.tracks.get(&handle)
    }

    /// Every handle ever created for `source_ref`, oldest first
    pub fn handles_for(&self, source_ref: &str) -> Vec<EngineHandle> {
        self.tracks
            .iter()
            .filter(|(_, t)| t.source_ref == source_ref)
            .map(|(h, _)| *h)
            .collect()
    }

    /// Handles not yet released
    pub fn live_handles(&self) -> Vec<EngineHandle> {
        self.tracks
            .iter()
            .filter(|(_, t)| !t.released)
            .map(|(h, _)| *h)
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    fn allocate(&mut self) -> EngineHandle {
        self.next_handle += 1;
        EngineHandle(self.next_handle)
    }

    fn live_track(&mut self, handle: EngineHandle) -> Option<&mut RecordedTrack> {
        self.tracks.get_mut(&handle).filter(|t| !t.released)
    }
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for RecordingEngine {
    fn attach(&mut self, events: Sender<EngineEvent>) {
        self.events = Some(events);
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_unlocked(&self) -> bool {
        self.ready && self.unlocked
    }

    fn try_unlock(&mut self) -> bool {
        let unlocked = self.ready;
        self.calls.push(EngineCall::TryUnlock(unlocked));
        if unlocked && !self.unlocked {
            self.unlock_context();
        }
        unlocked
    }

    fn create(&mut self, source_ref: &str, options: CreateOptions) -> Result<EngineHandle, AudioError> {
        if !self.ready {
            return Err(AudioError::EngineUnavailable);
        }
        if self.missing_assets.contains(source_ref) {
            return Err(AudioError::load(source_ref, "asset not found"));
        }

        let handle = self.allocate();
        self.calls.push(EngineCall::Create {
            handle,
            source_ref: source_ref.to_string(),
            options,
        });
        self.tracks.insert(
            handle,
            RecordedTrack {
                source_ref: source_ref.to_string(),
                volume: clamp01(options.volume),
                looped: options.looped,
                rate: options.rate,
                playing: false,
                released: false,
                fade: None,
                release_calls: 0,
            },
        );

        if self.failing_loads.contains(source_ref) {
            self.fail_load(handle, "decode error");
        } else {
            self.emit(EngineEvent::Loaded { handle });
        }
        Ok(handle)
    }

    fn preload(&mut self, source_ref: &str) -> Result<EngineHandle, AudioError> {
        if self.missing_assets.contains(source_ref) {
            return Err(AudioError::load(source_ref, "asset not found"));
        }

        let handle = self.allocate();
        self.calls.push(EngineCall::Preload {
            handle,
            source_ref: source_ref.to_string(),
        });
        self.preloads.insert(handle, source_ref.to_string());

        if self.failing_loads.contains(source_ref) {
            self.fail_load(handle, "decode error");
        } else {
            self.emit(EngineEvent::Loaded { handle });
        }
        Ok(handle)
    }

    fn play(&mut self, handle: EngineHandle) {
        self.calls.push(EngineCall::Play(handle));
        let unlocked = self.unlocked;
        let auto_start = self.auto_start;
        let Some(track) = self.live_track(handle) else {
            return;
        };

        let source_ref = track.source_ref.clone();
        let refuse = match self.failing_plays.get_mut(&source_ref) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Some("playback blocked")
            }
            _ if !unlocked => Some("output context locked"),
            _ => None,
        };

        if let Some(reason) = refuse {
            self.emit(EngineEvent::PlayError {
                handle,
                reason: reason.to_string(),
            });
            return;
        }

        if let Some(track) = self.live_track(handle) {
            track.playing = true;
        }
        if auto_start {
            self.emit(EngineEvent::Started { handle });
        }
    }

    fn pause(&mut self, handle: EngineHandle) {
        self.calls.push(EngineCall::Pause(handle));
        if let Some(track) = self.live_track(handle) {
            track.playing = false;
        }
    }

    fn stop(&mut self, handle: EngineHandle) {
        self.calls.push(EngineCall::Stop(handle));
        if let Some(track) = self.live_track(handle) {
            track.playing = false;
            track.fade = None;
        }
    }

    fn release(&mut self, handle: EngineHandle) {
        self.calls.push(EngineCall::Release(handle));
        if self.preloads.remove(&handle).is_some() {
            return;
        }
        if let Some(track) = self.tracks.get_mut(&handle) {
            track.release_calls += 1;
            track.released = true;
            track.playing = false;
            track.fade = None;
        }
    }

    fn fade(&mut self, handle: EngineHandle, fade: Fade) {
        self.calls.push(EngineCall::Fade(handle, fade));
        if let Some(track) = self.live_track(handle) {
            track.volume = fade.from;
            track.fade = Some(fade);
        }
    }

    fn set_volume(&mut self, handle: EngineHandle, volume: f32) {
        self.calls.push(EngineCall::SetVolume(handle, volume));
        if let Some(track) = self.live_track(handle) {
            track.volume = clamp01(volume);
            track.fade = None;
        }
    }

    fn volume(&self, handle: EngineHandle) -> Option<f32> {
        self.tracks.get(&handle).filter(|t| !t.released).map(|t| t.volume)
    }

    fn is_playing(&self, handle: EngineHandle) -> bool {
        self.tracks
            .get(&handle)
            .is_some_and(|t| t.playing && !t.released)
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.calls.push(EngineCall::SetMasterVolume(volume));
        self.master_volume = clamp01(volume);
    }
}
