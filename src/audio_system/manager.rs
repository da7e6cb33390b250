/// Audio session
///
/// Sequences background music, voice lines and sound effects on top of a
/// `PlaybackEngine`. All state changes happen on the caller's thread: public
/// operations act immediately (or queue behind the unlock gate) and engine
/// callbacks are applied when the owner calls `pump`.
use crossbeam_channel::{unbounded, Receiver};
use serde::Serialize;

use super::channels::{ChannelState, MultiplierSnapshot, MuteSnapshot};
use super::effects::{clamp01, EndCallback, Fade, MusicOptions, SfxOptions, VoiceOptions};
use super::engine::{CreateOptions, EngineEvent, EngineHandle, PlaybackEngine};
use super::preload::{CompletedBatch, PreloadReport, PreloadTracker};
use super::registry::{InstanceId, MusicSlot, TrackHandle, TrackLocation, TrackRegistry, TrackState};
use super::source::Channel;
use super::unlock::{PendingAction, UnlockGate};
use crate::config::SessionConfig;
use crate::error::AudioError;
use crate::messaging::{EventBus, SessionEvent, SubscriberId};
use crate::persistence::SettingsStore;
use crate::state::{LifecycleMachine, SessionLifecycle};

/// What a play request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new handle was created and asked to play
    Started(InstanceId),

    /// The paused music slot for the same track was resumed
    Resumed(InstanceId),

    /// Waiting for the output context to unlock
    Queued,

    Muted,

    /// Same music track is already active
    AlreadyPlaying,

    /// The asset could not be loaded
    Failed,

    Disposed,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub engine_ready: bool,
    pub unlocked: bool,
    pub pending_actions: usize,
    pub current_music: Option<String>,
    pub music_playing: bool,
    pub muted: MuteSnapshot,
    pub multipliers: MultiplierSnapshot,
    pub master_volume: f32,
    pub active_sfx: usize,
    pub active_voice: usize,
    pub lifecycle: &'static str,
}

pub struct AudioSession<E: PlaybackEngine> {
    engine: E,
    engine_events: Receiver<EngineEvent>,
    lifecycle: LifecycleMachine,
    gate: UnlockGate,
    channels: ChannelState,
    registry: TrackRegistry,
    preloads: PreloadTracker,
    /// Handles whose single play retry waits for the next unlock signal
    play_retries: Vec<EngineHandle>,
    master_volume: f32,
    default_stop_fade_ms: u64,
    bus: EventBus,
}

impl<E: PlaybackEngine> AudioSession<E> {
    pub fn new(engine: E, store: Box<dyn SettingsStore>) -> Self {
        Self::with_config(engine, store, &SessionConfig::default())
    }

    pub fn with_config(mut engine: E, store: Box<dyn SettingsStore>, config: &SessionConfig) -> Self {
        let (tx, rx) = unbounded();
        engine.attach(tx);

        let mut session = Self {
            engine,
            engine_events: rx,
            lifecycle: LifecycleMachine::new(),
            gate: UnlockGate::new(),
            channels: ChannelState::load(store),
            registry: TrackRegistry::new(),
            preloads: PreloadTracker::new(),
            play_retries: Vec::new(),
            master_volume: 1.0,
            default_stop_fade_ms: config.default_stop_fade_ms,
            bus: EventBus::new(),
        };
        session.check_engine_ready();
        tracing::info!(
            "Audio session created ({})",
            session.lifecycle.state().description()
        );
        session
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Apply every pending engine callback. Returns the number handled.
    pub fn pump(&mut self) -> usize {
        if self.is_disposed() {
            for _ in self.engine_events.try_iter() {}
            return 0;
        }

        self.engine.poll();
        self.check_engine_ready();

        let mut dispatched = 0;
        while let Ok(event) = self.engine_events.try_recv() {
            self.dispatch(event);
            dispatched += 1;
        }
        dispatched
    }

    fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready => self.check_engine_ready(),
            EngineEvent::Unlocked => {
                if self.lifecycle.state().is_running() {
                    self.on_unlock_signal();
                } else {
                    self.check_engine_ready();
                }
            }
            EngineEvent::Loaded { handle } => self.on_preload_result(handle, true),
            EngineEvent::LoadError { handle, reason } => {
                if self.preloads.is_watching(handle) {
                    tracing::warn!(%handle, "Preload failed: {}", reason);
                    self.on_preload_result(handle, false);
                } else {
                    self.on_load_error(handle, &reason);
                }
            }
            EngineEvent::Started { handle } => self.on_started(handle),
            EngineEvent::PlayError { handle, reason } => self.on_play_error(handle, &reason),
            EngineEvent::FadeComplete { handle } => self.on_fade_complete(handle),
            EngineEvent::Ended { handle } => self.on_ended(handle),
        }
    }

    /// Poll engine initialization; unlock once the output context runs
    fn check_engine_ready(&mut self) {
        let state = self.lifecycle.state();
        if state.is_disposed() {
            return;
        }
        if state.is_awaiting_engine() {
            if !self.engine.is_ready() {
                return;
            }
            let _ = self.lifecycle.mark_ready();
        }
        if !self.gate.is_unlocked() && self.engine.is_unlocked() {
            self.on_unlock_signal();
        }
    }

    fn on_unlock_signal(&mut self) {
        if !self.lifecycle.state().is_running() {
            return;
        }

        if self.gate.begin_unlock() {
            let mut flushed = 0;
            while let Some(action) = self.gate.next_pending() {
                tracing::debug!("Replaying {}", action.description());
                self.run_action(action);
                flushed += 1;
            }
            self.gate.finish_flush();

            tracing::info!("Audio unlocked, replayed {} queued request(s)", flushed);
            self.bus.publish(SessionEvent::Unlocked { flushed });
        }

        let retries = std::mem::take(&mut self.play_retries);
        for handle in retries {
            self.retry_play(handle);
        }
    }

    fn run_action(&mut self, action: PendingAction) {
        match action {
            PendingAction::PlayMusic {
                source_ref,
                options,
            } => {
                self.start_music(source_ref, options);
            }
            PendingAction::PlaySfx {
                source_ref,
                options,
            } => {
                self.start_sfx(source_ref, options);
            }
            PendingAction::PlayVoice {
                source_ref,
                options,
            } => {
                self.start_voice(source_ref, options);
            }
            PendingAction::ResumeAll => self.resume_all_now(),
            PendingAction::ResumeMusic { base_volume } => {
                self.resume_music_now(base_volume);
            }
        }
    }

    /// Explicit unlock attempt, e.g. from a "tap to enable sound" control.
    /// Returns whether the session is unlocked afterwards.
    pub fn manual_unlock(&mut self) -> bool {
        if self.is_disposed() {
            return false;
        }
        if self.gate.is_unlocked() {
            return true;
        }
        if !self.engine.try_unlock() {
            tracing::debug!("Manual unlock attempt did not unlock the output");
            return false;
        }

        self.check_engine_ready();
        if !self.gate.is_unlocked() {
            self.on_unlock_signal();
        }
        self.gate.is_unlocked()
    }

    // ------------------------------------------------------------------
    // Engine callbacks
    // ------------------------------------------------------------------

    fn on_preload_result(&mut self, handle: EngineHandle, loaded: bool) {
        if !self.preloads.is_watching(handle) {
            return;
        }
        let done = self.preloads.resolve_handle(handle, loaded);
        self.engine.release(handle);
        if let Some(done) = done {
            self.finish_preload(done);
        }
    }

    fn finish_preload(&mut self, done: CompletedBatch) {
        tracing::debug!(
            "Preload finished: {} loaded, {} failed",
            done.report.loaded,
            done.report.failed
        );
        self.bus.publish(SessionEvent::PreloadComplete { report: done.report });
        done.fire();
    }

    fn on_started(&mut self, handle: EngineHandle) {
        let Some(track) = self.registry.track_mut(handle) else {
            tracing::debug!(%handle, "Start of untracked handle ignored");
            return;
        };
        if track.state == TrackState::Paused {
            return;
        }
        track.state = TrackState::Playing;

        if let Some(fade_in_ms) = track.pending_fade_in_ms.take() {
            let target = self.channels.output_for(track.channel, track.base_volume);
            self.engine.fade(handle, Fade::fade_in(target, fade_in_ms));
        }
    }

    fn on_play_error(&mut self, handle: EngineHandle, reason: &str) {
        let Some(track) = self.registry.track_mut(handle) else {
            return;
        };
        let error = AudioError::play(track.source_ref.as_str(), reason);

        if track.retried {
            tracing::warn!(channel = %track.channel, "{}, giving up", error);
            self.discard(handle);
            return;
        }

        track.retried = true;
        tracing::warn!(channel = %track.channel, "{}, retrying after the next unlock", error);
        self.play_retries.push(handle);
    }

    fn retry_play(&mut self, handle: EngineHandle) {
        let Some(track) = self.registry.track_mut(handle) else {
            tracing::debug!(%handle, "Retry skipped, handle already released");
            return;
        };
        if self.channels.is_muted(track.channel) {
            tracing::debug!(channel = %track.channel, "Retry skipped, channel muted");
            if track.state == TrackState::Loading {
                track.state = TrackState::Stalled;
            }
            return;
        }
        if track.state != TrackState::Paused {
            track.state = TrackState::Loading;
        }
        self.engine.play(handle);
    }

    fn on_load_error(&mut self, handle: EngineHandle, reason: &str) {
        let Some((_, track)) = self.registry.take(handle) else {
            tracing::debug!(%handle, "Load error for untracked handle ignored");
            return;
        };
        self.engine.release(handle);

        tracing::warn!(
            channel = %track.channel,
            source_ref = %track.source_ref,
            "Failed to load audio: {}",
            reason
        );
        self.bus.publish(SessionEvent::LoadFailed {
            channel: track.channel,
            source_ref: track.source_ref,
            reason: reason.to_string(),
        });
    }

    fn on_fade_complete(&mut self, handle: EngineHandle) {
        if self.registry.locate(handle) != Some(TrackLocation::Retiring) {
            return;
        }
        if let Some((_, track)) = self.registry.take(handle) {
            tracing::debug!(source_ref = %track.source_ref, "Fade out complete");
            self.release_track(track);
        }
    }

    fn on_ended(&mut self, handle: EngineHandle) {
        let Some(location) = self.registry.locate(handle) else {
            tracing::debug!(%handle, "End of untracked handle ignored");
            return;
        };

        // Looping music reports an end per iteration
        if location == TrackLocation::Music && self.registry.music().is_some_and(|s| s.track.looped) {
            return;
        }

        let Some((location, mut track)) = self.registry.take(handle) else {
            return;
        };
        self.engine.release(handle);

        match location {
            TrackLocation::Retiring => {}
            TrackLocation::Music => {
                self.bus.publish(SessionEvent::MusicStopped {
                    source_ref: track.source_ref.clone(),
                });
                self.publish_ended(&track);
            }
            TrackLocation::Sfx(_) | TrackLocation::Voice(_) => {
                self.publish_ended(&track);
                if let Some(on_end) = track.on_end.take() {
                    on_end();
                }
            }
        }
    }

    fn publish_ended(&self, track: &TrackHandle) {
        tracing::debug!(channel = %track.channel, source_ref = %track.source_ref, "Track ended");
        self.bus.publish(SessionEvent::TrackEnded {
            channel: track.channel,
            source_ref: track.source_ref.clone(),
            instance: track.instance,
        });
    }

    // ------------------------------------------------------------------
    // Track lifecycle helpers
    // ------------------------------------------------------------------

    fn release_track(&mut self, track: TrackHandle) {
        self.engine.stop(track.engine);
        self.engine.release(track.engine);
    }

    /// Remove and release whatever track owns `handle`
    fn discard(&mut self, handle: EngineHandle) {
        if let Some((_, track)) = self.registry.take(handle) {
            self.release_track(track);
        }
    }

    /// Fade a track out from its current level and release it afterwards, or
    /// release it now when there is nothing audible to fade
    fn retire_track(&mut self, track: TrackHandle, fade_ms: u64) {
        let level = self
            .engine
            .volume(track.engine)
            .unwrap_or_else(|| self.channels.output_for(track.channel, track.base_volume));
        let audible = track.state == TrackState::Playing && self.engine.is_playing(track.engine);

        if fade_ms > 0 && audible && level > 0.0 {
            self.engine.fade(track.engine, Fade::fade_out(level, fade_ms));
            self.registry.retire(track);
        } else {
            self.release_track(track);
        }
    }

    fn stop_channel(&mut self, channel: Channel) -> usize {
        let tracks = self.registry.drain_channel(channel);
        let stopped = tracks.len();
        for track in tracks {
            self.release_track(track);
        }
        if stopped > 0 {
            tracing::debug!(%channel, "Stopped {} track(s)", stopped);
        }
        stopped
    }

    fn report_load_failure(&self, channel: Channel, source_ref: &str, reason: String) -> PlayOutcome {
        tracing::warn!(%channel, source_ref, "Failed to load audio: {}", reason);
        self.bus.publish(SessionEvent::LoadFailed {
            channel,
            source_ref: source_ref.to_string(),
            reason,
        });
        PlayOutcome::Failed
    }

    // ------------------------------------------------------------------
    // Background music
    // ------------------------------------------------------------------

    pub fn play_background_music(&mut self, source_ref: &str, options: MusicOptions) -> PlayOutcome {
        if self.is_disposed() {
            return PlayOutcome::Disposed;
        }
        if self.channels.is_muted(Channel::Music) {
            tracing::debug!(source_ref, "Music muted, not playing");
            return PlayOutcome::Muted;
        }
        if self.gate.defers() {
            self.gate.enqueue(PendingAction::PlayMusic {
                source_ref: source_ref.to_string(),
                options,
            });
            return PlayOutcome::Queued;
        }
        self.start_music(source_ref.to_string(), options)
    }

    fn start_music(&mut self, source_ref: String, options: MusicOptions) -> PlayOutcome {
        if self.channels.is_muted(Channel::Music) {
            return PlayOutcome::Muted;
        }

        if let Some(slot) = self.registry.music_mut() {
            if slot.source_key == source_ref {
                let handle = slot.track.engine;
                match slot.track.state {
                    TrackState::Loading => return PlayOutcome::AlreadyPlaying,
                    TrackState::Playing if self.engine.is_playing(handle) => {
                        return PlayOutcome::AlreadyPlaying
                    }
                    TrackState::Paused => {
                        let level = self.channels.output_for(Channel::Music, slot.track.base_volume);
                        slot.track.state = TrackState::Playing;
                        slot.track.pending_fade_in_ms = None;
                        let instance = slot.track.instance;
                        self.engine.set_volume(handle, level);
                        self.engine.play(handle);
                        tracing::debug!(source_ref = %source_ref, "Resumed paused music");
                        return PlayOutcome::Resumed(instance);
                    }
                    // Finished or refused underneath us; start it over
                    TrackState::Playing | TrackState::Stalled => {}
                }
            }
        }

        if let Some(previous) = self.registry.take_music() {
            let fade_ms = if options.crossfade { options.crossfade_ms } else { 0 };
            tracing::debug!("Replacing music {} -> {}", previous.source_key, source_ref);
            self.retire_track(previous.track, fade_ms);
            self.bus.publish(SessionEvent::MusicStopped {
                source_ref: previous.source_key,
            });
        }

        let base_volume = clamp01(options.base_volume);
        let target = self.channels.output_for(Channel::Music, base_volume);
        let create = CreateOptions {
            volume: if options.fade_in_ms > 0 { 0.0 } else { target },
            looped: options.looped,
            streaming: true,
            rate: 1.0,
        };

        let handle = match self.engine.create(&source_ref, create) {
            Ok(handle) => handle,
            Err(e) => return self.report_load_failure(Channel::Music, &source_ref, e.to_string()),
        };

        let instance = self.registry.next_instance_id();
        let mut track = TrackHandle::new(instance, handle, source_ref.clone(), Channel::Music, base_volume);
        track.looped = options.looped;
        track.pending_fade_in_ms = (options.fade_in_ms > 0).then_some(options.fade_in_ms);
        self.registry.set_music(MusicSlot {
            source_key: source_ref.clone(),
            track,
        });

        tracing::info!("Playing background music: {}", source_ref);
        self.engine.play(handle);
        self.bus.publish(SessionEvent::MusicStarted { source_ref, instance });
        PlayOutcome::Started(instance)
    }

    /// Stop the music slot, fading out over `fade_out_ms` (configured default
    /// when None)
    pub fn stop_background_music(&mut self, fade_out_ms: Option<u64>) {
        let Some(slot) = self.registry.take_music() else {
            return;
        };
        let fade_ms = fade_out_ms.unwrap_or(self.default_stop_fade_ms);

        tracing::info!("Stopping background music: {}", slot.source_key);
        self.retire_track(slot.track, fade_ms);
        self.bus.publish(SessionEvent::MusicStopped {
            source_ref: slot.source_key,
        });
    }

    pub fn is_background_music_playing(&self) -> bool {
        self.registry
            .music()
            .is_some_and(|slot| self.engine.is_playing(slot.track.engine))
    }

    /// Update the music base volume and re-apply it
    pub fn set_background_music_volume(&mut self, volume: f32) {
        let Some(slot) = self.registry.music_mut() else {
            tracing::debug!("No background music to set volume on");
            return;
        };
        slot.track.base_volume = clamp01(volume);

        // A pending fade-in reads the new base when playback starts
        if slot.track.pending_fade_in_ms.is_none() {
            let level = self.channels.output_for(Channel::Music, slot.track.base_volume);
            self.engine.set_volume(slot.track.engine, level);
        }
    }

    /// Resume the music slot if there is one, optionally with a new base
    /// volume. Returns false when there is no music to resume.
    pub fn resume_background_music_if_any(&mut self, base_volume: Option<f32>) -> bool {
        if self.is_disposed() || self.registry.music().is_none() {
            return false;
        }
        if self.gate.defers() {
            self.gate.enqueue(PendingAction::ResumeMusic { base_volume });
            return true;
        }
        self.resume_music_now(base_volume)
    }

    fn resume_music_now(&mut self, base_volume: Option<f32>) -> bool {
        let Some(slot) = self.registry.music_mut() else {
            return false;
        };
        let track = &mut slot.track;
        if let Some(volume) = base_volume {
            track.base_volume = clamp01(volume);
        }

        track.pending_fade_in_ms = None;
        let level = self.channels.output_for(Channel::Music, track.base_volume);
        self.engine.set_volume(track.engine, level);

        if self.channels.is_muted(Channel::Music) {
            return true;
        }
        let stalled = match track.state {
            TrackState::Playing => !self.engine.is_playing(track.engine),
            TrackState::Stalled => true,
            _ => false,
        };
        if track.state == TrackState::Paused || stalled {
            track.state = TrackState::Playing;
            self.engine.play(track.engine);
        }
        true
    }

    // ------------------------------------------------------------------
    // Sound effects and voice lines
    // ------------------------------------------------------------------

    pub fn play_sound_effect(&mut self, source_ref: &str, options: SfxOptions) -> PlayOutcome {
        if self.is_disposed() {
            return PlayOutcome::Disposed;
        }
        if self.channels.is_muted(Channel::Sfx) {
            return PlayOutcome::Muted;
        }
        if self.gate.defers() {
            self.gate.enqueue(PendingAction::PlaySfx {
                source_ref: source_ref.to_string(),
                options,
            });
            return PlayOutcome::Queued;
        }
        self.start_sfx(source_ref.to_string(), options)
    }

    fn start_sfx(&mut self, source_ref: String, options: SfxOptions) -> PlayOutcome {
        self.start_one_shot(
            Channel::Sfx,
            source_ref,
            options.base_volume,
            options.rate,
            options.on_end,
        )
    }

    pub fn play_voice_line(&mut self, source_ref: &str, options: VoiceOptions) -> PlayOutcome {
        if self.is_disposed() {
            return PlayOutcome::Disposed;
        }
        if self.channels.is_muted(Channel::Voice) {
            return PlayOutcome::Muted;
        }
        if self.gate.defers() {
            self.gate.enqueue(PendingAction::PlayVoice {
                source_ref: source_ref.to_string(),
                options,
            });
            return PlayOutcome::Queued;
        }
        self.start_voice(source_ref.to_string(), options)
    }

    fn start_voice(&mut self, source_ref: String, options: VoiceOptions) -> PlayOutcome {
        if self.channels.is_muted(Channel::Voice) {
            return PlayOutcome::Muted;
        }
        if options.stop_previous {
            self.stop_channel(Channel::Voice);
        }
        self.start_one_shot(Channel::Voice, source_ref, options.base_volume, 1.0, options.on_end)
    }

    fn start_one_shot(
        &mut self,
        channel: Channel,
        source_ref: String,
        base_volume: f32,
        rate: f32,
        on_end: Option<EndCallback>,
    ) -> PlayOutcome {
        if self.channels.is_muted(channel) {
            return PlayOutcome::Muted;
        }

        let base_volume = clamp01(base_volume);
        let create = CreateOptions {
            volume: self.channels.output_for(channel, base_volume),
            looped: false,
            streaming: false,
            rate,
        };
        let handle = match self.engine.create(&source_ref, create) {
            Ok(handle) => handle,
            Err(e) => return self.report_load_failure(channel, &source_ref, e.to_string()),
        };

        let instance = self.registry.next_instance_id();
        tracing::debug!(%channel, %instance, source_ref = %source_ref, "Playing");

        let mut track = TrackHandle::new(instance, handle, source_ref, channel, base_volume);
        track.on_end = on_end;
        self.registry.insert(track);
        self.engine.play(handle);
        PlayOutcome::Started(instance)
    }

    pub fn stop_all_voice_lines(&mut self) {
        self.stop_channel(Channel::Voice);
    }

    pub fn stop_all_sound_effects(&mut self) {
        self.stop_channel(Channel::Sfx);
    }

    /// Stop and release everything, including tracks still fading out
    pub fn stop_all(&mut self) {
        let mut stopped = 0;
        if let Some(slot) = self.registry.take_music() {
            self.release_track(slot.track);
            self.bus.publish(SessionEvent::MusicStopped {
                source_ref: slot.source_key,
            });
            stopped += 1;
        }
        stopped += self.stop_channel(Channel::Sfx);
        stopped += self.stop_channel(Channel::Voice);
        for track in self.registry.drain_retiring() {
            self.release_track(track);
        }
        tracing::debug!("Stopped all audio ({} track(s))", stopped);
    }

    // ------------------------------------------------------------------
    // Pause / resume
    // ------------------------------------------------------------------

    pub fn pause_all(&mut self) {
        let mut paused = 0;
        for track in self.registry.live_tracks_mut() {
            if matches!(track.state, TrackState::Paused | TrackState::Stalled) {
                continue;
            }
            self.engine.pause(track.engine);
            track.state = TrackState::Paused;
            paused += 1;
        }
        tracing::debug!("Paused {} track(s)", paused);
    }

    /// Resume paused tracks on unmuted channels
    pub fn resume_all(&mut self) {
        if self.is_disposed() {
            return;
        }
        if self.gate.defers() {
            self.gate.enqueue(PendingAction::ResumeAll);
            return;
        }
        self.resume_all_now();
    }

    fn resume_all_now(&mut self) {
        let mut resumed = 0;
        for track in self.registry.live_tracks_mut() {
            if track.state != TrackState::Paused || self.channels.is_muted(track.channel) {
                continue;
            }
            // Tracks paused before they started still owe their fade-in
            track.state = if track.pending_fade_in_ms.is_some() {
                TrackState::Loading
            } else {
                TrackState::Playing
            };
            self.engine.play(track.engine);
            resumed += 1;
        }
        tracing::debug!("Resumed {} track(s)", resumed);
    }

    // ------------------------------------------------------------------
    // Mute and volume
    // ------------------------------------------------------------------

    pub fn set_muted(&mut self, channel: Channel, muted: bool) {
        if !self.channels.set_muted(channel, muted) {
            return;
        }

        if channel.releases_on_mute() {
            if muted {
                self.stop_channel(channel);
            }
        } else {
            if let Some(slot) = self.registry.music_mut() {
                let track = &slot.track;
                if track.pending_fade_in_ms.is_none() {
                    let level = self.channels.output_for(Channel::Music, track.base_volume);
                    self.engine.set_volume(track.engine, level);
                }
            }
            if muted {
                for track in self.registry.drain_retiring() {
                    self.release_track(track);
                }
            }
        }

        let all_muted = self.channels.all_muted();
        tracing::info!(%channel, muted, all_muted, "Channel mute changed");
        self.bus.publish(SessionEvent::MuteChanged {
            channel,
            muted,
            all_muted,
        });
    }

    pub fn set_music_muted(&mut self, muted: bool) {
        self.set_muted(Channel::Music, muted);
    }

    pub fn set_sfx_muted(&mut self, muted: bool) {
        self.set_muted(Channel::Sfx, muted);
    }

    pub fn set_voice_muted(&mut self, muted: bool) {
        self.set_muted(Channel::Voice, muted);
    }

    /// Set every channel's flag; the all-muted state follows from them
    pub fn set_all_muted(&mut self, muted: bool) {
        for channel in Channel::ALL {
            self.set_muted(channel, muted);
        }
    }

    pub fn set_volume_multiplier(&mut self, channel: Channel, multiplier: f32) {
        let applied = self.channels.set_multiplier(channel, multiplier);

        for track in self.registry.channel_tracks_mut(channel) {
            if track.pending_fade_in_ms.is_some() {
                continue;
            }
            let level = self.channels.output_for(channel, track.base_volume);
            self.engine.set_volume(track.engine, level);
        }

        tracing::info!(%channel, multiplier = applied, "Volume multiplier changed");
        self.bus.publish(SessionEvent::MultiplierChanged {
            channel,
            multiplier: applied,
        });
    }

    pub fn set_music_volume_multiplier(&mut self, multiplier: f32) {
        self.set_volume_multiplier(Channel::Music, multiplier);
    }

    pub fn set_sfx_volume_multiplier(&mut self, multiplier: f32) {
        self.set_volume_multiplier(Channel::Sfx, multiplier);
    }

    pub fn set_voice_volume_multiplier(&mut self, multiplier: f32) {
        self.set_volume_multiplier(Channel::Voice, multiplier);
    }

    /// Master output volume, applied by the engine on top of every channel
    pub fn set_global_volume(&mut self, volume: f32) {
        self.master_volume = clamp01(volume);
        self.engine.set_master_volume(self.master_volume);
    }

    // ------------------------------------------------------------------
    // Preload and lifecycle
    // ------------------------------------------------------------------

    /// Warm the engine cache for `source_refs`. `on_complete` runs exactly
    /// once, after every asset loaded or failed.
    pub fn preload<S: AsRef<str>>(
        &mut self,
        source_refs: &[S],
        on_complete: impl FnOnce(PreloadReport) + 'static,
    ) {
        if source_refs.is_empty() || self.is_disposed() {
            let report = PreloadReport {
                loaded: 0,
                failed: if self.is_disposed() { source_refs.len() } else { 0 },
            };
            self.bus.publish(SessionEvent::PreloadComplete { report });
            on_complete(report);
            return;
        }

        let batch = self.preloads.open(source_refs.len(), Box::new(on_complete));
        for source_ref in source_refs {
            let source_ref = source_ref.as_ref();
            match self.engine.preload(source_ref) {
                Ok(handle) => self.preloads.watch(batch, handle),
                Err(e) => {
                    tracing::warn!(source_ref, "Preload failed: {}", e);
                    if let Some(done) = self.preloads.resolve(batch, false) {
                        self.finish_preload(done);
                    }
                }
            }
        }
    }

    /// Stop everything and shut the session down. Further play requests are
    /// refused and engine callbacks ignored.
    pub fn dispose(&mut self) {
        if self.lifecycle.dispose().is_err() {
            tracing::debug!("Audio session already disposed");
            return;
        }

        self.stop_all();
        let dropped = self.gate.clear();
        self.play_retries.clear();

        let (handles, batches) = self.preloads.abandon_all();
        for handle in handles {
            self.engine.release(handle);
        }
        for batch in batches {
            self.finish_preload(batch);
        }
        for _ in self.engine_events.try_iter() {}

        tracing::info!("Audio session disposed ({} queued request(s) dropped)", dropped);
        self.bus.publish(SessionEvent::Disposed);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn get_status(&self) -> SessionStatus {
        let lifecycle = self.lifecycle.state();
        SessionStatus {
            engine_ready: !lifecycle.is_disposed() && self.engine.is_ready(),
            unlocked: self.gate.is_unlocked(),
            pending_actions: self.gate.pending_len(),
            current_music: self.registry.music().map(|slot| slot.source_key.clone()),
            music_playing: self.is_background_music_playing(),
            muted: self.channels.mute_snapshot(),
            multipliers: self.channels.multiplier_snapshot(),
            master_volume: self.master_volume,
            active_sfx: self.registry.count(Channel::Sfx),
            active_voice: self.registry.count(Channel::Voice),
            lifecycle: lifecycle.description(),
        }
    }

    pub fn lifecycle(&self) -> SessionLifecycle {
        self.lifecycle.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle.state().is_disposed()
    }

    pub fn is_unlocked(&self) -> bool {
        self.gate.is_unlocked()
    }

    pub fn is_muted(&self, channel: Channel) -> bool {
        self.channels.is_muted(channel)
    }

    pub fn is_all_muted(&self) -> bool {
        self.channels.all_muted()
    }

    pub fn volume_multiplier(&self, channel: Channel) -> f32 {
        self.channels.multiplier(channel)
    }

    pub fn active_count(&self, channel: Channel) -> usize {
        self.registry.count(channel)
    }

    pub fn active_sfx_count(&self) -> usize {
        self.registry.count(Channel::Sfx)
    }

    pub fn active_voice_count(&self) -> usize {
        self.registry.count(Channel::Voice)
    }

    /// Handle of the current music track
    pub fn music_handle(&self) -> Option<EngineHandle> {
        self.registry.music().map(|slot| slot.track.engine)
    }

    /// Music handles still fading out
    pub fn fading_out_count(&self) -> usize {
        self.registry.retiring_count()
    }

    pub fn subscribe(&self) -> (Receiver<SessionEvent>, SubscriberId) {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: PlaybackEngine> Drop for AudioSession<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::recording::{EngineCall, RecordingEngine};
    use crate::persistence::MemoryStore;

    fn session() -> AudioSession<RecordingEngine> {
        AudioSession::new(RecordingEngine::new(), Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_session_creation() {
        let session = session();
        let status = session.get_status();
        assert!(status.engine_ready);
        assert!(status.unlocked);
        assert_eq!(status.pending_actions, 0);
        assert_eq!(status.current_music, None);
        assert_eq!(status.lifecycle, "Running");
    }

    #[test]
    fn test_uninitialized_engine_queues_requests() {
        let mut session = AudioSession::new(RecordingEngine::uninitialized(), Box::new(MemoryStore::new()));
        assert!(session.lifecycle().is_awaiting_engine());

        assert_eq!(
            session.play_sound_effect("click.wav", SfxOptions::default()),
            PlayOutcome::Queued
        );
        assert_eq!(session.engine().created_count(), 0);

        session.engine_mut().become_ready();
        session.engine_mut().unlock_context();
        session.pump();

        assert!(session.lifecycle().is_running());
        assert_eq!(session.active_count(Channel::Sfx), 1);
    }

    #[test]
    fn test_music_starts_at_zero_and_fades_in() {
        let mut session = session();
        let outcome = session.play_background_music("theme.ogg", MusicOptions::default());
        assert!(matches!(outcome, PlayOutcome::Started(_)));

        let handle = session.music_handle().unwrap();
        assert_eq!(session.engine().volume(handle), Some(0.0));

        session.pump();
        let fade = session.engine().track(handle).unwrap().fade.unwrap();
        assert_eq!(fade.from, 0.0);
        assert!((fade.to - 0.7).abs() < 1e-6);
        assert_eq!(fade.duration_ms, 1000);
    }

    #[test]
    fn test_music_without_fade_starts_at_level() {
        let mut session = session();
        session.set_music_volume_multiplier(0.5);
        session.play_background_music("theme.ogg", MusicOptions::default().with_fade_in(0));

        let handle = session.music_handle().unwrap();
        assert!((session.engine().volume(handle).unwrap() - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_sync_load_failure_leaves_slot_empty() {
        let engine = RecordingEngine::new().with_missing_asset("gone.ogg");
        let mut session = AudioSession::new(engine, Box::new(MemoryStore::new()));

        let outcome = session.play_background_music("gone.ogg", MusicOptions::default());
        assert_eq!(outcome, PlayOutcome::Failed);
        assert!(session.music_handle().is_none());
    }

    #[test]
    fn test_stop_music_without_fade_releases_now() {
        let mut session = session();
        session.play_background_music("theme.ogg", MusicOptions::default());
        session.pump();
        let handle = session.music_handle().unwrap();

        session.stop_background_music(Some(0));
        assert!(session.music_handle().is_none());
        assert!(session.engine().track(handle).unwrap().released);
        assert_eq!(session.fading_out_count(), 0);
    }

    #[test]
    fn test_stop_music_with_fade_releases_after_fade() {
        let mut session = session();
        session.play_background_music("theme.ogg", MusicOptions::default().with_fade_in(0));
        session.pump();
        let handle = session.music_handle().unwrap();

        session.stop_background_music(None);
        assert!(session.music_handle().is_none());
        assert!(!session.engine().track(handle).unwrap().released);
        assert_eq!(session.fading_out_count(), 1);

        session.engine_mut().complete_fades();
        session.pump();
        assert!(session.engine().track(handle).unwrap().released);
        assert_eq!(session.fading_out_count(), 0);
    }

    #[test]
    fn test_stop_mid_fade_does_not_double_release() {
        let mut session = session();
        session.play_background_music("theme.ogg", MusicOptions::default().with_fade_in(0));
        session.pump();
        let handle = session.music_handle().unwrap();

        session.stop_background_music(Some(500));
        session.stop_all();
        session.engine().emit(EngineEvent::FadeComplete { handle });
        session.pump();

        assert_eq!(session.engine().track(handle).unwrap().release_calls, 1);
    }

    #[test]
    fn test_stop_with_nothing_playing_is_noop() {
        let mut session = session();
        session.stop_background_music(None);
        session.stop_all_sound_effects();
        session.stop_all_voice_lines();
        session.stop_all();
        assert!(session.engine().calls().is_empty());
    }

    #[test]
    fn test_play_error_retries_once_after_unlock() {
        let engine = RecordingEngine::new().with_failing_play("hit.wav", 1);
        let mut session = AudioSession::new(engine, Box::new(MemoryStore::new()));

        session.play_sound_effect("hit.wav", SfxOptions::default());
        session.pump();
        let handle = session.engine().handles_for("hit.wav")[0];
        assert!(!session.engine().is_playing(handle));
        assert_eq!(session.active_count(Channel::Sfx), 1);

        session.engine_mut().unlock_context();
        session.pump();
        assert!(session.engine().is_playing(handle));

        let plays = session
            .engine()
            .calls()
            .iter()
            .filter(|c| **c == EngineCall::Play(handle))
            .count();
        assert_eq!(plays, 2);
    }

    #[test]
    fn test_second_play_error_discards_handle() {
        let engine = RecordingEngine::new().with_failing_play("hit.wav", 2);
        let mut session = AudioSession::new(engine, Box::new(MemoryStore::new()));

        session.play_sound_effect("hit.wav", SfxOptions::default());
        session.pump();
        session.engine_mut().unlock_context();
        session.pump();

        assert_eq!(session.active_count(Channel::Sfx), 0);
        let handle = session.engine().handles_for("hit.wav")[0];
        assert!(session.engine().track(handle).unwrap().released);
    }

    #[test]
    fn test_retry_skipped_when_channel_muted() {
        let engine = RecordingEngine::new().with_failing_play("theme.ogg", 1);
        let mut session = AudioSession::new(engine, Box::new(MemoryStore::new()));

        session.play_background_music("theme.ogg", MusicOptions::default());
        session.pump();
        session.set_music_muted(true);
        session.engine_mut().unlock_context();
        session.pump();

        let handle = session.music_handle().unwrap();
        assert!(!session.engine().is_playing(handle));
    }

    #[test]
    fn test_global_volume_is_clamped_and_forwarded() {
        let mut session = session();
        session.set_global_volume(1.8);
        assert_eq!(session.engine().master_volume(), 1.0);
        assert_eq!(session.get_status().master_volume, 1.0);
    }

    #[test]
    fn test_dispose_is_idempotent_and_final() {
        let mut session = session();
        let (rx, _id) = session.subscribe();
        session.play_sound_effect("hit.wav", SfxOptions::default());

        session.dispose();
        session.dispose();

        assert!(session.is_disposed());
        assert_eq!(session.active_count(Channel::Sfx), 0);
        assert_eq!(
            session.play_sound_effect("hit.wav", SfxOptions::default()),
            PlayOutcome::Disposed
        );
        assert_eq!(session.pump(), 0);

        let disposed = rx.try_iter().filter(|e| *e == SessionEvent::Disposed).count();
        assert_eq!(disposed, 1);
    }
}
