/// Audio system module
///
/// Three-channel audio session (music, sound effects, voice lines) on top of a
/// pluggable playback engine.
///
/// ## Architecture
///
/// ```text
/// AudioSession<E: PlaybackEngine>
///   ├── UnlockGate       requests queued until the output context runs
///   ├── ChannelState     mute flags + persisted volume multipliers
///   ├── TrackRegistry    music slot, sfx / voice maps, fading-out music
///   └── PreloadTracker   count-based preload batches
///
/// PlaybackEngine
///   ├── RodioEngine      real output device
///   └── RecordingEngine  in-memory, for tests and headless use
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use audio_session::audio_system::{AudioSession, MusicOptions, RodioEngine, SfxOptions};
/// use audio_session::persistence::MemoryStore;
///
/// let mut session = AudioSession::new(RodioEngine::new("assets"), Box::new(MemoryStore::new()));
/// session.play_background_music("music/theme.mp3", MusicOptions::default());
/// session.play_sound_effect("sfx/click.wav", SfxOptions::default().with_rate(1.2));
///
/// loop {
///     session.pump();
///     std::thread::sleep(std::time::Duration::from_millis(50));
/// }
/// ```
pub mod channels;
pub mod effects;
pub mod engine;
pub mod manager;
pub mod player;
pub mod preload;
pub mod recording;
pub mod registry;
pub mod source;
pub mod unlock;

// Re-export commonly used types
pub use channels::{MultiplierSnapshot, MuteSnapshot};
pub use effects::{Fade, MusicOptions, SfxOptions, VoiceOptions};
pub use engine::{CreateOptions, EngineEvent, EngineHandle, PlaybackEngine};
pub use manager::{AudioSession, PlayOutcome, SessionStatus};
pub use player::RodioEngine;
pub use preload::PreloadReport;
pub use recording::RecordingEngine;
pub use registry::InstanceId;
pub use source::Channel;
