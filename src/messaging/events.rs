/// Session notifications
///
/// Events describe things the session already did (past tense). They are
/// broadcast to every subscriber; nothing in the session waits on them.
use crate::audio_system::preload::PreloadReport;
use crate::audio_system::registry::InstanceId;
use crate::audio_system::source::Channel;

/// Session events
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Output context unlocked and the queued requests were replayed
    Unlocked { flushed: usize },

    MusicStarted { source_ref: String, instance: InstanceId },

    MusicStopped { source_ref: String },

    /// A track reached its natural end and left the registry
    TrackEnded {
        channel: Channel,
        source_ref: String,
        instance: InstanceId,
    },

    LoadFailed {
        channel: Channel,
        source_ref: String,
        reason: String,
    },

    MuteChanged {
        channel: Channel,
        muted: bool,
        all_muted: bool,
    },

    MultiplierChanged { channel: Channel, multiplier: f32 },

    PreloadComplete { report: PreloadReport },

    Disposed,
}

impl SessionEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::Unlocked { flushed } => {
                format!("Audio unlocked ({} queued requests replayed)", flushed)
            }
            SessionEvent::MusicStarted { source_ref, .. } => format!("Music started: {}", source_ref),
            SessionEvent::MusicStopped { source_ref } => format!("Music stopped: {}", source_ref),
            SessionEvent::TrackEnded {
                channel, source_ref, ..
            } => format!("{} track ended: {}", channel, source_ref),
            SessionEvent::LoadFailed {
                source_ref, reason, ..
            } => format!("Failed to load {}: {}", source_ref, reason),
            SessionEvent::MuteChanged { channel, muted, .. } => {
                format!("{} {}", channel, if *muted { "muted" } else { "unmuted" })
            }
            SessionEvent::MultiplierChanged {
                channel,
                multiplier,
            } => format!("{} volume multiplier: {:.2}", channel, multiplier),
            SessionEvent::PreloadComplete { report } => format!(
                "Preload complete: {} loaded, {} failed",
                report.loaded, report.failed
            ),
            SessionEvent::Disposed => "Session disposed".to_string(),
        }
    }
}
