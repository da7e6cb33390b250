/// Unlock gate
///
/// Holds play requests issued before the output context is allowed to run
/// and replays them, oldest first, the first time it unlocks.
use std::collections::VecDeque;
use std::fmt;

use super::effects::{MusicOptions, SfxOptions, VoiceOptions};

/// A deferred request, replayed once the gate opens
pub enum PendingAction {
    PlayMusic {
        source_ref: String,
        options: MusicOptions,
    },
    PlaySfx {
        source_ref: String,
        options: SfxOptions,
    },
    PlayVoice {
        source_ref: String,
        options: VoiceOptions,
    },
    ResumeAll,
    ResumeMusic {
        base_volume: Option<f32>,
    },
}

impl PendingAction {
    pub fn description(&self) -> String {
        match self {
            PendingAction::PlayMusic { source_ref, .. } => format!("play music {}", source_ref),
            PendingAction::PlaySfx { source_ref, .. } => format!("play sfx {}", source_ref),
            PendingAction::PlayVoice { source_ref, .. } => format!("play voice {}", source_ref),
            PendingAction::ResumeAll => "resume all".to_string(),
            PendingAction::ResumeMusic { .. } => "resume music".to_string(),
        }
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingAction({})", self.description())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatePhase {
    Locked,

    /// Draining the queue; new requests still append behind it
    Flushing,

    Unlocked,
}

/// FIFO gate in front of every playback request
#[derive(Debug)]
pub struct UnlockGate {
    phase: GatePhase,
    queue: VecDeque<PendingAction>,
}

impl UnlockGate {
    pub fn new() -> Self {
        Self {
            phase: GatePhase::Locked,
            queue: VecDeque::new(),
        }
    }

    /// True once the gate has opened (including while it drains)
    pub fn is_unlocked(&self) -> bool {
        self.phase != GatePhase::Locked
    }

    /// Whether a new request has to be queued instead of run
    pub fn defers(&self) -> bool {
        self.phase != GatePhase::Unlocked
    }

    pub fn enqueue(&mut self, action: PendingAction) {
        tracing::debug!("Queued until unlock: {}", action.description());
        self.queue.push_back(action);
    }

    /// Start unlocking. Returns false if the gate was already open.
    pub fn begin_unlock(&mut self) -> bool {
        if self.phase != GatePhase::Locked {
            return false;
        }
        self.phase = GatePhase::Flushing;
        true
    }

    /// Next queued action, while the gate is draining
    pub fn next_pending(&mut self) -> Option<PendingAction> {
        if self.phase != GatePhase::Flushing {
            return None;
        }
        self.queue.pop_front()
    }

    pub fn finish_flush(&mut self) {
        if self.phase == GatePhase::Flushing {
            self.phase = GatePhase::Unlocked;
        }
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Drop every queued action, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

impl Default for UnlockGate {
    fn default() -> Self {
        Self::new()
    }
}
