/// Session lifecycle state machine
///
/// A session waits for its engine, runs, and is finally disposed. Disposal is
/// terminal.
use std::time::{Duration, Instant};

/// Lifecycle state of an audio session
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionLifecycle {
    /// Engine not initialized yet; requests queue or no-op
    AwaitingEngine { since: Instant },

    /// Engine ready
    Running { since: Instant },

    Disposed,
}

impl SessionLifecycle {
    pub fn is_awaiting_engine(&self) -> bool {
        matches!(self, SessionLifecycle::AwaitingEngine { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionLifecycle::Running { .. })
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, SessionLifecycle::Disposed)
    }

    /// Time spent in the current state (None once disposed)
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            SessionLifecycle::AwaitingEngine { since } | SessionLifecycle::Running { since } => {
                Some(since.elapsed())
            }
            SessionLifecycle::Disposed => None,
        }
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            SessionLifecycle::AwaitingEngine { .. } => "Waiting for engine...",
            SessionLifecycle::Running { .. } => "Running",
            SessionLifecycle::Disposed => "Disposed",
        }
    }
}

/// Lifecycle transition errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    AlreadyRunning,
    AlreadyDisposed,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::AlreadyRunning => write!(f, "Session is already running"),
            TransitionError::AlreadyDisposed => write!(f, "Session is already disposed"),
        }
    }
}

impl std::error::Error for TransitionError {}

/// State machine guarding lifecycle transitions
pub struct LifecycleMachine {
    state: SessionLifecycle,
}

impl LifecycleMachine {
    /// Create a new state machine waiting for its engine
    pub fn new() -> Self {
        Self {
            state: SessionLifecycle::AwaitingEngine {
                since: Instant::now(),
            },
        }
    }

    pub fn state(&self) -> SessionLifecycle {
        self.state
    }

    /// Transition from AwaitingEngine to Running
    pub fn mark_ready(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionLifecycle::AwaitingEngine { since } => {
                tracing::info!("Playback engine ready after {:?}", since.elapsed());
                self.state = SessionLifecycle::Running {
                    since: Instant::now(),
                };
                Ok(())
            }
            SessionLifecycle::Running { .. } => Err(TransitionError::AlreadyRunning),
            SessionLifecycle::Disposed => Err(TransitionError::AlreadyDisposed),
        }
    }

    pub fn dispose(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionLifecycle::Disposed => Err(TransitionError::AlreadyDisposed),
            _ => {
                self.state = SessionLifecycle::Disposed;
                Ok(())
            }
        }
    }
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_predicates() {
        let waiting = SessionLifecycle::AwaitingEngine {
            since: Instant::now(),
        };
        assert!(waiting.is_awaiting_engine());
        assert!(!waiting.is_running());
        assert!(waiting.elapsed().is_some());

        assert!(SessionLifecycle::Disposed.is_disposed());
        assert!(SessionLifecycle::Disposed.elapsed().is_none());
    }

    #[test]
    fn test_transitions() {
        let mut machine = LifecycleMachine::new();
        assert!(machine.state().is_awaiting_engine());

        assert!(machine.mark_ready().is_ok());
        assert!(machine.state().is_running());
        assert_eq!(machine.mark_ready(), Err(TransitionError::AlreadyRunning));

        assert!(machine.dispose().is_ok());
        assert_eq!(machine.dispose(), Err(TransitionError::AlreadyDisposed));
        assert_eq!(machine.mark_ready(), Err(TransitionError::AlreadyDisposed));
    }

    #[test]
    fn test_dispose_before_ready() {
        let mut machine = LifecycleMachine::new();
        assert!(machine.dispose().is_ok());
        assert_eq!(machine.state().description(), "Disposed");
    }
}
