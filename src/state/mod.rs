/// State management module
///
/// Lifecycle of an audio session.
pub mod lifecycle;

// Re-export commonly used types
pub use lifecycle::{LifecycleMachine, SessionLifecycle, TransitionError};
