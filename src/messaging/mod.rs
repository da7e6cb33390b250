/// Messaging module for session notifications
///
/// The session publishes a `SessionEvent` after every observable state
/// change; UI layers, loggers, or tests subscribe without holding on to the
/// session itself.
///
/// ## Architecture
///
/// ```text
/// ┌──────────────┐   publish    ┌─────────────┐   Receiver<SessionEvent>
/// │ AudioSession │ ───────────> │  Event Bus  │ ───────────────────────> subscribers
/// └──────────────┘              └─────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let (rx, _id) = session.subscribe();
///
/// session.play_background_music("theme.ogg", MusicOptions::default());
/// session.pump();
///
/// while let Ok(event) = rx.try_recv() {
///     println!("{}", event.description());
/// }
/// ```

pub mod bus;
pub mod events;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use events::SessionEvent;
