/// Event bus for session notifications
///
/// Fan-out of `SessionEvent`s to any number of subscribers. Subscribers whose
/// receiver was dropped are pruned on the next publish.
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use super::events::SessionEvent;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<SessionEvent>,
}

#[derive(Default)]
struct BusState {
    subscribers: Vec<Subscriber>,
    next_id: usize,
}

/// Shared handle to the bus; clones publish to the same subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<RwLock<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<SessionEvent>, SubscriberId) {
        let (tx, rx) = unbounded();

        let mut state = self.state.write();
        let id = SubscriberId(state.next_id);
        state.next_id += 1;
        state.subscribers.push(Subscriber { id, sender: tx });

        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.state.write().subscribers.retain(|s| s.id != id);
    }

    /// Publish an event to all subscribers (non-blocking)
    pub fn publish(&self, event: SessionEvent) {
        let mut gone = Vec::new();
        {
            let state = self.state.read();
            for subscriber in state.subscribers.iter() {
                if let Err(TrySendError::Disconnected(_)) = subscriber.sender.try_send(event.clone()) {
                    gone.push(subscriber.id);
                }
            }
        }

        if !gone.is_empty() {
            self.state.write().subscribers.retain(|s| !gone.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.read().subscribers.len()
    }

    pub fn clear(&self) {
        self.state.write().subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let (_rx, id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let (rx1, _id1) = bus.subscribe();
        let (rx2, _id2) = bus.subscribe();

        bus.publish(SessionEvent::Disposed);

        assert_eq!(rx1.try_recv().unwrap(), SessionEvent::Disposed);
        assert_eq!(rx2.try_recv().unwrap(), SessionEvent::Disposed);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let (_keep, _id) = bus.subscribe();
        drop(rx);

        bus.publish(SessionEvent::Unlocked { flushed: 0 });
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let (_rx, _id) = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);

        bus2.clear();
        assert_eq!(bus1.subscriber_count(), 0);
    }
}
