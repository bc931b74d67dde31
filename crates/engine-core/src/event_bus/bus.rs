use model::events::Event;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A subscription handle that can be used to unsubscribe from events.
#[derive(Debug, Clone)]
pub struct Subscription {
    event_type_id: TypeId,
    subscriber_id: u64,
}

/// Typed publish/subscribe hub for import lifecycle events.
///
/// Components that emit events hold a clone of the bus; it is injected at
/// construction time rather than registered globally.
#[derive(Clone, Default)]
pub struct EventBus {
    // Map of Event TypeID -> (Map of SubscriberID -> Sender)
    subscribers: Arc<RwLock<HashMap<TypeId, HashMap<u64, Box<dyn Any + Send + Sync>>>>>,
    next_id: Arc<RwLock<u64>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe<E>(&self, sender: mpsc::Sender<Arc<E>>) -> Subscription
    where
        E: Event + Clone,
    {
        let event_type_id = TypeId::of::<E>();

        let subscriber_id = {
            let mut id_lock = self.next_id.write().await;
            let id = *id_lock;
            *id_lock += 1;
            id
        };

        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(event_type_id)
            .or_default()
            .insert(subscriber_id, Box::new(sender));

        debug!(
            event_type = std::any::type_name::<E>(),
            subscriber_id = subscriber_id,
            "Subscribed to event"
        );

        Subscription {
            event_type_id,
            subscriber_id,
        }
    }

    /// Subscribes with a fresh bounded channel and hands back its receiving end.
    pub async fn channel<E>(&self, capacity: usize) -> (Subscription, mpsc::Receiver<Arc<E>>)
    where
        E: Event + Clone,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let subscription = self.subscribe::<E>(tx).await;
        (subscription, rx)
    }

    /// Delivers `event` to every subscriber of its type and returns how many
    /// received it. Slow subscribers with a full channel miss the event.
    pub async fn publish<E>(&self, event: E) -> usize
    where
        E: Event + Clone,
    {
        let event_type_id = TypeId::of::<E>();
        let event_name = event.event_type();
        let event_arc = Arc::new(event);
        let subscribers = self.subscribers.read().await;

        let Some(type_subscribers) = subscribers.get(&event_type_id) else {
            debug!(event = event_name, "No subscribers for event");
            return 0;
        };

        debug!(
            event = event_name,
            subscriber_count = type_subscribers.len(),
            "Publishing event"
        );

        let mut delivered = 0;
        for (subscriber_id, boxed_sender) in type_subscribers.iter() {
            let Some(sender) = boxed_sender.downcast_ref::<mpsc::Sender<Arc<E>>>() else {
                warn!(
                    event = event_name,
                    subscriber_id = subscriber_id,
                    "Failed to downcast sender for subscriber"
                );
                continue;
            };

            match sender.try_send(event_arc.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    event = event_name,
                    subscriber_id = subscriber_id,
                    error = ?e,
                    "Dropped event for slow or closed subscriber"
                ),
            }
        }

        delivered
    }

    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.write().await;

        if let Some(type_subscribers) = subscribers.get_mut(&subscription.event_type_id) {
            type_subscribers.remove(&subscription.subscriber_id);

            debug!(
                subscriber_id = subscription.subscriber_id,
                "Unsubscribed from event"
            );

            if type_subscribers.is_empty() {
                subscribers.remove(&subscription.event_type_id);
            }
        }
    }

    pub async fn subscriber_count<E>(&self) -> usize
    where
        E: Event,
    {
        let event_type_id = TypeId::of::<E>();
        let subscribers = self.subscribers.read().await;

        subscribers
            .get(&event_type_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::events::{QueueEntryDeleted, QueueSaved};

    fn saved(batch_id: &str) -> QueueSaved {
        QueueSaved {
            batch_id: batch_id.to_string(),
            row_count: 3,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_only_to_matching_event_type() {
        let bus = EventBus::new();
        let (_saved_sub, mut saved_rx) = bus.channel::<QueueSaved>(4).await;
        let (_deleted_sub, mut deleted_rx) = bus.channel::<QueueEntryDeleted>(4).await;

        assert_eq!(bus.publish(saved("b1")).await, 1);

        assert_eq!(saved_rx.recv().await.unwrap().batch_id, "b1");
        assert!(deleted_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (sub, mut rx) = bus.channel::<QueueSaved>(4).await;
        assert_eq!(bus.subscriber_count::<QueueSaved>().await, 1);

        bus.unsubscribe(sub).await;
        assert_eq!(bus.subscriber_count::<QueueSaved>().await, 0);
        assert_eq!(bus.publish(saved("b2")).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_event() {
        let bus = EventBus::new();
        let (_sub, _rx) = bus.channel::<QueueSaved>(1).await;

        assert_eq!(bus.publish(saved("first")).await, 1);
        assert_eq!(bus.publish(saved("second")).await, 0);
    }
}
