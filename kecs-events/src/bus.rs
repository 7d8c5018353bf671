//! In-process single-producer/multi-consumer fan-out (spec.md §4.9).
//! `tokio::sync::broadcast` already gives us "bounded buffer, drop oldest
//! on overflow, lagging receivers get told" — exactly the delivery
//! contract the spec asks for, so subscribers just need to swallow
//! `Lagged` and keep reading.

use tokio::sync::broadcast;

use crate::event::Event;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        EventBus { tx }
    }

    /// Best-effort: if nobody is subscribed, the send is simply dropped.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: None,
        }
    }

    /// A subscription that only surfaces events whose `kind()` is in
    /// `kinds` — e.g. the TUI caring only about `CreationStatus`.
    pub fn subscribe_filtered(&self, kinds: Vec<&'static str>) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: Some(kinds),
        }
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    kinds: Option<Vec<&'static str>>,
}

impl Subscription {
    fn matches(&self, event: &Event) -> bool {
        match &self.kinds {
            None => true,
            Some(kinds) => kinds.contains(&event.kind()),
        }
    }

    /// Waits for the next event matching this subscription's filter,
    /// transparently skipping ones that don't and swallowing `Lagged`
    /// (spec.md: "delivery is best-effort... drop oldest on overflow").
    /// Returns `None` once the bus itself has been dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, dropping oldest");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        bus.publish(Event::ClusterChanged {
            cluster_arn: "arn:aws:ecs:us-east-1:000000000000:cluster/default".to_string(),
        });
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind(), "ClusterChanged");
    }

    #[tokio::test]
    async fn filtered_subscriber_skips_other_kinds() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe_filtered(vec!["TaskStateChanged"]);
        bus.publish(Event::ClusterChanged {
            cluster_arn: "arn:1".to_string(),
        });
        bus.publish(Event::TaskStateChanged {
            task_arn: "arn:2".to_string(),
            last_status: "RUNNING".to_string(),
        });
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind(), "TaskStateChanged");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.publish(Event::LocalStackEvent {
            message: "started".to_string(),
        });
    }
}
