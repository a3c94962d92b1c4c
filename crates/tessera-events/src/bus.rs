use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use tessera_core::EngineConfig;

use crate::error::EventError;
use crate::event::{Event, EventRecord};

struct History {
    next_seq: u64,
    records: VecDeque<EventRecord>,
    capacity: usize,
}

/// Per-party event bus.
///
/// Live delivery goes through a tokio broadcast channel; a bounded history
/// lets late callers of [`EventBus::wait_for`] see events that were
/// published before they started waiting.
pub struct EventBus {
    tx: broadcast::Sender<EventRecord>,
    history: Mutex<History>,
}

impl EventBus {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            tx,
            history: Mutex::new(History {
                next_seq: 1,
                records: VecDeque::with_capacity(history_capacity),
                capacity: history_capacity,
            }),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.event_channel_capacity, config.event_history)
    }

    /// Record and broadcast an event. Returns its sequence number.
    pub fn publish(&self, event: Event) -> u64 {
        // held across send so a waiter cannot fall between history and stream
        let mut history = self.lock_history();
        let record = EventRecord {
            seq: history.next_seq,
            at: Utc::now(),
            event,
        };
        history.next_seq += 1;

        tracing::debug!(seq = record.seq, kind = record.event.kind(), "event published");

        if history.capacity > 0 {
            if history.records.len() == history.capacity {
                history.records.pop_front();
            }
            history.records.push_back(record.clone());
        }
        let seq = record.seq;
        // no receivers is fine: nobody is waiting yet
        let _ = self.tx.send(record);
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }

    /// Recorded events, oldest first.
    pub fn history(&self) -> Vec<EventRecord> {
        self.lock_history().records.iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Resolve with the first event matching `predicate`, looking at the
    /// recorded history first and then at live events, or fail with
    /// [`EventError::Timeout`].
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<Event, EventError>
    where
        F: Fn(&Event) -> bool,
    {
        let mut rx = {
            let history = self.lock_history();
            if let Some(record) = history.records.iter().find(|r| predicate(&r.event)) {
                return Ok(record.event.clone());
            }
            self.tx.subscribe()
        };

        let live = async {
            loop {
                match rx.recv().await {
                    Ok(record) if predicate(&record.event) => return Ok(record.event),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event waiter lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(EventError::Closed),
                }
            }
        };

        tokio::time::timeout(timeout, live)
            .await
            .map_err(|_| EventError::Timeout(timeout))?
    }

    /// Wait for any event of the given kind that refers to `nonce`.
    pub async fn wait_for_link(
        &self,
        kind: &str,
        nonce: &str,
        timeout: Duration,
    ) -> Result<Event, EventError> {
        self.wait_for(|e| e.kind() == kind && e.nonce() == Some(nonce), timeout)
            .await
    }

    fn lock_history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn synced(nonce: &str) -> Event {
        Event::LinkSynced {
            nonce: nonce.into(),
            name: "Faber College".into(),
        }
    }

    #[tokio::test]
    async fn test_wait_for_sees_past_event() {
        let bus = EventBus::default();
        bus.publish(synced("n1"));
        let event = bus
            .wait_for_link("link_synced", "n1", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(event, synced("n1"));
    }

    #[tokio::test]
    async fn test_wait_for_live_event() {
        let bus = Arc::new(EventBus::default());
        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish(Event::Pong { nonce: "n2".into() });
        });

        let event = bus
            .wait_for(
                |e| matches!(e, Event::Pong { nonce } if nonce == "n2"),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert_eq!(event.kind(), "pong");
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let bus = EventBus::default();
        bus.publish(synced("other"));
        let result = bus
            .wait_for_link("link_synced", "n3", Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(EventError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_subscribe_receives_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let first = bus.publish(synced("a"));
        let second = bus.publish(synced("b"));
        assert_eq!(second, first + 1);

        assert_eq!(rx.recv().await.unwrap().seq, first);
        assert_eq!(rx.recv().await.unwrap().seq, second);
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new(16, 3);
        for i in 0..5 {
            bus.publish(synced(&format!("n{}", i)));
        }
        let history = bus.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].seq, 3);
        assert_eq!(history[2].event.nonce(), Some("n4"));
    }

    #[test]
    fn test_zero_history_keeps_nothing() {
        let bus = EventBus::new(4, 0);
        bus.publish(synced("x"));
        assert!(bus.history().is_empty());
    }
}
