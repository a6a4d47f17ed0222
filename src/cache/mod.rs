//! # Message Cache
//!
//! Bounded per-topic rolling window of decoded envelopes.
//!
//! Each topic keeps its messages in arrival order. Once a topic holds
//! `max_messages` entries the next append first evicts the oldest one, so the
//! count per topic never exceeds the cap. Appends and evictions are announced
//! through the shared [`Notifier`] (eviction first, then the addition).
//!
//! The cache is owned by the session task; other tasks only ever see
//! `Arc<CachedMessage>` snapshots.

mod topics;

pub use topics::{device_topic, KnownTopics};

use crate::events::{Notifier, SnifferEvent};
use crate::icd::Envelope;
use crate::view::format_device_id;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// A decoded envelope as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedMessage {
    /// Session scoped, strictly increasing, first message is 1
    pub id: u64,
    pub topic: String,
    pub device_mac: String,
    pub envelope: Envelope,
    pub received_at: DateTime<Local>,
}

/// Result of a single append.
#[derive(Debug, Clone)]
pub struct Appended {
    pub stored: Arc<CachedMessage>,
    pub evicted: Option<Arc<CachedMessage>>,
}

#[derive(Debug)]
pub struct MessageCache {
    max_messages: NonZeroUsize,
    topics: HashMap<String, VecDeque<Arc<CachedMessage>>>,
    last_id: u64,
    notifier: Notifier,
}

impl MessageCache {
    pub fn new(max_messages: NonZeroUsize, notifier: Notifier) -> Self {
        Self {
            max_messages,
            topics: HashMap::new(),
            last_id: 0,
            notifier,
        }
    }

    pub fn max_messages(&self) -> NonZeroUsize {
        self.max_messages
    }

    /// Changes the per-topic cap. Topics above the new cap lose their oldest
    /// entries right away, each one announced as an eviction.
    pub fn set_max_messages(&mut self, max_messages: NonZeroUsize) {
        self.max_messages = max_messages;
        for queue in self.topics.values_mut() {
            while queue.len() > max_messages.get() {
                if let Some(evicted) = queue.pop_front() {
                    self.notifier.emit(SnifferEvent::MessageEvicted(evicted));
                }
            }
        }
    }

    /// Stores `envelope` at the end of `topic`'s window, evicting the oldest
    /// entry first if the window is full.
    pub fn append(&mut self, topic: &str, envelope: Envelope) -> Appended {
        let queue = self.topics.entry(topic.to_string()).or_default();

        let evicted = if queue.len() >= self.max_messages.get() {
            queue.pop_front()
        } else {
            None
        };

        self.last_id += 1;
        let stored = Arc::new(CachedMessage {
            id: self.last_id,
            topic: topic.to_string(),
            device_mac: format_device_id(envelope.device_id),
            envelope,
            received_at: Local::now(),
        });
        queue.push_back(stored.clone());

        if let Some(evicted) = &evicted {
            debug!("Evicted message {} from {}", evicted.id, topic);
            self.notifier
                .emit(SnifferEvent::MessageEvicted(evicted.clone()));
        }
        self.notifier.emit(SnifferEvent::MessageAdded(stored.clone()));

        Appended { stored, evicted }
    }

    /// Snapshot of a topic's messages in arrival order, empty for unknown topics.
    pub fn get(&self, topic: &str) -> Vec<Arc<CachedMessage>> {
        self.topics
            .get(topic)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, topic: &str) -> usize {
        self.topics.get(topic).map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// Empties a topic in place.
    pub fn clear(&mut self, topic: &str) {
        if let Some(queue) = self.topics.get_mut(topic) {
            debug!("Clearing {} messages from {}", queue.len(), topic);
            queue.clear();
        }
    }

    /// Drops a topic's window entirely.
    pub fn remove(&mut self, topic: &str) -> usize {
        self.topics.remove(topic).map(|queue| queue.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icd::MessageType;
    use tokio::sync::broadcast;

    fn envelope(seq_num: i64) -> Envelope {
        Envelope {
            msg_type: MessageType::Sleep,
            icd_version: 1,
            seq_num,
            timestamp: "2024-05-01T12:30:00Z".to_string(),
            device_id: 7,
            payload: "{\"sleep_on\":true}".to_string(),
        }
    }

    fn cache(max: usize) -> (MessageCache, broadcast::Receiver<SnifferEvent>) {
        let notifier = Notifier::new(64);
        let events = notifier.subscribe();
        let max = NonZeroUsize::new(max).unwrap();
        (MessageCache::new(max, notifier), events)
    }

    fn drain(events: &mut broadcast::Receiver<SnifferEvent>) -> Vec<SnifferEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    fn seq_nums(cache: &MessageCache, topic: &str) -> Vec<i64> {
        cache
            .get(topic)
            .iter()
            .map(|message| message.envelope.seq_num)
            .collect()
    }

    #[test]
    fn keeps_the_last_max_messages_in_arrival_order() {
        let (mut cache, _events) = cache(3);
        for seq in 1..=10 {
            cache.append("queue/a", envelope(seq));
        }

        assert_eq!(cache.len("queue/a"), 3);
        assert_eq!(seq_nums(&cache, "queue/a"), vec![8, 9, 10]);
    }

    #[test]
    fn ids_start_at_one_and_increase_across_topics() {
        let (mut cache, _events) = cache(5);
        let first = cache.append("queue/a", envelope(1));
        let second = cache.append("queue/b", envelope(1));

        assert_eq!(first.stored.id, 1);
        assert_eq!(second.stored.id, 2);
        assert_eq!(first.stored.device_mac, "00:00:00:00:00:07");
    }

    #[test]
    fn full_topic_evicts_exactly_the_oldest_entry() {
        let (mut cache, mut events) = cache(2);
        let oldest = cache.append("queue/a", envelope(1)).stored;
        cache.append("queue/a", envelope(2));
        drain(&mut events);

        let appended = cache.append("queue/a", envelope(3));

        assert_eq!(appended.evicted.as_ref(), Some(&oldest));
        let seen = drain(&mut events);
        assert_eq!(
            seen,
            vec![
                SnifferEvent::MessageEvicted(oldest),
                SnifferEvent::MessageAdded(appended.stored.clone()),
            ]
        );
    }

    #[test]
    fn appends_below_the_cap_do_not_evict() {
        let (mut cache, mut events) = cache(4);
        cache.append("queue/a", envelope(1));
        let appended = cache.append("queue/a", envelope(2));

        assert!(appended.evicted.is_none());
        let evictions = drain(&mut events)
            .into_iter()
            .filter(|event| matches!(event, SnifferEvent::MessageEvicted(_)))
            .count();
        assert_eq!(evictions, 0);
    }

    #[test]
    fn clear_only_touches_one_topic() {
        let (mut cache, _events) = cache(4);
        cache.append("queue/a", envelope(1));
        cache.append("queue/b", envelope(2));

        cache.clear("queue/a");

        assert!(cache.is_empty("queue/a"));
        assert_eq!(seq_nums(&cache, "queue/b"), vec![2]);
        cache.append("queue/a", envelope(3));
        assert_eq!(seq_nums(&cache, "queue/a"), vec![3]);
    }

    #[test]
    fn unknown_topic_is_empty() {
        let (cache, _events) = cache(4);
        assert!(cache.get("queue/none").is_empty());
    }

    #[test]
    fn shrinking_the_cap_trims_and_announces() {
        let (mut cache, mut events) = cache(4);
        for seq in 1..=4 {
            cache.append("queue/a", envelope(seq));
        }
        drain(&mut events);

        cache.set_max_messages(NonZeroUsize::new(2).unwrap());

        assert_eq!(seq_nums(&cache, "queue/a"), vec![3, 4]);
        let evicted: Vec<i64> = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                SnifferEvent::MessageEvicted(message) => Some(message.envelope.seq_num),
                _ => None,
            })
            .collect();
        assert_eq!(evicted, vec![1, 2]);
    }
}
