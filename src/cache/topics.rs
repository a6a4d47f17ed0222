use std::collections::HashSet;

/// Topic addressing a single device: the configured prefix followed by its numeric ID.
pub fn device_topic(prefix: &str, device_id: u64) -> String {
    format!("{}{}", prefix, device_id)
}

/// Set of topics seen during a session, in the order they were first seen.
#[derive(Debug, Default, Clone)]
pub struct KnownTopics {
    order: Vec<String>,
    index: HashSet<String>,
}

impl KnownTopics {
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut topics = Self::default();
        for topic in initial {
            topics.insert(topic);
        }
        topics
    }

    /// Adds a topic, returning `true` only the first time it is seen.
    pub fn insert(&mut self, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        if self.index.contains(&topic) {
            return false;
        }
        self.index.insert(topic.clone());
        self.order.push(topic);
        true
    }

    pub fn remove(&mut self, topic: &str) -> bool {
        if !self.index.remove(topic) {
            return false;
        }
        self.order.retain(|known| known != topic);
        true
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.index.contains(topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_and_keeps_first_seen_order() {
        let mut topics = KnownTopics::new(["queue/b", "queue/a"]);
        assert!(topics.insert("queue/c"));
        assert!(!topics.insert("queue/a"));

        assert_eq!(topics.to_vec(), vec!["queue/b", "queue/a", "queue/c"]);
    }

    #[test]
    fn remove_forgets_topic() {
        let mut topics = KnownTopics::new(["queue/a", "queue/b"]);
        assert!(topics.remove("queue/a"));
        assert!(!topics.remove("queue/a"));
        assert!(!topics.contains("queue/a"));
        assert_eq!(topics.len(), 1);
        assert!(topics.insert("queue/a"));
    }

    #[test]
    fn device_topic_appends_numeric_id() {
        assert_eq!(device_topic("queue/nchs-device-", 42), "queue/nchs-device-42");
    }
}
