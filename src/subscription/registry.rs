use super::key::{key_matches_prefix, key_matches_topic};
use super::listener::Listener;

/// Listeners registered under one subscription key.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    pub key: String,
    pub listeners: Vec<Listener>,
}

/// Subscription key → listeners, both in insertion order.
///
/// A key never maps to an empty list: it is dropped together with its last
/// listener.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener under `key` and returns how many the key now holds.
    pub fn add(&mut self, key: String, listener: Listener) -> usize {
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.listeners.push(listener);
                entry.listeners.len()
            }
            None => {
                self.entries.push(SubscriptionEntry {
                    key,
                    listeners: vec![listener],
                });
                1
            }
        }
    }

    pub fn listeners(&self, key: &str) -> Option<&[Listener]> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.listeners.as_slice())
    }

    pub fn has_listeners(&self, key: &str) -> bool {
        self.listeners(key).is_some_and(|listeners| !listeners.is_empty())
    }

    /// Keys that currently hold at least one listener.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.listeners.is_empty())
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|entry| entry.listeners.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of the entries whose key belongs to `topic`.
    pub fn matching(&self, topic: &str) -> Vec<SubscriptionEntry> {
        self.entries
            .iter()
            .filter(|entry| key_matches_topic(&entry.key, topic))
            .cloned()
            .collect()
    }

    /// Drops every key belonging to `topic`. Returns whether anything was removed.
    pub fn remove_topic(&mut self, topic: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !key_matches_topic(&entry.key, topic));
        self.entries.len() != before
    }

    /// Drops every key starting with `prefix`. Returns whether anything was removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !key_matches_prefix(&entry.key, prefix));
        self.entries.len() != before
    }

    /// Removes one occurrence of `listener` from every key belonging to `topic`.
    ///
    /// Returns whether at least one key lost its last listener (and was
    /// therefore dropped).
    pub fn remove_listener(&mut self, topic: &str, listener: &Listener) -> bool {
        let mut key_dropped = false;

        for entry in self
            .entries
            .iter_mut()
            .filter(|entry| key_matches_topic(&entry.key, topic))
        {
            let Some(position) = entry.listeners.iter().position(|l| l == listener) else {
                continue;
            };
            entry.listeners.remove(position);
            if entry.listeners.is_empty() {
                key_dropped = true;
            }
        }

        self.entries.retain(|entry| !entry.listeners.is_empty());
        key_dropped
    }
}
