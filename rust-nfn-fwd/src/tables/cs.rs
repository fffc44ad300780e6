//! Exact-match Content Store with bounded FIFO eviction.

use rust_nfn_common::name::Name;
use rust_nfn_common::packet::Content;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CsEntry {
    content: Content,
    expiry: Option<Instant>,
    static_entry: bool,
}

/// Cache of Content objects keyed by exact name.
///
/// Lookup never does prefix matching: a stored Content is authoritative
/// for the one name it carries. Non-static entries expire after the
/// configured TTL and the oldest insertion is evicted once the store is
/// full; static entries bypass both.
#[derive(Debug)]
pub struct ContentStore {
    entries: HashMap<Name, CsEntry>,
    insertion_order: VecDeque<Name>,
    capacity: usize,
    ttl: Duration,
}

impl ContentStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity,
            ttl,
        }
    }

    pub fn add(&mut self, content: Content, static_entry: bool) {
        let name = content.name.clone();
        let expiry = if static_entry {
            None
        } else {
            Some(Instant::now() + self.ttl)
        };

        if self.entries.contains_key(&name) {
            // Refresh in place; insertion order is unchanged.
            self.entries.insert(
                name,
                CsEntry {
                    content,
                    expiry,
                    static_entry,
                },
            );
            return;
        }

        if !static_entry {
            while self.dynamic_len() >= self.capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
            self.insertion_order.push_back(name.clone());
        }
        self.entries.insert(
            name,
            CsEntry {
                content,
                expiry,
                static_entry,
            },
        );
    }

    /// Exact-name lookup.
    pub fn find(&self, name: &Name) -> Option<Content> {
        self.entries.get(name).map(|entry| entry.content.clone())
    }

    pub fn remove(&mut self, name: &Name) -> Option<Content> {
        self.insertion_order.retain(|n| n != name);
        self.entries.remove(name).map(|entry| entry.content)
    }

    /// Drops expired entries.
    pub fn ageing(&mut self, now: Instant) {
        self.entries
            .retain(|_, entry| entry.expiry.map_or(true, |expiry| expiry > now));
        let entries = &self.entries;
        self.insertion_order.retain(|name| entries.contains_key(name));
    }

    /// Removes all non-static entries.
    pub fn clear(&mut self) {
        self.entries.retain(|_, entry| entry.static_entry);
        self.insertion_order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn dynamic_len(&self) -> usize {
        self.insertion_order.len()
    }

    fn evict_oldest(&mut self) -> bool {
        match self.insertion_order.pop_front() {
            Some(name) => {
                self.entries.remove(&name);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn content(name: &str, payload: &'static [u8]) -> Content {
        Content::new(Name::from_string(name), Bytes::from_static(payload))
    }

    #[test]
    fn exact_match_only() {
        let mut cs = ContentStore::new(16, Duration::from_secs(10));
        cs.add(content("/a/b", b"payload"), false);

        assert!(cs.find(&Name::from_string("/a/b")).is_some());
        assert!(cs.find(&Name::from_string("/a")).is_none());
        assert!(cs.find(&Name::from_string("/a/b/c")).is_none());
    }

    #[test]
    fn fifo_eviction_at_capacity() {
        let mut cs = ContentStore::new(2, Duration::from_secs(10));
        cs.add(content("/1", b"1"), false);
        cs.add(content("/2", b"2"), false);
        cs.add(content("/3", b"3"), false);

        assert!(cs.find(&Name::from_string("/1")).is_none());
        assert!(cs.find(&Name::from_string("/2")).is_some());
        assert!(cs.find(&Name::from_string("/3")).is_some());
    }

    #[test]
    fn static_entries_survive_clear_and_eviction() {
        let mut cs = ContentStore::new(1, Duration::from_secs(10));
        cs.add(content("/static", b"s"), true);
        cs.add(content("/a", b"a"), false);
        cs.add(content("/b", b"b"), false);

        assert!(cs.find(&Name::from_string("/static")).is_some());
        cs.clear();
        assert!(cs.find(&Name::from_string("/static")).is_some());
        assert!(cs.find(&Name::from_string("/b")).is_none());
    }

    #[test]
    fn ageing_drops_expired() {
        let mut cs = ContentStore::new(16, Duration::from_millis(0));
        cs.add(content("/ephemeral", b"x"), false);
        cs.ageing(Instant::now() + Duration::from_millis(1));
        assert!(cs.find(&Name::from_string("/ephemeral")).is_none());
    }
}
