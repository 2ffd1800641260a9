// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Capacity-bounded, TTL-aware, concurrency-safe LRU cache (§4.2).
//!
//! A single `Mutex` guards an arena-backed intrusive doubly linked list
//! plus a `HashMap` index, the concurrency shape §4.2 explicitly
//! sanctions ("a single mutex protecting the ordered index and the hash
//! map is acceptable"). The arena-of-records-with-index-links idiom
//! mirrors [`crate::btree`]'s node arena.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

type SlotId = usize;

/// Gives an approximate byte size for the bytes budget (§4.2: "Entries
/// whose approximate size cannot be measured default to 1").
pub trait ApproxSize {
    fn approx_size(&self) -> usize;
}

impl ApproxSize for String {
    fn approx_size(&self) -> usize {
        self.len()
    }
}

impl ApproxSize for Vec<u8> {
    fn approx_size(&self) -> usize {
        self.len()
    }
}

impl ApproxSize for crate::document::Document {
    fn approx_size(&self) -> usize {
        serde_json::to_vec(self).map(|b| b.len()).unwrap_or(1).max(1)
    }
}

/// Runtime statistics for a cache instance (§4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_count: usize,
    pub current_bytes: usize,
}

/// Budgets a cache enforces. Any field left `None` is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct LruConfig {
    pub max_items: Option<usize>,
    pub max_bytes: Option<usize>,
    pub default_ttl: Option<Duration>,
}

struct Entry<K, V> {
    key: K,
    value: V,
    size: usize,
    expires_at: Option<Instant>,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

struct Inner<K, V> {
    config: LruConfig,
    arena: Vec<Option<Entry<K, V>>>,
    free_list: Vec<SlotId>,
    index: HashMap<K, SlotId>,
    head: Option<SlotId>, // most recently used
    tail: Option<SlotId>, // least recently used
    current_bytes: usize,
    stats: CacheStatistics,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn new(config: LruConfig) -> Self {
        Self {
            config,
            arena: Vec::new(),
            free_list: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            current_bytes: 0,
            stats: CacheStatistics::default(),
        }
    }

    fn unlink(&mut self, id: SlotId) {
        let (prev, next) = {
            let entry = self.arena[id].as_ref().unwrap();
            (entry.prev, entry.next)
        };
        match prev {
            Some(p) => self.arena[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, id: SlotId) {
        let old_head = self.head;
        {
            let entry = self.arena[id].as_mut().unwrap();
            entry.prev = None;
            entry.next = old_head;
        }
        if let Some(h) = old_head {
            self.arena[h].as_mut().unwrap().prev = Some(id);
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    fn touch(&mut self, id: SlotId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(id);
        self.push_front(id);
    }

    fn remove_slot(&mut self, id: SlotId) -> Entry<K, V> {
        self.unlink(id);
        let entry = self.arena[id].take().unwrap();
        self.free_list.push(id);
        self.index.remove(&entry.key);
        self.current_bytes = self.current_bytes.saturating_sub(entry.size);
        entry
    }

    fn alloc(&mut self, entry: Entry<K, V>) -> SlotId {
        if let Some(id) = self.free_list.pop() {
            self.arena[id] = Some(entry);
            id
        } else {
            self.arena.push(Some(entry));
            self.arena.len() - 1
        }
    }

    fn is_expired(entry: &Entry<K, V>, now: Instant) -> bool {
        matches!(entry.expires_at, Some(t) if now >= t)
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        let mut id = self.tail;
        let mut expired = Vec::new();
        // Expired entries can be anywhere, not just near the tail, since
        // TTL is independent of recency; scan the whole list.
        while let Some(current) = id {
            let entry = self.arena[current].as_ref().unwrap();
            if Self::is_expired(entry, now) {
                expired.push(current);
            }
            id = entry.prev;
        }
        for slot in expired {
            self.remove_slot(slot);
            self.stats.evictions += 1;
        }
    }

    fn enforce_budgets(&mut self) {
        loop {
            let over_count = self.config.max_items.is_some_and(|max| self.index.len() > max);
            let over_bytes = self.config.max_bytes.is_some_and(|max| self.current_bytes > max);
            if !over_count && !over_bytes {
                break;
            }
            let Some(lru) = self.tail else { break };
            self.remove_slot(lru);
            self.stats.evictions += 1;
        }
    }

    fn snapshot_stats(&self) -> CacheStatistics {
        CacheStatistics {
            current_count: self.index.len(),
            current_bytes: self.current_bytes,
            ..self.stats
        }
    }
}

/// A bounded, TTL-aware, thread-safe LRU cache.
///
/// Cloning an `LruCache` shares the same backing store (cheap `Arc`
/// clone), matching §4.2's "Concurrency" contract.
pub struct LruCache<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> Clone for LruCache<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K: Eq + Hash + Clone + Send + 'static, V: Clone + ApproxSize + Send + 'static> LruCache<K, V> {
    /// Creates a cache with the given budgets.
    ///
    /// If called from inside a Tokio runtime, a background sweeper is
    /// spawned that evicts TTL-expired entries every 60 seconds
    /// regardless of access (§4.2/§4.4), bounding the memory held by
    /// entries nobody ever reads again.
    pub fn new(config: LruConfig) -> Self {
        let cache = Self { inner: Arc::new(Mutex::new(Inner::new(config))) };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let weak: Weak<Mutex<Inner<K, V>>> = Arc::downgrade(&cache.inner);
            handle.spawn(sweep_loop(weak));
        }
        cache
    }

    /// Reads a value, promoting it to most-recently-used on hit.
    ///
    /// An expired entry counts as a miss and is evicted immediately
    /// (§4.2: "expired entries are treated as miss and evicted lazily").
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let Some(&id) = inner.index.get(key) else {
            inner.stats.misses += 1;
            return None;
        };
        let expired = Inner::is_expired(inner.arena[id].as_ref().unwrap(), Instant::now());
        if expired {
            inner.remove_slot(id);
            inner.stats.evictions += 1;
            inner.stats.misses += 1;
            return None;
        }
        inner.touch(id);
        inner.stats.hits += 1;
        Some(inner.arena[id].as_ref().unwrap().value.clone())
    }

    /// Inserts or replaces `key`, promoting it to most-recently-used,
    /// then evicts while any budget is exceeded (§4.2).
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let mut inner = self.inner.lock().unwrap();
        let size = value.approx_size().max(1);
        let expires_at = ttl.or(inner.config.default_ttl).map(|d| Instant::now() + d);

        if let Some(&id) = inner.index.get(&key) {
            inner.current_bytes = inner.current_bytes.saturating_sub(inner.arena[id].as_ref().unwrap().size);
            {
                let entry = inner.arena[id].as_mut().unwrap();
                entry.value = value;
                entry.size = size;
                entry.expires_at = expires_at;
            }
            inner.current_bytes += size;
            inner.touch(id);
        } else {
            let entry = Entry { key: key.clone(), value, size, expires_at, prev: None, next: None };
            let id = inner.alloc(entry);
            inner.index.insert(key, id);
            inner.push_front(id);
            inner.current_bytes += size;
        }
        inner.enforce_budgets();
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.index.get(key).copied() {
            Some(id) => {
                inner.remove_slot(id);
                true
            }
            None => false,
        }
    }

    /// Resets contents and statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = Inner::new(inner.config);
    }

    pub fn get_statistics(&self) -> CacheStatistics {
        self.inner.lock().unwrap().snapshot_stats()
    }

    /// Removes expired entries eagerly; normally done by the background
    /// sweeper but exposed for deterministic tests.
    pub fn sweep_expired(&self) {
        self.inner.lock().unwrap().evict_expired();
    }
}

async fn sweep_loop<K, V>(weak: Weak<Mutex<Inner<K, V>>>)
where
    K: Eq + Hash + Clone,
{
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    interval.tick().await; // first tick fires immediately; skip it
    loop {
        interval.tick().await;
        let Some(inner) = weak.upgrade() else { return };
        inner.lock().unwrap().evict_expired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_lru_when_over_count_budget() {
        let cache: LruCache<&str, String> =
            LruCache::new(LruConfig { max_items: Some(3), max_bytes: None, default_ttl: None });
        cache.set("a", "a".to_string(), None);
        cache.set("b", "b".to_string(), None);
        cache.set("c", "c".to_string(), None);
        cache.set("d", "d".to_string(), None);

        assert_eq!(cache.get(&"a"), None);
        let stats = cache.get_statistics();
        assert_eq!(stats.current_count, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn get_promotes_to_most_recently_used() {
        let cache: LruCache<&str, String> =
            LruCache::new(LruConfig { max_items: Some(2), max_bytes: None, default_ttl: None });
        cache.set("a", "a".to_string(), None);
        cache.set("b", "b".to_string(), None);
        cache.get(&"a"); // a is now MRU, b is LRU
        cache.set("c", "c".to_string(), None); // evicts b, not a

        assert_eq!(cache.get(&"a"), Some("a".to_string()));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn remove_returns_presence() {
        let cache: LruCache<&str, String> = LruCache::new(LruConfig::default());
        cache.set("a", "a".to_string(), None);
        assert!(cache.remove(&"a"));
        assert!(!cache.remove(&"a"));
    }

    #[test]
    fn clear_resets_contents_and_statistics() {
        let cache: LruCache<&str, String> = LruCache::new(LruConfig::default());
        cache.set("a", "a".to_string(), None);
        cache.get(&"a");
        cache.clear();
        assert_eq!(cache.get_statistics(), CacheStatistics::default());
    }

    #[test]
    fn expired_entry_counts_as_miss_and_is_evicted() {
        let cache: LruCache<&str, String> = LruCache::new(LruConfig::default());
        cache.set("a", "a".to_string(), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get_statistics().current_count, 0);
    }

    #[test]
    fn bytes_budget_evicts_until_within_limit() {
        let cache: LruCache<&str, String> =
            LruCache::new(LruConfig { max_items: None, max_bytes: Some(5), default_ttl: None });
        cache.set("a", "aaa".to_string(), None); // 3 bytes
        cache.set("b", "bbb".to_string(), None); // would bring total to 6 > 5, evicts a
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some("bbb".to_string()));
        assert!(cache.get_statistics().current_bytes <= 5);
    }

    #[test]
    fn hits_plus_misses_equals_get_calls() {
        let cache: LruCache<&str, String> = LruCache::new(LruConfig::default());
        cache.set("a", "a".to_string(), None);
        cache.get(&"a");
        cache.get(&"missing");
        cache.get(&"a");
        let stats = cache.get_statistics();
        assert_eq!(stats.hits + stats.misses, 3);
    }

    #[test]
    fn sweep_expired_removes_stale_entries_without_access() {
        let cache: LruCache<&str, String> = LruCache::new(LruConfig::default());
        cache.set("a", "a".to_string(), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        cache.sweep_expired();
        assert_eq!(cache.get_statistics().current_count, 0);
    }
}
