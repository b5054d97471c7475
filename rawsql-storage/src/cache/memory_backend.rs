//! In-memory shape cache backend with LRU eviction and entry TTL.

use async_trait::async_trait;
use chrono::Utc;
use rawsql_core::{RawSqlResult, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use super::shape::{CompiledShape, ShapeKey};
use super::shape_cache::CacheConfig;
use super::traits::{CacheBackend, CacheStats};

struct Slot {
    shape: Arc<CompiledShape>,
    inserted_at: Timestamp,
    last_used: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<ShapeKey, Slot>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl State {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            debug!(fingerprint = %key.fingerprint(), "evicting least recently used shape");
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// Shape cache backend held in process memory.
pub struct InMemoryCacheBackend {
    state: Mutex<State>,
    max_entries: usize,
    entry_ttl: Duration,
}

impl InMemoryCacheBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_entries: config.max_entries.max(1),
            entry_ttl: config.entry_ttl,
        }
    }

    fn is_expired(&self, slot: &Slot) -> bool {
        Utc::now()
            .signed_duration_since(slot.inserted_at)
            .to_std()
            .map(|age| age > self.entry_ttl)
            .unwrap_or(false)
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &ShapeKey) -> RawSqlResult<Option<Arc<CompiledShape>>> {
        let mut state = self.state.lock().await;
        let tick = state.next_tick();

        let expired = state.entries.get(key).map(|slot| self.is_expired(slot));
        let Some(expired) = expired else {
            state.misses += 1;
            return Ok(None);
        };

        if expired {
            debug!(fingerprint = %key.fingerprint(), "shape expired");
            state.entries.remove(key);
            state.evictions += 1;
            state.misses += 1;
            return Ok(None);
        }

        state.hits += 1;
        Ok(state.entries.get_mut(key).map(|slot| {
            slot.last_used = tick;
            Arc::clone(&slot.shape)
        }))
    }

    async fn peek(&self, key: &ShapeKey) -> RawSqlResult<Option<Arc<CompiledShape>>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .get(key)
            .filter(|slot| !self.is_expired(slot))
            .map(|slot| Arc::clone(&slot.shape)))
    }

    async fn put(&self, key: ShapeKey, shape: Arc<CompiledShape>) -> RawSqlResult<()> {
        let mut state = self.state.lock().await;
        let tick = state.next_tick();

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.max_entries {
                state.evict_lru();
            }
        }

        state.entries.insert(
            key,
            Slot {
                shape,
                inserted_at: Utc::now(),
                last_used: tick,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &ShapeKey) -> RawSqlResult<bool> {
        Ok(self.state.lock().await.entries.remove(key).is_some())
    }

    async fn clear(&self) -> RawSqlResult<u64> {
        let mut state = self.state.lock().await;
        let dropped = state.entries.len() as u64;
        state.entries.clear();
        Ok(dropped)
    }

    async fn stats(&self) -> RawSqlResult<CacheStats> {
        let state = self.state.lock().await;
        Ok(CacheStats {
            hits: state.hits,
            misses: state.misses,
            entry_count: state.entries.len() as u64,
            evictions: state.evictions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawsql_core::{params, Fingerprint, TrackingBehavior};

    fn key(sql: &str) -> ShapeKey {
        ShapeKey::new(
            Fingerprint::new(sql, params![]).unwrap(),
            "Customer",
            Vec::new(),
            TrackingBehavior::TrackAll,
        )
    }

    fn shape(key: &ShapeKey) -> Arc<CompiledShape> {
        Arc::new(CompiledShape::compile(key).unwrap())
    }

    #[tokio::test]
    async fn test_get_counts_hits_and_misses() {
        let backend = InMemoryCacheBackend::default();
        let k = key("SELECT 1");

        assert!(backend.get(&k).await.unwrap().is_none());
        backend.put(k.clone(), shape(&k)).await.unwrap();
        assert!(backend.get(&k).await.unwrap().is_some());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let backend = InMemoryCacheBackend::new(&CacheConfig::new().with_max_entries(2));
        let (a, b, c) = (key("SELECT 'a'"), key("SELECT 'b'"), key("SELECT 'c'"));

        backend.put(a.clone(), shape(&a)).await.unwrap();
        backend.put(b.clone(), shape(&b)).await.unwrap();
        // Touch `a` so `b` becomes the eviction victim.
        backend.get(&a).await.unwrap();
        backend.put(c.clone(), shape(&c)).await.unwrap();

        assert!(backend.get(&a).await.unwrap().is_some());
        assert!(backend.get(&b).await.unwrap().is_none());
        assert!(backend.get(&c).await.unwrap().is_some());
        assert_eq!(backend.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let backend =
            InMemoryCacheBackend::new(&CacheConfig::new().with_ttl(Duration::from_millis(1)));
        let k = key("SELECT 1");
        backend.put(k.clone(), shape(&k)).await.unwrap();
        std::thread::sleep(Duration::from_millis(10));

        assert!(backend.get(&k).await.unwrap().is_none());
        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_peek_leaves_statistics_alone() {
        let backend =
            InMemoryCacheBackend::new(&CacheConfig::new().with_ttl(Duration::from_millis(1)));
        let k = key("SELECT 1");

        assert!(backend.peek(&k).await.unwrap().is_none());
        backend.put(k.clone(), shape(&k)).await.unwrap();
        assert!(backend.peek(&k).await.unwrap().is_some());
        std::thread::sleep(Duration::from_millis(10));
        assert!(backend.peek(&k).await.unwrap().is_none());

        assert_eq!(backend.stats().await.unwrap(), CacheStats {
            hits: 0,
            misses: 0,
            entry_count: 1,
            evictions: 0,
        });
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let backend = InMemoryCacheBackend::default();
        let (a, b) = (key("SELECT 'a'"), key("SELECT 'b'"));
        backend.put(a.clone(), shape(&a)).await.unwrap();
        backend.put(b.clone(), shape(&b)).await.unwrap();

        assert!(backend.remove(&a).await.unwrap());
        assert!(!backend.remove(&a).await.unwrap());
        assert_eq!(backend.clear().await.unwrap(), 1);
        assert_eq!(backend.stats().await.unwrap().entry_count, 0);
    }
}
