//! Compute-once cache of compiled query shapes.
//!
//! This module implements the core caching logic: look a shape key up in the
//! backend, translate on miss, and store the result so later queries with the
//! same key skip translation.

use rawsql_core::{RawSqlConfig, RawSqlResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use super::memory_backend::InMemoryCacheBackend;
use super::shape::{CompiledShape, ShapeKey};
use super::traits::{CacheBackend, CacheStats};

/// Configuration for the shape cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of shapes kept before LRU eviction.
    pub max_entries: usize,
    /// Age after which a shape is recompiled.
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let defaults = RawSqlConfig::default();
        Self {
            max_entries: defaults.shape_cache_capacity,
            entry_ttl: defaults.shape_cache_ttl,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }
}

impl From<&RawSqlConfig> for CacheConfig {
    fn from(config: &RawSqlConfig) -> Self {
        Self {
            max_entries: config.shape_cache_capacity,
            entry_ttl: config.shape_cache_ttl,
        }
    }
}

/// Process-wide cache of compiled shapes.
///
/// Translation runs at most once per key. Hits are served without locking
/// beyond the backend's own; misses are serialized behind a gate and
/// re-checked under it, so a caller racing another caller for the same key
/// receives the shape the first one stored.
///
/// # Example
///
/// ```ignore
/// let cache = ShapeCache::in_memory(CacheConfig::default());
/// let shape = cache
///     .get_or_compute(&key, || CompiledShape::compile(&key))
///     .await?;
/// ```
pub struct ShapeCache {
    /// The cache backend.
    backend: Arc<dyn CacheBackend>,
    /// Serializes re-check-then-compute on a miss.
    compute_gate: Mutex<()>,
    /// Cache configuration.
    config: CacheConfig,
}

impl ShapeCache {
    /// Create a new shape cache over a backend.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            compute_gate: Mutex::new(()),
            config,
        }
    }

    /// Create a shape cache over an in-memory backend.
    pub fn in_memory(config: CacheConfig) -> Self {
        let backend = Arc::new(InMemoryCacheBackend::new(&config));
        Self::new(backend, config)
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }

    /// Return the cached shape for `key`, or run `compute` and cache it.
    ///
    /// A failing `compute` caches nothing; the error goes to the caller.
    pub async fn get_or_compute<F>(
        &self,
        key: &ShapeKey,
        compute: F,
    ) -> RawSqlResult<Arc<CompiledShape>>
    where
        F: FnOnce() -> RawSqlResult<CompiledShape>,
    {
        if let Some(shape) = self.backend.get(key).await? {
            debug!(fingerprint = %key.fingerprint(), entity = key.entity(), "shape cache hit");
            return Ok(shape);
        }

        let _gate = self.compute_gate.lock().await;
        if let Some(shape) = self.backend.peek(key).await? {
            debug!(fingerprint = %key.fingerprint(), entity = key.entity(), "shape compiled concurrently");
            return Ok(shape);
        }

        debug!(fingerprint = %key.fingerprint(), entity = key.entity(), "shape cache miss, compiling");
        let shape = Arc::new(compute()?);
        self.backend.put(key.clone(), Arc::clone(&shape)).await?;
        Ok(shape)
    }

    /// Invalidate a single shape.
    pub async fn invalidate(&self, key: &ShapeKey) -> RawSqlResult<bool> {
        self.backend.remove(key).await
    }

    /// Invalidate every cached shape.
    pub async fn clear(&self) -> RawSqlResult<u64> {
        self.backend.clear().await
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> RawSqlResult<CacheStats> {
        self.backend.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawsql_core::{params, Fingerprint, QueryError, RawSqlError, TrackingBehavior};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BY_CITY: &str = "SELECT * FROM \"Customers\" WHERE \"City\" = {0}";

    fn key(city: &str) -> ShapeKey {
        ShapeKey::new(
            Fingerprint::new(BY_CITY, params![city]).unwrap(),
            "Customer",
            Vec::new(),
            TrackingBehavior::TrackAll,
        )
    }

    #[tokio::test]
    async fn test_compute_runs_once_per_key() {
        let cache = ShapeCache::in_memory(CacheConfig::default());
        let calls = AtomicUsize::new(0);
        let k = key("London");

        for _ in 0..3 {
            cache
                .get_or_compute(&k, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    CompiledShape::compile(&k)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test]
    async fn test_hits_do_not_wait_for_the_compute_gate() {
        let cache = ShapeCache::in_memory(CacheConfig::default());
        let k = key("London");
        cache
            .get_or_compute(&k, || CompiledShape::compile(&k))
            .await
            .unwrap();

        let _held = cache.compute_gate.lock().await;
        let hit = tokio::time::timeout(
            Duration::from_secs(5),
            cache.get_or_compute(&k, || panic!("cached shape must not be recompiled")),
        )
        .await;

        assert!(matches!(hit, Ok(Ok(_))));
        assert_eq!(cache.stats().await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_compute_once() {
        let cache = ShapeCache::in_memory(CacheConfig::default());
        let calls = AtomicUsize::new(0);
        let k = key("Madrid");
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            CompiledShape::compile(&k)
        };

        let (a, b) = tokio::join!(
            cache.get_or_compute(&k, compute),
            cache.get_or_compute(&k, compute)
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_parameter_change_yields_distinct_shape() {
        let cache = ShapeCache::in_memory(CacheConfig::default());
        let london = key("London");
        let madrid = key("Madrid");

        let a = cache
            .get_or_compute(&london, || CompiledShape::compile(&london))
            .await
            .unwrap();
        let b = cache
            .get_or_compute(&madrid, || CompiledShape::compile(&madrid))
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.command().values(), params!["London"]);
        assert_eq!(b.command().values(), params!["Madrid"]);
        assert_eq!(cache.stats().await.unwrap().entry_count, 2);
    }

    #[tokio::test]
    async fn test_failed_compute_is_not_cached() {
        let cache = ShapeCache::in_memory(CacheConfig::default());
        let k = key("London");

        let err = cache
            .get_or_compute(&k, || {
                Err(QueryError::InvalidFingerprint {
                    reason: "forced".to_string(),
                }
                .into())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RawSqlError::Query(_)));
        assert_eq!(cache.stats().await.unwrap().entry_count, 0);

        cache
            .get_or_compute(&k, || CompiledShape::compile(&k))
            .await
            .unwrap();
        assert_eq!(cache.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = ShapeCache::in_memory(CacheConfig::default());
        let k = key("London");
        let first = cache
            .get_or_compute(&k, || CompiledShape::compile(&k))
            .await
            .unwrap();

        assert!(cache.invalidate(&k).await.unwrap());
        let second = cache
            .get_or_compute(&k, || CompiledShape::compile(&k))
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_max_entries(5000)
            .with_ttl(Duration::from_secs(1800));

        assert_eq!(config.max_entries, 5000);
        assert_eq!(config.entry_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_cache_config_from_rawsql_config() {
        let config = CacheConfig::from(&RawSqlConfig::default().with_shape_cache_capacity(7));
        assert_eq!(config.max_entries, 7);
    }
}
