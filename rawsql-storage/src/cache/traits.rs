//! Cache backend trait and statistics.
//!
//! This module defines the trait that must be implemented by shape cache
//! backends.

use async_trait::async_trait;
use rawsql_core::RawSqlResult;
use std::sync::Arc;

use super::shape::{CompiledShape, ShapeKey};

/// Cache backend trait for pluggable shape storage.
///
/// Implementations should be thread-safe and support concurrent access.
/// The backend owns eviction policy; the [`ShapeCache`](super::ShapeCache)
/// on top of it owns the compute-once contract.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a shape from the cache, counting a hit or a miss.
    async fn get(&self, key: &ShapeKey) -> RawSqlResult<Option<Arc<CompiledShape>>>;

    /// Get a live shape without touching statistics.
    async fn peek(&self, key: &ShapeKey) -> RawSqlResult<Option<Arc<CompiledShape>>>;

    /// Put a shape into the cache, evicting if over capacity.
    async fn put(&self, key: ShapeKey, shape: Arc<CompiledShape>) -> RawSqlResult<()>;

    /// Remove a single shape. Returns whether it was present.
    async fn remove(&self, key: &ShapeKey) -> RawSqlResult<bool>;

    /// Remove every shape. Returns how many were dropped.
    async fn clear(&self) -> RawSqlResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> RawSqlResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity or expiry.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
