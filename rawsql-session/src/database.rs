//! Shared database handle.

use rawsql_core::{RawSqlConfig, RawSqlResult};
use rawsql_storage::{CacheConfig, ShapeCache, SqlExecutor};
use std::sync::Arc;
use tracing::info;

use crate::session::Session;

/// Entry point shared by every session.
///
/// Cloning is cheap; clones share the executor, the shape cache and the
/// configuration.
#[derive(Clone)]
pub struct Database {
    executor: Arc<dyn SqlExecutor>,
    cache: Arc<ShapeCache>,
    config: Arc<RawSqlConfig>,
}

impl Database {
    /// Create a handle with its own in-memory shape cache.
    pub fn new(executor: Arc<dyn SqlExecutor>, config: RawSqlConfig) -> RawSqlResult<Self> {
        let cache = Arc::new(ShapeCache::in_memory(CacheConfig::from(&config)));
        Self::with_cache(executor, config, cache)
    }

    /// Create a handle over an existing shape cache, e.g. one shared by
    /// several databases in the same process.
    pub fn with_cache(
        executor: Arc<dyn SqlExecutor>,
        config: RawSqlConfig,
        cache: Arc<ShapeCache>,
    ) -> RawSqlResult<Self> {
        config.validate()?;
        info!(
            shape_cache_capacity = config.shape_cache_capacity,
            default_tracking = ?config.default_tracking,
            "database handle created"
        );
        Ok(Self {
            executor,
            cache,
            config: Arc::new(config),
        })
    }

    /// Open a new unit of work.
    pub fn open_session(&self) -> Session {
        Session::open(self.clone())
    }

    pub fn shape_cache(&self) -> &ShapeCache {
        &self.cache
    }

    pub fn executor(&self) -> &dyn SqlExecutor {
        self.executor.as_ref()
    }

    pub fn config(&self) -> &RawSqlConfig {
        &self.config
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
