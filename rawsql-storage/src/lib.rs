//! RAWSQL Storage - Executor Seam, Shape Cache, Materializer and Tracker
//!
//! Everything between a composed query and the entities it yields: the
//! transport abstraction, the process-wide compiled-shape cache, row-to-entity
//! materialization and the per-session identity map.

pub mod cache;
pub mod executor;
pub mod materializer;
pub mod tracker;

pub use executor::SqlExecutor;
pub use materializer::{apply_operators, materialize, IncludeLoader};
pub use tracker::{ChangeTracker, EntityState, EntryInfo, PendingTracking, StagedEntries};

// Re-export cache types for session integration
pub use cache::{
    CacheBackend, CacheConfig, CacheStats, CompiledShape, InMemoryCacheBackend, ShapeCache,
    ShapeKey,
};
