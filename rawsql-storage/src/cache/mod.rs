//! Compiled-shape cache.
//!
//! A raw SQL query is translated once per [`ShapeKey`]: its fingerprint
//! (exact SQL text plus ordered parameter values), the target entity type,
//! the composed operator nodes, and the effective tracking mode. Later
//! queries with an equal key reuse the [`CompiledShape`].
//!
//! # Example
//!
//! ```ignore
//! let key = ShapeKey::new(fingerprint, Customer::ENTITY_NAME, nodes, tracking);
//! let shape = cache.get_or_compute(&key, || CompiledShape::compile(&key)).await?;
//! let rows = executor.execute(shape.command()).await?;
//! ```

pub mod memory_backend;
pub mod shape;
pub mod shape_cache;
pub mod traits;

pub use memory_backend::InMemoryCacheBackend;
pub use shape::{CompiledShape, ShapeKey};
pub use shape_cache::{CacheConfig, ShapeCache};
pub use traits::{CacheBackend, CacheStats};
