//! RAWSQL Session - Raw SQL Queries over Mapped Entities
//!
//! A [`Database`] owns the SQL executor and the process-wide shape cache.
//! Each [`Session`] is one unit of work with its own change tracker. Raw SQL
//! enters through [`Session::from_sql`], which yields a [`Query`] that
//! composes client-side operators, includes and tracking directives before a
//! single execution.
//!
//! ```ignore
//! let db = Database::new(executor, RawSqlConfig::default())?;
//! let mut session = db.open_session();
//! let customers = session
//!     .from_sql::<Customer>("SELECT * FROM \"Customers\" WHERE \"City\" = {0}", params!["London"])?
//!     .filter(Predicate::contains("ContactName", "z"))
//!     .include(Customer::orders())
//!     .to_list()
//!     .await?;
//! ```

pub mod database;
pub mod query;
pub mod session;

pub use database::Database;
pub use query::Query;
pub use session::{ScopeState, Session};

// Re-export the types callers need to compose queries
pub use rawsql_core::{
    params, Entity, Navigation, Predicate, RawSqlConfig, RawSqlError, RawSqlResult,
    SortDirection, TrackingBehavior, Value,
};
pub use rawsql_storage::{CacheStats, EntityState, EntryInfo, ShapeCache, SqlExecutor};
