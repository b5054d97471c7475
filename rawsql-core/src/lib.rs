//! RAWSQL Core - Value, Entity and Fingerprint Types
//!
//! Pure data structures shared by every other crate: scalar values and rows,
//! the mapped-entity contract, query fingerprints, client-side predicates,
//! errors and configuration. No I/O lives here.

pub mod config;
pub mod entity;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod predicate;
pub mod value;

pub use config::{RawSqlConfig, TrackingBehavior};
pub use entity::{Entity, Navigation};
pub use error::{
    ConfigError, ExecutionError, MaterializationError, QueryError, RawSqlError, RawSqlResult,
    ScopeError,
};
pub use fingerprint::{Fingerprint, SqlCommand, SqlParameter};
pub use identity::{EntityKey, ScopeId, Timestamp};
pub use predicate::{ClientOperator, Predicate, QueryNode, SortDirection};
pub use value::{Row, RowReader, RowSet, Value};
