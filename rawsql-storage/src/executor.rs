//! SQL transport seam.

use async_trait::async_trait;
use rawsql_core::{RawSqlResult, RowSet, SqlCommand};

/// Executes parameterized commands against the underlying database.
///
/// This trait abstracts over the actual transport, allowing the query
/// pipeline to work with any connection implementation. Implementations
/// must be thread-safe; a single executor is shared by every session of a
/// database handle.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a command and return its full result set.
    async fn execute(&self, command: &SqlCommand) -> RawSqlResult<RowSet>;
}
