//! Error types for RAWSQL operations

use crate::identity::{EntityKey, ScopeId};
use thiserror::Error;

/// Query composition and binding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid fingerprint: {reason}")]
    InvalidFingerprint { reason: String },

    #[error("Unknown field {field} on {entity}")]
    UnknownField { entity: String, field: String },
}

/// Unit-of-work scope errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Scope {scope_id} is closed")]
    ScopeClosed { scope_id: ScopeId },
}

/// Errors raised while turning rows into entities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MaterializationError {
    #[error("Missing column {column} for {entity}")]
    MissingColumn { entity: String, column: String },

    #[error("Type mismatch for {entity}.{column}: expected {expected}, got {got}")]
    TypeMismatch {
        entity: String,
        column: String,
        expected: String,
        got: String,
    },

    #[error("Unknown navigation {path} on {entity}")]
    UnknownNavigation { entity: String, path: String },

    #[error("Identity conflict: {key} is already tracked as a different type")]
    IdentityConflict { key: EntityKey },
}

/// SQL transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Unknown statement: {sql}")]
    UnknownStatement { sql: String },

    #[error("Malformed row: expected {expected} values, got {got}")]
    MalformedRow { expected: usize, got: usize },

    #[error("Executor failed: {reason}")]
    ExecutorFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all RAWSQL errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RawSqlError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),

    #[error("Materialization error: {0}")]
    Materialization(#[from] MaterializationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for RAWSQL operations.
pub type RawSqlResult<T> = Result<T, RawSqlError>;

// =============================================================================
// TESTS
// =============================================================================
