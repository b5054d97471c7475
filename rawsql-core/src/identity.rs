//! Identity types for RAWSQL entities and scopes

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a unit-of-work scope.
/// UUIDv7 so scope ids sort by the time the scope was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// Create a new timestamp-sortable scope id.
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    /// The nil scope id.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Wrap an existing UUID.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a tracked entity: entity type name plus primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    entity: &'static str,
    key: Value,
}

impl EntityKey {
    pub fn new(entity: &'static str, key: Value) -> Self {
        Self { entity, key }
    }

    /// Name of the entity type.
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Primary key value.
    pub fn key(&self) -> &Value {
        &self.key
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity, self.key)
    }
}
