//! Mapped entity contract and navigation declarations

use crate::error::RawSqlResult;
use crate::identity::EntityKey;
use crate::value::{Row, Value};

/// A type that raw SQL rows can be projected into.
///
/// # Implementation Requirements
///
/// - `ENTITY_NAME` must be unique per type; it is half of the identity key
/// - `primary_key()` must be stable for the lifetime of the instance
/// - `from_row()` must read columns by name so column order does not matter
/// - `field()` returns `None` only for names the entity does not map
pub trait Entity: Clone + Send + Sync + 'static {
    /// Entity type name, used in identity keys and error messages.
    const ENTITY_NAME: &'static str;

    /// Table backing the entity set (`SELECT * FROM "<TABLE>"`).
    const TABLE: &'static str;

    /// Primary key value of this instance.
    fn primary_key(&self) -> Value;

    /// Build an instance from a result row.
    fn from_row(row: &Row) -> RawSqlResult<Self>;

    /// Read a mapped scalar field by column name.
    fn field(&self, name: &str) -> Option<Value>;

    /// Identity of this instance in a change tracker.
    fn entity_key(&self) -> EntityKey {
        EntityKey::new(Self::ENTITY_NAME, self.primary_key())
    }
}

/// A collection navigation from principal `P` to dependents `C`.
///
/// Declared by the principal type and handed to `Query::include`. Loading
/// issues `load_sql` once, groups the dependents by `foreign_key` and assigns
/// each group to the principal whose primary key matches.
pub struct Navigation<P, C> {
    path: &'static str,
    load_sql: &'static str,
    foreign_key: fn(&C) -> Value,
    assign: fn(&mut P, Vec<C>),
}

impl<P: Entity, C: Entity> Navigation<P, C> {
    pub fn new(
        path: &'static str,
        load_sql: &'static str,
        foreign_key: fn(&C) -> Value,
        assign: fn(&mut P, Vec<C>),
    ) -> Self {
        Self {
            path,
            load_sql,
            foreign_key,
            assign,
        }
    }

    /// Include path name, e.g. `"Orders"`.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Statement that loads every candidate dependent.
    pub fn load_sql(&self) -> &'static str {
        self.load_sql
    }

    /// Foreign key of a dependent.
    pub fn foreign_key_of(&self, child: &C) -> Value {
        (self.foreign_key)(child)
    }

    /// Replace the principal's collection.
    pub fn assign(&self, parent: &mut P, children: Vec<C>) {
        (self.assign)(parent, children)
    }
}

impl<P, C> Clone for Navigation<P, C> {
    fn clone(&self) -> Self {
        Self {
            path: self.path,
            load_sql: self.load_sql,
            foreign_key: self.foreign_key,
            assign: self.assign,
        }
    }
}

impl<P, C> std::fmt::Debug for Navigation<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigation")
            .field("path", &self.path)
            .field("load_sql", &self.load_sql)
            .finish()
    }
}
