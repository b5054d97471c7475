//! Client-side predicate and operator nodes.
//!
//! Operators composed after a raw SQL source are recorded as explicit nodes
//! rather than closures, so a composed query is a plain value that can be
//! hashed into a cache key and walked once at execution time.

use crate::config::TrackingBehavior;
use crate::entity::Entity;
use crate::error::{QueryError, RawSqlResult};
use crate::value::Value;
use std::cmp::Ordering;

/// Filter expression evaluated against materialized entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Field equals value. `Eq(field, Null)` matches null fields.
    Eq(String, Value),
    /// Field differs from value. Null fields never match a non-null value.
    Ne(String, Value),
    /// Field is less than value.
    Lt(String, Value),
    /// Field is greater than value.
    Gt(String, Value),
    /// Text field contains substring (case-sensitive).
    Contains(String, String),
    /// Text field starts with prefix (case-sensitive).
    StartsWith(String, String),
    /// Field is null.
    IsNull(String),
    /// Two fields are equal; false when either side is null.
    FieldEquals(String, String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(field.into(), needle.into())
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::StartsWith(field.into(), prefix.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    pub fn field_equals(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::FieldEquals(left.into(), right.into())
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against an entity. Unknown fields are an error, not `false`.
    pub fn evaluate<T: Entity>(&self, entity: &T) -> RawSqlResult<bool> {
        Ok(match self {
            Predicate::Eq(field, value) => &read::<T>(entity, field)? == value,
            Predicate::Ne(field, value) => {
                let actual = read::<T>(entity, field)?;
                match (&actual, value) {
                    (Value::Null, _) => false,
                    (_, Value::Null) => true,
                    _ => &actual != value,
                }
            }
            Predicate::Lt(field, value) => {
                read::<T>(entity, field)?.compare(value) == Some(Ordering::Less)
            }
            Predicate::Gt(field, value) => {
                read::<T>(entity, field)?.compare(value) == Some(Ordering::Greater)
            }
            Predicate::Contains(field, needle) => read::<T>(entity, field)?
                .as_str()
                .is_some_and(|s| s.contains(needle.as_str())),
            Predicate::StartsWith(field, prefix) => read::<T>(entity, field)?
                .as_str()
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Predicate::IsNull(field) => read::<T>(entity, field)?.is_null(),
            Predicate::FieldEquals(left, right) => {
                let l = read::<T>(entity, left)?;
                let r = read::<T>(entity, right)?;
                !l.is_null() && !r.is_null() && l == r
            }
            Predicate::And(a, b) => a.evaluate(entity)? && b.evaluate(entity)?,
            Predicate::Or(a, b) => a.evaluate(entity)? || b.evaluate(entity)?,
            Predicate::Not(inner) => !inner.evaluate(entity)?,
        })
    }
}

pub(crate) fn read<T: Entity>(entity: &T, field: &str) -> RawSqlResult<Value> {
    entity.field(field).ok_or_else(|| {
        QueryError::UnknownField {
            entity: T::ENTITY_NAME.to_string(),
            field: field.to_string(),
        }
        .into()
    })
}

/// Sort direction for `OrderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Operator applied to the materialized set, in composition order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientOperator {
    Filter(Predicate),
    OrderBy {
        field: String,
        direction: SortDirection,
    },
    Skip(usize),
    Take(usize),
}

impl ClientOperator {
    /// Apply this operator to a materialized set.
    pub fn apply<T: Entity>(&self, items: Vec<T>) -> RawSqlResult<Vec<T>> {
        match self {
            ClientOperator::Filter(predicate) => {
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if predicate.evaluate(&item)? {
                        kept.push(item);
                    }
                }
                Ok(kept)
            }
            ClientOperator::OrderBy { field, direction } => {
                let mut keyed = items
                    .into_iter()
                    .map(|item| read::<T>(&item, field).map(|key| (key, item)))
                    .collect::<RawSqlResult<Vec<_>>>()?;
                keyed.sort_by(|(a, _), (b, _)| match direction {
                    SortDirection::Ascending => a.sort_cmp(b),
                    SortDirection::Descending => b.sort_cmp(a),
                });
                Ok(keyed.into_iter().map(|(_, item)| item).collect())
            }
            ClientOperator::Skip(n) => Ok(items.into_iter().skip(*n).collect()),
            ClientOperator::Take(n) => Ok(items.into_iter().take(*n).collect()),
        }
    }
}

/// One composition step appended after the raw SQL source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryNode {
    Operator(ClientOperator),
    Include(String),
    Tracking(TrackingBehavior),
}
