//! Scalar values, rows and row sets

use crate::error::{ExecutionError, MaterializationError, RawSqlResult};
use crate::identity::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A scalar value bound as a parameter or read from a result column.
///
/// Equality and hashing are variant-sensitive: `Int(1)`, `Float(1.0)` and
/// `Text("1")` are three different values. Floats compare by bit pattern so
/// every value can participate in a cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(Timestamp),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Timestamp(_) => 4,
        }
    }

    /// Compare two non-null values of compatible types.
    ///
    /// Ints and floats compare numerically. Returns `None` when either side is
    /// null or the types are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (!b.is_nan()).then(|| cmp_int_float(*a, *b)),
            (Value::Float(a), Value::Int(b)) => {
                (!a.is_nan()).then(|| cmp_int_float(*b, *a).reverse())
            }
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, then by type, then by value.
    /// Ints and floats share one numeric order with NaN after every number.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        let nan = |v: &Value| matches!(v, Value::Float(f) if f.is_nan());
        if self.rank() == other.rank() && (nan(self) || nan(other)) {
            return nan(self).cmp(&nan(other));
        }
        self.compare(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

/// Exact comparison of an integer with a non-NaN float.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // 2^63: every float in [-2^63, 2^63) truncates to an in-range i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        other => other,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Timestamp(t) => t.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a positional parameter list from heterogeneous values.
///
/// ```
/// use rawsql_core::{params, Value};
/// let p = params!["London", 3i64, None::<String>];
/// assert_eq!(p, vec![Value::from("London"), Value::Int(3), Value::Null]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

// ============================================================================
// ROWS
// ============================================================================

/// One result row. Columns are shared with the owning [`RowSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Look up a column by name, ignoring ASCII case.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values.get(idx))
    }
}

/// A result set: a column header and the rows sharing it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl RowSet {
    /// Create an empty row set with the given column header.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. The value count must match the column count.
    pub fn push(&mut self, values: Vec<Value>) -> RawSqlResult<()> {
        if values.len() != self.columns.len() {
            return Err(ExecutionError::MalformedRow {
                expected: self.columns.len(),
                got: values.len(),
            }
            .into());
        }
        self.rows.push(Row {
            columns: Arc::clone(&self.columns),
            values,
        });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Typed column access for one row of a given entity.
///
/// Errors name the entity and column so materialization failures point at
/// the mapping that broke.
pub struct RowReader<'a> {
    row: &'a Row,
    entity: &'static str,
}

impl<'a> RowReader<'a> {
    pub fn new(row: &'a Row, entity: &'static str) -> Self {
        Self { row, entity }
    }

    fn value(&self, column: &str) -> RawSqlResult<&'a Value> {
        self.row.get(column).ok_or_else(|| {
            MaterializationError::MissingColumn {
                entity: self.entity.to_string(),
                column: column.to_string(),
            }
            .into()
        })
    }

    fn mismatch(&self, column: &str, expected: &str, got: &Value) -> crate::RawSqlError {
        MaterializationError::TypeMismatch {
            entity: self.entity.to_string(),
            column: column.to_string(),
            expected: expected.to_string(),
            got: got.type_name().to_string(),
        }
        .into()
    }

    pub fn text(&self, column: &str) -> RawSqlResult<String> {
        let value = self.value(column)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(column, "text", value))
    }

    pub fn opt_text(&self, column: &str) -> RawSqlResult<Option<String>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn int(&self, column: &str) -> RawSqlResult<i64> {
        let value = self.value(column)?;
        value
            .as_i64()
            .ok_or_else(|| self.mismatch(column, "int", value))
    }

    pub fn opt_int(&self, column: &str) -> RawSqlResult<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            other => Err(self.mismatch(column, "int", other)),
        }
    }

    pub fn opt_float(&self, column: &str) -> RawSqlResult<Option<f64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            Value::Int(i) => Ok(Some(*i as f64)),
            other => Err(self.mismatch(column, "float", other)),
        }
    }

    pub fn opt_timestamp(&self, column: &str) -> RawSqlResult<Option<Timestamp>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Timestamp(t) => Ok(Some(*t)),
            other => Err(self.mismatch(column, "timestamp", other)),
        }
    }
}
