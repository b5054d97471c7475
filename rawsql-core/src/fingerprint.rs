//! Query fingerprints and parameterized SQL commands.
//!
//! SQL text handed to `from_sql` uses composite-format placeholders: `{0}`
//! binds the first positional parameter, `{1}` the second, and so on. `{{`
//! and `}}` stand for literal braces. A [`Fingerprint`] is the exact SQL text
//! plus the ordered parameter values; it is the identity of a raw query for
//! caching. [`SqlCommand`] is what the executor receives after placeholders
//! are rewritten to named parameters (`@p0`, `@p1`, ...).

use crate::error::{QueryError, RawSqlResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Piece of a parsed SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(usize),
}

fn invalid(reason: impl Into<String>) -> crate::RawSqlError {
    QueryError::InvalidFingerprint {
        reason: reason.into(),
    }
    .into()
}

/// Split SQL text into literal runs and parameter references, checking every
/// reference against the number of bound parameters.
fn parse_template(sql: &str, param_count: usize) -> RawSqlResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut index = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    index.push(c);
                }
                if !closed {
                    return Err(invalid(format!("unterminated placeholder at offset {}", pos)));
                }
                // Digits only: no sign, padding or format suffix.
                let digits_only = !index.is_empty() && index.chars().all(|c| c.is_ascii_digit());
                let parsed = if digits_only { index.parse::<usize>().ok() } else { None };
                let index = parsed.ok_or_else(|| {
                    invalid(format!(
                        "placeholder {{{}}} at offset {} is not a parameter index",
                        index, pos
                    ))
                })?;
                if index >= param_count {
                    return Err(invalid(format!(
                        "placeholder {{{}}} has no parameter ({} bound)",
                        index, param_count
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Param(index));
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(invalid(format!("unpaired '}}' at offset {}", pos)));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Cache identity of a raw SQL query: exact text plus ordered parameters.
///
/// Equality is structural. No normalization is applied to the text, so two
/// queries that differ by a single character (or a single parameter value)
/// never share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    sql: Arc<str>,
    params: Arc<[Value]>,
}

impl Fingerprint {
    /// Build a fingerprint, validating the parameter binding.
    pub fn new(sql: impl Into<String>, params: impl Into<Vec<Value>>) -> RawSqlResult<Self> {
        let sql = sql.into();
        let params = params.into();
        parse_template(&sql, params.len())?;
        Ok(Self {
            sql: sql.into(),
            params: params.into(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// SHA-256 over the text and the tagged parameter encoding, hex encoded.
    ///
    /// Safe to log: parameter values cannot be recovered from it.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.sql.len() as u64).to_le_bytes());
        hasher.update(self.sql.as_bytes());
        for param in self.params.iter() {
            let tag = param.type_name();
            hasher.update([tag.len() as u8]);
            hasher.update(tag.as_bytes());
            let encoded = match param {
                Value::Float(f) => f.to_bits().to_string(),
                other => other.to_string(),
            };
            hasher.update((encoded.len() as u64).to_le_bytes());
            hasher.update(encoded.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Rewrite placeholders into named parameters for the executor.
    pub fn to_command(&self) -> RawSqlResult<SqlCommand> {
        let segments = parse_template(&self.sql, self.params.len())?;
        let mut text = String::with_capacity(self.sql.len());
        for segment in &segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Param(i) => {
                    text.push_str(&SqlParameter::name_for(*i));
                }
            }
        }
        let parameters = self
            .params
            .iter()
            .enumerate()
            .map(|(i, value)| SqlParameter {
                name: SqlParameter::name_for(i),
                value: value.clone(),
            })
            .collect();
        Ok(SqlCommand { text, parameters })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digest = self.digest();
        write!(f, "fp_{}", &digest[..12])
    }
}

/// A named parameter bound to a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

impl SqlParameter {
    /// Name of the parameter at a position, e.g. `@p0`.
    pub fn name_for(index: usize) -> String {
        format!("@p{}", index)
    }
}

/// A parameterized command as handed to the SQL transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlCommand {
    pub text: String,
    pub parameters: Vec<SqlParameter>,
}

impl SqlCommand {
    /// A command with no parameters.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Parameter values in positional order.
    pub fn values(&self) -> Vec<Value> {
        self.parameters.iter().map(|p| p.value.clone()).collect()
    }
}
