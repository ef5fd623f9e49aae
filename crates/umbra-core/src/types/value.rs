//! Tagged column values
//!
//! Replay buffers rows as maps from column name to [`Value`]. Values carry
//! enough type information to be cast to their target column type before a
//! flush, which matters for the text-based bulk load path where everything
//! round-trips through its canonical text form.

use crate::error::{Result, UmbraError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A buffered row: column name to value
pub type Row = BTreeMap<String, Value>;

/// Column types understood by the bulk-load path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInt,
    DoublePrecision,
    Text,
    Uuid,
    Timestamptz,
    Jsonb,
    Bytea,
}

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type-normalizing equality used by record lookups.
    ///
    /// A uuid and its text rendering compare equal, as do integers and
    /// floats with the same numeric value. Everything else requires the
    /// same variant.
    pub fn normalized_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Uuid(u), Value::Text(s)) | (Value::Text(s), Value::Uuid(u)) => {
                Uuid::parse_str(s).map(|p| p == *u).unwrap_or(false)
            }
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                *i as f64 == *f
            }
            (a, b) => a == b,
        }
    }

    /// Stable bytes for index hashing, normalized the same way
    /// [`normalized_eq`](Self::normalized_eq) compares.
    pub fn key_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.push(b'0'),
            Value::Bool(b) => {
                out.push(b'b');
                out.push(*b as u8);
            }
            Value::Int(i) => {
                out.push(b'n');
                out.extend_from_slice(&(*i as f64).to_bits().to_le_bytes());
            }
            Value::Float(f) => {
                out.push(b'n');
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::Text(s) => match Uuid::parse_str(s) {
                Ok(u) => {
                    out.push(b'u');
                    out.extend_from_slice(u.as_bytes());
                }
                Err(_) => {
                    out.push(b's');
                    out.extend_from_slice(s.as_bytes());
                }
            },
            Value::Uuid(u) => {
                out.push(b'u');
                out.extend_from_slice(u.as_bytes());
            }
            Value::Timestamp(t) => {
                out.push(b't');
                out.extend_from_slice(&t.timestamp_micros().to_le_bytes());
            }
            Value::Json(j) => {
                out.push(b'j');
                out.extend_from_slice(j.to_string().as_bytes());
            }
            Value::Bytes(b) => {
                out.push(b'y');
                out.extend_from_slice(b);
            }
        }
    }

    /// Cast to the native type of the target column.
    ///
    /// Performed once per row on flush so both the binary insert path and
    /// the text-based bulk load see values of the declared column type.
    pub fn cast_to(&self, ty: ColumnType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let cast_err =
            || UmbraError::Serialization(format!("cannot cast {:?} to {ty:?} column", self));
        match ty {
            ColumnType::Boolean => match self {
                Value::Bool(_) => Ok(self.clone()),
                Value::Text(s) => match s.as_str() {
                    "t" | "true" => Ok(Value::Bool(true)),
                    "f" | "false" => Ok(Value::Bool(false)),
                    _ => Err(cast_err()),
                },
                _ => Err(cast_err()),
            },
            ColumnType::Integer | ColumnType::BigInt => match self {
                Value::Int(_) => Ok(self.clone()),
                Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
                Value::Text(s) => s.parse().map(Value::Int).map_err(|_| cast_err()),
                _ => Err(cast_err()),
            },
            ColumnType::DoublePrecision => match self {
                Value::Float(_) => Ok(self.clone()),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Text(s) => s.parse().map(Value::Float).map_err(|_| cast_err()),
                _ => Err(cast_err()),
            },
            ColumnType::Text => Ok(match self {
                Value::Text(_) => self.clone(),
                Value::Uuid(u) => Value::Text(u.to_string()),
                Value::Bool(b) => Value::Text(if *b { "t" } else { "f" }.into()),
                Value::Int(i) => Value::Text(i.to_string()),
                Value::Float(f) => Value::Text(f.to_string()),
                Value::Timestamp(t) => {
                    Value::Text(t.to_rfc3339_opts(SecondsFormat::Micros, true))
                }
                Value::Json(j) => Value::Text(j.to_string()),
                Value::Bytes(_) | Value::Null => return Err(cast_err()),
            }),
            ColumnType::Uuid => match self {
                Value::Uuid(_) => Ok(self.clone()),
                Value::Text(s) => Uuid::parse_str(s).map(Value::Uuid).map_err(|_| cast_err()),
                _ => Err(cast_err()),
            },
            ColumnType::Timestamptz => match self {
                Value::Timestamp(_) => Ok(self.clone()),
                Value::Text(s) => DateTime::parse_from_rfc3339(s)
                    .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                    .map_err(|_| cast_err()),
                _ => Err(cast_err()),
            },
            ColumnType::Jsonb => match self {
                Value::Json(_) => Ok(self.clone()),
                Value::Text(s) => serde_json::from_str(s)
                    .map(Value::Json)
                    .map_err(|_| cast_err()),
                _ => Err(cast_err()),
            },
            ColumnType::Bytea => match self {
                Value::Bytes(_) => Ok(self.clone()),
                _ => Err(cast_err()),
            },
        }
    }

    /// Canonical text form for the CSV bulk load path.
    ///
    /// Returns `None` for NULL, which the CSV writer renders as an
    /// unquoted empty field.
    pub fn copy_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "t" } else { "f" }.into()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Uuid(u) => Some(u.to_string()),
            Value::Timestamp(t) => Some(t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Value::Json(j) => Some(j.to_string()),
            Value::Bytes(b) => {
                let mut s = String::with_capacity(2 + b.len() * 2);
                s.push_str("\\x");
                for byte in b {
                    s.push_str(&format!("{byte:02x}"));
                }
                Some(s)
            }
        }
    }
}

/// Build a [`Row`] literal.
///
/// ```
/// use umbra_core::{row, types::Value};
///
/// let r = row! { "aggregate_id" => Value::Text("a".into()), "total" => Value::Int(3) };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::types::Row::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::types::Row::new();
        $(row.insert($key.to_string(), $value);)+
        row
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_equality() {
        let id = Uuid::from_u128(42);
        assert!(Value::Uuid(id).normalized_eq(&Value::Text(id.to_string())));
        assert!(Value::Int(3).normalized_eq(&Value::Float(3.0)));
        assert!(!Value::Int(3).normalized_eq(&Value::Float(3.5)));
        assert!(!Value::Text("abc".into()).normalized_eq(&Value::Uuid(id)));
    }

    #[test]
    fn test_key_bytes_normalization() {
        let id = Uuid::from_u128(7);
        let mut a = Vec::new();
        let mut b = Vec::new();
        Value::Uuid(id).key_bytes(&mut a);
        Value::Text(id.to_string()).key_bytes(&mut b);
        assert_eq!(a, b);

        let mut c = Vec::new();
        let mut d = Vec::new();
        Value::Int(5).key_bytes(&mut c);
        Value::Float(5.0).key_bytes(&mut d);
        assert_eq!(c, d);
    }

    #[test]
    fn test_cast_to_column_types() {
        let id = Uuid::from_u128(9);
        assert_eq!(
            Value::Text(id.to_string()).cast_to(ColumnType::Uuid).unwrap(),
            Value::Uuid(id)
        );
        assert_eq!(
            Value::Text("12".into()).cast_to(ColumnType::BigInt).unwrap(),
            Value::Int(12)
        );
        assert_eq!(Value::Null.cast_to(ColumnType::BigInt).unwrap(), Value::Null);
        assert!(Value::Bool(true).cast_to(ColumnType::Uuid).is_err());
    }

    #[test]
    fn test_copy_text() {
        assert_eq!(Value::Null.copy_text(), None);
        assert_eq!(Value::Bool(true).copy_text().unwrap(), "t");
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).copy_text().unwrap(), "\\xab01");
    }
}
