use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::FieldKind;

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Short name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
            Value::Boolean(_) => "BOOLEAN",
            Value::Timestamp(_) => "DATETIME",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decode a stored value into the representation of the declared `kind`.
    pub(crate) fn decode(raw: ValueRef<'_>, kind: &FieldKind, column: &str) -> Result<Self> {
        let found = raw.data_type().to_string();
        let value = match (kind, raw) {
            (_, ValueRef::Null) => Value::Null,
            (FieldKind::Integer, ValueRef::Integer(i)) => Value::Integer(i),
            (FieldKind::Real, ValueRef::Real(f)) => Value::Real(f),
            (FieldKind::Real, ValueRef::Integer(i)) => Value::Real(i as f64),
            (FieldKind::Boolean, ValueRef::Integer(i)) => Value::Boolean(i != 0),
            (FieldKind::Blob, ValueRef::Blob(bytes)) => Value::Blob(bytes.to_vec()),
            (FieldKind::Text, ValueRef::Text(bytes)) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| Error::conversion(column, "TEXT", "invalid UTF-8"))?
                    .to_string(),
            ),
            (FieldKind::Timestamp, ValueRef::Text(bytes)) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| Error::conversion(column, "DATETIME", "invalid UTF-8"))?;
                Value::Timestamp(
                    parse_timestamp(text)
                        .ok_or_else(|| Error::conversion(column, "DATETIME", text))?,
                )
            }
            (FieldKind::Timestamp, ValueRef::Integer(secs)) => Value::Timestamp(
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| Error::conversion(column, "DATETIME", secs.to_string()))?,
            ),
            (FieldKind::Other(name), _) => {
                return Err(Error::UnsupportedType {
                    field: column.to_string(),
                    kind: name.to_string(),
                })
            }
            (kind, _) => {
                return Err(Error::conversion(
                    column,
                    kind.sql_type().unwrap_or("a supported kind"),
                    found,
                ))
            }
        };
        Ok(value)
    }
}

/// Timestamps are stored as RFC 3339 text in UTC.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    // SQLite's own CURRENT_TIMESTAMP form carries no offset and is UTC.
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(format_timestamp(ts))),
        })
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a decoded [`Value`] into a record field.
///
/// `column` names the field being assigned and only appears in errors.
pub trait FromValue: Sized {
    fn from_value(value: Value, column: &str) -> Result<Self>;
}

fn mismatch<T>(column: &str, expected: &'static str, value: &Value) -> Result<T> {
    Err(Error::conversion(column, expected, value.kind_name()))
}

impl FromValue for i64 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            Value::Boolean(b) => Ok(i64::from(b)),
            other => mismatch(column, "INTEGER", &other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        let wide = i64::from_value(value, column)?;
        i32::try_from(wide).map_err(|_| Error::conversion(column, "i32", wide.to_string()))
    }
}

impl FromValue for u32 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        let wide = i64::from_value(value, column)?;
        u32::try_from(wide).map_err(|_| Error::conversion(column, "u32", wide.to_string()))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => mismatch(column, "REAL", &other),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        f64::from_value(value, column).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Integer(i) => Ok(i != 0),
            other => mismatch(column, "BOOLEAN", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => mismatch(column, "TEXT", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b),
            other => mismatch(column, "BLOB", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            other => mismatch(column, "DATETIME", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}
