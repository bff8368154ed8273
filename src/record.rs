//! Record Type Descriptions: the statically declared shape of a persisted type.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Declared value kind of a field.
///
/// `Other` holds a kind name outside the fixed mapping; it survives
/// deserialization so the failure surfaces as `UnsupportedType` when the
/// table is resolved, not while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Integer,
    Text,
    Real,
    Boolean,
    Blob,
    Timestamp,
    Other(Cow<'static, str>),
}

impl FieldKind {
    /// Parse a kind name, accepting common aliases case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "integer" | "int" => FieldKind::Integer,
            "text" | "string" => FieldKind::Text,
            "real" | "float" => FieldKind::Real,
            "boolean" | "bool" => FieldKind::Boolean,
            "blob" | "bytes" => FieldKind::Blob,
            "timestamp" | "datetime" => FieldKind::Timestamp,
            _ => FieldKind::Other(Cow::Owned(name.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Text => "text",
            FieldKind::Real => "real",
            FieldKind::Boolean => "boolean",
            FieldKind::Blob => "blob",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Other(name) => name.as_ref(),
        }
    }
}

impl From<String> for FieldKind {
    fn from(name: String) -> Self {
        FieldKind::parse(&name)
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.name().to_string()
    }
}

/// One persisted field: identifier, kind, optional column override, key flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: Cow<'static, str>,
    pub kind: FieldKind,
    #[serde(default)]
    pub column: Option<Cow<'static, str>>,
    #[serde(default)]
    pub primary_key: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            column: None,
            primary_key: false,
        }
    }

    /// Store the field under `column` instead of its own name.
    pub fn with_column(mut self, column: impl Into<Cow<'static, str>>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Mark as primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Ordered field list for one logical entity, plus an optional table override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    pub type_name: Cow<'static, str>,
    #[serde(default)]
    pub table: Option<Cow<'static, str>>,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    pub fn new(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<Cow<'static, str>>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A statically typed record that can be written to and read from a table.
///
/// `Default` supplies the fresh instance each read row is mapped into; fields
/// whose column is absent from a result set keep their default value.
/// Implementations are usually generated with [`impl_record!`](crate::impl_record).
pub trait Record: Default {
    /// The description of this type's persisted fields.
    fn record_type() -> RecordType;

    /// Current value of every field, in declaration order.
    fn values(&self) -> Vec<Value>;

    /// Assign the field named `field` (the descriptor name, not the column).
    fn set_value(&mut self, field: &str, value: Value) -> Result<()>;
}

/// A record whose shape is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRecord {
    record_type: Arc<RecordType>,
    values: Vec<Value>,
}

impl DynamicRecord {
    /// A record with every field set to `Null`.
    pub fn new(record_type: Arc<RecordType>) -> Self {
        let values = vec![Value::Null; record_type.fields.len()];
        Self {
            record_type,
            values,
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record_type
            .field_index(field)
            .map(|index| &self.values[index])
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .record_type
            .field_index(field)
            .ok_or_else(|| Error::UnknownField {
                type_name: self.record_type.type_name.to_string(),
                field: field.to_string(),
            })?;
        self.values[index] = value.into();
        Ok(())
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }
}

/// Implement [`Record`] for a struct from a compact field list.
///
/// ```
/// use sqlite_orm::impl_record;
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Player {
///     id: i64,
///     name: String,
///     score: Option<f64>,
/// }
///
/// impl_record! {
///     Player as "players" {
///         id: Integer as "Id" [primary_key],
///         name: Text,
///         score: Real,
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_record {
    (@flag $target:ident primary_key) => {
        $target.primary_key()
    };
    (
        $ty:ident $(as $table:literal)? {
            $( $field:ident : $kind:ident $(as $column:literal)? $([$flag:ident])? ),* $(,)?
        }
    ) => {
        impl $crate::Record for $ty {
            fn record_type() -> $crate::RecordType {
                #[allow(unused_mut)]
                let mut record = $crate::RecordType::new(stringify!($ty));
                $( record = record.with_table($table); )?
                $(
                    record = record.field({
                        #[allow(unused_mut)]
                        let mut field = $crate::FieldDescriptor::new(
                            stringify!($field),
                            $crate::FieldKind::$kind,
                        );
                        $( field = field.with_column($column); )?
                        $( field = $crate::impl_record!(@flag field $flag); )?
                        field
                    });
                )*
                record
            }

            fn values(&self) -> ::std::vec::Vec<$crate::Value> {
                ::std::vec![
                    $( $crate::Value::from(::std::clone::Clone::clone(&self.$field)) ),*
                ]
            }

            fn set_value(&mut self, field: &str, value: $crate::Value) -> $crate::Result<()> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::FromValue::from_value(value, field)?;
                            Ok(())
                        }
                    )*
                    other => Err($crate::Error::UnknownField {
                        type_name: stringify!($ty).to_string(),
                        field: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_parse_with_aliases() {
        assert_eq!(FieldKind::parse("INT"), FieldKind::Integer);
        assert_eq!(FieldKind::parse("DateTime"), FieldKind::Timestamp);
        assert_eq!(FieldKind::parse("bytes"), FieldKind::Blob);
        assert_eq!(
            FieldKind::parse("decimal"),
            FieldKind::Other(Cow::Borrowed("decimal"))
        );
    }

    #[test]
    fn dynamic_record_rejects_unknown_field() {
        let record_type = Arc::new(
            RecordType::new("Note").field(FieldDescriptor::new("Id", FieldKind::Integer)),
        );
        let mut record = DynamicRecord::new(record_type);
        assert!(record.get("Id").is_some_and(Value::is_null));

        record.set("Id", 7_i64).unwrap();
        assert_eq!(record.get("Id"), Some(&Value::Integer(7)));

        let err = record.set("Body", "x").unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }
}
