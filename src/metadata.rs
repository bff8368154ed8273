//! Metadata resolution: record type descriptions to table descriptors.

use crate::error::{Error, Result};
use crate::record::{FieldDescriptor, FieldKind, RecordType};

impl FieldKind {
    /// SQLite type affinity for this kind, or `None` for a kind outside the
    /// fixed mapping.
    pub fn sql_type(&self) -> Option<&'static str> {
        match self {
            FieldKind::Integer => Some("INTEGER"),
            FieldKind::Text => Some("TEXT"),
            FieldKind::Real => Some("REAL"),
            FieldKind::Boolean => Some("BOOLEAN"),
            FieldKind::Blob => Some("BLOB"),
            FieldKind::Timestamp => Some("DATETIME"),
            FieldKind::Other(_) => None,
        }
    }
}

/// A resolved column, in field declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Field identifier the column was resolved from.
    pub field: String,
    pub name: String,
    pub kind: FieldKind,
    pub sql_type: &'static str,
    pub primary_key: bool,
}

/// Table name plus ordered columns for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub type_name: String,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    primary_key: Option<usize>,
}

impl TableDescriptor {
    /// The key column, required by update, delete and select by key.
    pub fn primary_key(&self) -> Result<&ColumnDescriptor> {
        self.primary_key
            .map(|index| &self.columns[index])
            .ok_or_else(|| Error::NoPrimaryKey {
                type_name: self.type_name.clone(),
            })
    }

    /// Position of the column called `name`.
    ///
    /// SQLite identifiers are ASCII case-insensitive and result sets report
    /// the spelling the table was created with, so lookups ignore case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Look up a column by name, failing for columns the type does not declare.
    pub fn column(&self, name: &str) -> Result<&ColumnDescriptor> {
        self.column_index(name)
            .map(|index| &self.columns[index])
            .ok_or_else(|| Error::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }
}

/// Table name: explicit override if present, else the type's own name.
pub fn resolve_table_name(record_type: &RecordType) -> &str {
    record_type
        .table
        .as_deref()
        .unwrap_or(&record_type.type_name)
}

/// Column name: explicit override if present, else the field's own name.
pub fn resolve_column(field: &FieldDescriptor) -> &str {
    field.column.as_deref().unwrap_or(&field.name)
}

/// First field marked primary key, in declaration order.
pub fn find_primary_key(record_type: &RecordType) -> Option<&FieldDescriptor> {
    record_type.fields.iter().find(|f| f.primary_key)
}

/// Resolve a record type into its table descriptor.
///
/// Fails before any SQL exists for a type with no fields, a field of
/// unsupported kind, two fields sharing a column, or more than one primary key.
pub fn resolve_table(record_type: &RecordType) -> Result<TableDescriptor> {
    if record_type.fields.is_empty() {
        return Err(Error::NoFields {
            type_name: record_type.type_name.to_string(),
        });
    }

    let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(record_type.fields.len());
    for field in &record_type.fields {
        let sql_type = field.kind.sql_type().ok_or_else(|| Error::UnsupportedType {
            field: field.name.to_string(),
            kind: field.kind.name().to_string(),
        })?;
        let name = resolve_column(field);
        if let Some(taken) = columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(Error::DuplicateColumn {
                type_name: record_type.type_name.to_string(),
                column: taken.name.clone(),
            });
        }
        columns.push(ColumnDescriptor {
            field: field.name.to_string(),
            name: name.to_string(),
            kind: field.kind.clone(),
            sql_type,
            primary_key: field.primary_key,
        });
    }

    let keys: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.primary_key)
        .map(|(index, _)| index)
        .collect();
    if keys.len() > 1 {
        return Err(Error::MultiplePrimaryKeys {
            type_name: record_type.type_name.to_string(),
            columns: keys.iter().map(|&i| columns[i].name.clone()).collect(),
        });
    }

    Ok(TableDescriptor {
        type_name: record_type.type_name.to_string(),
        name: resolve_table_name(record_type).to_string(),
        primary_key: keys.first().copied(),
        columns,
    })
}
