use std::path::PathBuf;

/// Result type alias for record mapping operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for record mapping operations
///
/// Metadata errors (`NoPrimaryKey`, `MultiplePrimaryKeys`, `UnsupportedType`,
/// `NoFields`, `DuplicateColumn`, `UnknownColumn`, `EmptyUpdate`) are raised
/// before the store is opened. Store errors carry the underlying `rusqlite::Error` unmodified.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("record type `{type_name}` has no primary key field")]
    NoPrimaryKey { type_name: String },

    #[error("record type `{type_name}` marks more than one primary key: {columns:?}")]
    MultiplePrimaryKeys {
        type_name: String,
        columns: Vec<String>,
    },

    #[error("field `{field}` declares unsupported kind `{kind}`")]
    UnsupportedType { field: String, kind: String },

    #[error("record type `{type_name}` declares no fields")]
    NoFields { type_name: String },

    #[error("record type `{type_name}` maps more than one field to column `{column}`")]
    DuplicateColumn { type_name: String, column: String },

    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("record type `{type_name}` has no field `{field}`")]
    UnknownField { type_name: String, field: String },

    #[error("table `{table}` expects {expected} values, record produced {found}")]
    ValueCount {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error("update of `{table}` names no columns")]
    EmptyUpdate { table: String },

    #[error("column `{column}`: cannot convert {found} to {expected}")]
    Conversion {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("failed to open store at {}: {source}", .path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("statement failed ({sql}): {source}")]
    Statement {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The store error behind a `Connection` or `Statement` failure, if any.
    pub fn store_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Error::Connection { source, .. } | Error::Statement { source, .. } => Some(source),
            _ => None,
        }
    }

    pub(crate) fn conversion(column: &str, expected: &'static str, found: impl Into<String>) -> Self {
        Error::Conversion {
            column: column.to_string(),
            expected,
            found: found.into(),
        }
    }
}
