//! Record mapping and SQL generation over SQLite.
//!
//! # Intention
//!
//! - Describe a record type once (table name, column names, primary key) and
//!   derive every CRUD statement for it from that description.
//! - Bind every value as a parameter; only quoted identifiers reach SQL text.
//! - Map result rows back into freshly allocated typed records.
//!
//! # Architectural Boundaries
//!
//! - [`metadata`] resolves a [`RecordType`] into a [`TableDescriptor`].
//! - [`sql`] turns a [`TableDescriptor`] plus values into a [`SqlQuery`].
//! - [`sqlite`] opens one session per operation and runs the statement.
//! - No pooling, migrations, joins or multi-statement transactions.
//!
//! Generated SQL is logged through `tracing` at `debug`; install a subscriber
//! to see it.

pub mod error;
pub mod metadata;
pub mod record;
pub mod sql;
pub mod sqlite;
pub mod value;

pub use error::{Error, Result};
pub use metadata::{
    find_primary_key, resolve_column, resolve_table, resolve_table_name, ColumnDescriptor,
    TableDescriptor,
};
pub use record::{DynamicRecord, FieldDescriptor, FieldKind, Record, RecordType};
pub use sql::{Conditions, Params, SqlQuery};
pub use sqlite::{Session, SqliteConfig, SqliteStore};
pub use value::{FromValue, Value};
