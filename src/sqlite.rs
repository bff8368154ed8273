//! SQLite execution: per-operation sessions over a configured store.
//!
//! Every operation resolves its table, builds its statement, then opens a
//! [`Session`], runs exactly one statement and closes the session before
//! returning. The session is released on every exit path, including failures
//! partway through reading rows.
//!
//! No locking is imposed here. Concurrent writers to the same database rely on
//! SQLite's own file locking and may see `SQLITE_BUSY` surfaced as a
//! [`Error::Statement`].

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params_from_iter, CachedStatement, Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::{resolve_table, TableDescriptor};
use crate::record::{DynamicRecord, Record, RecordType};
use crate::sql::{self, Conditions, SqlQuery};
use crate::value::Value;

fn default_true() -> bool {
    true
}

/// SQLite store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Create the database file if it does not exist
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    /// Create missing parent directories of `db_path` before opening
    #[serde(default)]
    pub create_parent_dirs: bool,
}

impl SqliteConfig {
    /// Create a new SQLite config for the database at `db_path`
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            create_if_missing: true,
            create_parent_dirs: false,
        }
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn with_parent_dirs(mut self, create: bool) -> Self {
        self.create_parent_dirs = create;
        self
    }

    fn open_flags(&self) -> OpenFlags {
        let mut flags =
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn statement_error(query: &SqlQuery, source: rusqlite::Error) -> Error {
    Error::Statement {
        sql: query.statement.clone(),
        source,
    }
}

/// One open connection, scoped to a single logical operation.
///
/// Dropping a session releases the connection; [`Session::close`] does the
/// same but reports a failure to close.
pub struct Session {
    conn: Connection,
    path: PathBuf,
}

impl Session {
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        if config.create_parent_dirs {
            ensure_parent_dir(&config.db_path)?;
        }
        let conn = Connection::open_with_flags(&config.db_path, config.open_flags()).map_err(
            |source| Error::Connection {
                path: config.db_path.clone(),
                source,
            },
        )?;
        tracing::trace!(path = %config.db_path.display(), "session opened");
        Ok(Self {
            conn,
            path: config.db_path.clone(),
        })
    }

    fn prepare(&self, query: &SqlQuery) -> Result<CachedStatement<'_>> {
        tracing::debug!(
            sql = %query.statement,
            params = query.params.len(),
            "executing statement"
        );
        self.conn
            .prepare_cached(&query.statement)
            .map_err(|e| statement_error(query, e))
    }

    /// Run a statement that returns no rows; yields the number of rows changed.
    pub fn execute(&self, query: &SqlQuery) -> Result<usize> {
        let mut stmt = self.prepare(query)?;
        stmt.execute(params_from_iter(query.params.values.iter()))
            .map_err(|e| statement_error(query, e))
    }

    /// Stream result rows into `f` until the rows run out or `f` breaks.
    ///
    /// `f` receives the result set's column names alongside each row.
    pub fn for_each_row<F>(&self, query: &SqlQuery, mut f: F) -> Result<()>
    where
        F: FnMut(&[String], &Row<'_>) -> Result<ControlFlow<()>>,
    {
        let mut stmt = self.prepare(query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = stmt
            .query(params_from_iter(query.params.values.iter()))
            .map_err(|e| statement_error(query, e))?;
        while let Some(row) = rows.next().map_err(|e| statement_error(query, e))? {
            if f(columns.as_slice(), row)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Run a query whose first column of its single row is an integer.
    pub fn query_count(&self, query: &SqlQuery) -> Result<u64> {
        let mut stmt = self.prepare(query)?;
        let count: i64 = stmt
            .query_row(params_from_iter(query.params.values.iter()), |row| row.get(0))
            .map_err(|e| statement_error(query, e))?;
        Ok(count.max(0) as u64)
    }

    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn
            .close()
            .map_err(|(_, source)| Error::Connection { path: path.clone(), source })?;
        tracing::trace!(path = %path.display(), "session closed");
        Ok(())
    }
}

/// Map one result row into `record`.
///
/// Only columns present in the result set and declared by `table` are
/// assigned, matched without regard to ASCII case. NULL leaves the field at
/// its default.
fn map_row<R>(
    table: &TableDescriptor,
    query: &SqlQuery,
    columns: &[String],
    row: &Row<'_>,
    record: &mut R,
    assign: &impl Fn(&mut R, &str, Value) -> Result<()>,
) -> Result<()> {
    for (index, name) in columns.iter().enumerate() {
        let Some(column) = table.column_index(name).map(|i| &table.columns[i]) else {
            continue;
        };
        let raw = row.get_ref(index).map_err(|e| statement_error(query, e))?;
        let value = Value::decode(raw, &column.kind, &column.name)?;
        if value.is_null() {
            continue;
        }
        assign(record, &column.field, value)?;
    }
    Ok(())
}

/// A database location plus the configuration each session is opened with.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    config: SqliteConfig,
}

impl SqliteStore {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    /// A store at `db_path` with default configuration. Does not touch the file.
    pub fn at(db_path: impl AsRef<Path>) -> Self {
        Self::new(SqliteConfig::new(db_path.as_ref()))
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Open a session, run `op`, and release the session whatever the outcome.
    fn with_session<T>(&self, op: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        let session = Session::open(&self.config)?;
        match op(&session) {
            Ok(value) => {
                session.close()?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.config.db_path.display(),
                    error = %err,
                    "operation failed; session released"
                );
                Err(err)
            }
        }
    }

    fn execute(&self, query: SqlQuery) -> Result<usize> {
        self.with_session(|session| session.execute(&query))
    }

    fn stream<R, F>(
        &self,
        table: &TableDescriptor,
        query: &SqlQuery,
        new_record: impl Fn() -> R,
        assign: impl Fn(&mut R, &str, Value) -> Result<()>,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(R) -> Result<ControlFlow<()>>,
    {
        self.with_session(|session| {
            session.for_each_row(query, |columns, row| {
                let mut record = new_record();
                map_row(table, query, columns, row, &mut record, &assign)?;
                f(record)
            })
        })
    }

    fn select_first<R>(
        &self,
        table: &TableDescriptor,
        query: &SqlQuery,
        new_record: impl Fn() -> R,
        assign: impl Fn(&mut R, &str, Value) -> Result<()>,
    ) -> Result<Option<R>> {
        let mut found = None;
        self.stream(table, query, new_record, assign, |record| {
            found = Some(record);
            Ok(ControlFlow::Break(()))
        })?;
        Ok(found)
    }

    fn collect<R>(
        &self,
        table: &TableDescriptor,
        query: &SqlQuery,
        new_record: impl Fn() -> R,
        assign: impl Fn(&mut R, &str, Value) -> Result<()>,
    ) -> Result<Vec<R>> {
        let mut records = Vec::new();
        self.stream(table, query, new_record, assign, |record| {
            records.push(record);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(records)
    }

    // ========== Description-driven operations ==========

    /// `CREATE TABLE IF NOT EXISTS`; safe to repeat.
    pub fn create_table_for(&self, record_type: &RecordType) -> Result<()> {
        let table = resolve_table(record_type)?;
        self.execute(sql::create_table(&table)).map(|_| ())
    }

    /// `DROP TABLE IF EXISTS`; safe when the table is absent.
    pub fn drop_table_for(&self, record_type: &RecordType) -> Result<()> {
        let table = resolve_table(record_type)?;
        self.execute(sql::drop_table(&table)).map(|_| ())
    }

    fn insert_values(&self, record_type: &RecordType, values: Vec<Value>) -> Result<usize> {
        let table = resolve_table(record_type)?;
        self.execute(sql::insert(&table, values)?)
    }

    fn update_values(&self, record_type: &RecordType, values: Vec<Value>) -> Result<usize> {
        let table = resolve_table(record_type)?;
        self.execute(sql::update(&table, values)?)
    }

    pub fn insert_dynamic(&self, record: &DynamicRecord) -> Result<usize> {
        self.insert_values(record.record_type(), record.values().to_vec())
    }

    pub fn update_dynamic(&self, record: &DynamicRecord) -> Result<usize> {
        self.update_values(record.record_type(), record.values().to_vec())
    }

    /// Set only the columns in `assignments` on the row whose key is `key`.
    pub fn update_columns_for(
        &self,
        record_type: &RecordType,
        key: impl Into<Value>,
        assignments: &Conditions,
    ) -> Result<usize> {
        let table = resolve_table(record_type)?;
        self.execute(sql::update_columns(&table, key.into(), assignments)?)
    }

    pub fn delete_for(&self, record_type: &RecordType, key: impl Into<Value>) -> Result<usize> {
        let table = resolve_table(record_type)?;
        self.execute(sql::delete_by_key(&table, key.into())?)
    }

    /// Delete every row matching `conditions`.
    ///
    /// An empty condition set deletes every row in the table.
    pub fn delete_where_for(&self, record_type: &RecordType, conditions: &Conditions) -> Result<usize> {
        let table = resolve_table(record_type)?;
        self.execute(sql::delete_where(&table, conditions)?)
    }

    pub fn count_for(&self, record_type: &RecordType, conditions: &Conditions) -> Result<u64> {
        let table = resolve_table(record_type)?;
        let query = sql::count(&table, conditions)?;
        self.with_session(|session| session.query_count(&query))
    }

    pub fn select_dynamic(
        &self,
        record_type: &Arc<RecordType>,
        key: impl Into<Value>,
    ) -> Result<Option<DynamicRecord>> {
        let table = resolve_table(record_type)?;
        let query = sql::select_by_key(&table, key.into())?;
        self.select_first(
            &table,
            &query,
            || DynamicRecord::new(Arc::clone(record_type)),
            |record: &mut DynamicRecord, field, value| record.set(field, value),
        )
    }

    pub fn select_where_dynamic(
        &self,
        record_type: &Arc<RecordType>,
        conditions: &Conditions,
    ) -> Result<Vec<DynamicRecord>> {
        let table = resolve_table(record_type)?;
        let query = sql::select_where(&table, conditions)?;
        self.collect(
            &table,
            &query,
            || DynamicRecord::new(Arc::clone(record_type)),
            |record: &mut DynamicRecord, field, value| record.set(field, value),
        )
    }

    // ========== Typed record operations ==========

    pub fn create_table<T: Record>(&self) -> Result<()> {
        self.create_table_for(&T::record_type())
    }

    pub fn drop_table<T: Record>(&self) -> Result<()> {
        self.drop_table_for(&T::record_type())
    }

    pub fn insert<T: Record>(&self, record: &T) -> Result<usize> {
        self.insert_values(&T::record_type(), record.values())
    }

    /// Insert every record through one session and one prepared statement.
    ///
    /// Rows are not wrapped in a transaction; a failure leaves earlier rows in
    /// place. An empty slice does not open the store.
    pub fn insert_all<T: Record>(&self, records: &[T]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let table = resolve_table(&T::record_type())?;
        let queries = records
            .iter()
            .map(|record| sql::insert(&table, record.values()))
            .collect::<Result<Vec<_>>>()?;
        self.with_session(|session| {
            let mut inserted = 0;
            for query in &queries {
                inserted += session.execute(query)?;
            }
            Ok(inserted)
        })
    }

    /// Overwrite every column of the row sharing this record's primary key.
    pub fn update<T: Record>(&self, record: &T) -> Result<usize> {
        self.update_values(&T::record_type(), record.values())
    }

    pub fn update_columns<T: Record>(
        &self,
        key: impl Into<Value>,
        assignments: &Conditions,
    ) -> Result<usize> {
        self.update_columns_for(&T::record_type(), key, assignments)
    }

    pub fn delete<T: Record>(&self, key: impl Into<Value>) -> Result<usize> {
        self.delete_for(&T::record_type(), key)
    }

    /// Delete every row matching `conditions`.
    ///
    /// An empty condition set deletes every row in the table.
    pub fn delete_where<T: Record>(&self, conditions: &Conditions) -> Result<usize> {
        self.delete_where_for(&T::record_type(), conditions)
    }

    /// The row whose primary key equals `key`; `Ok(None)` when there is none.
    pub fn select<T: Record>(&self, key: impl Into<Value>) -> Result<Option<T>> {
        let table = resolve_table(&T::record_type())?;
        let query = sql::select_by_key(&table, key.into())?;
        self.select_first(&table, &query, T::default, |record: &mut T, field, value| {
            record.set_value(field, value)
        })
    }

    /// Stream matching rows into `f` one record at a time.
    ///
    /// Rows arrive in the store's iteration order. The session closes once the
    /// rows are exhausted or `f` returns an error.
    pub fn for_each_where<T, F>(&self, conditions: &Conditions, mut f: F) -> Result<()>
    where
        T: Record,
        F: FnMut(T) -> Result<()>,
    {
        let table = resolve_table(&T::record_type())?;
        let query = sql::select_where(&table, conditions)?;
        self.stream(
            &table,
            &query,
            T::default,
            |record: &mut T, field, value| record.set_value(field, value),
            |record| f(record).map(|()| ControlFlow::Continue(())),
        )
    }

    pub fn select_where<T: Record>(&self, conditions: &Conditions) -> Result<Vec<T>> {
        let table = resolve_table(&T::record_type())?;
        let query = sql::select_where(&table, conditions)?;
        self.collect(&table, &query, T::default, |record: &mut T, field, value| {
            record.set_value(field, value)
        })
    }

    pub fn select_all<T: Record>(&self) -> Result<Vec<T>> {
        self.select_where(&Conditions::new())
    }

    pub fn count<T: Record>(&self, conditions: &Conditions) -> Result<u64> {
        self.count_for(&T::record_type(), conditions)
    }
}

// ========== Store-location-per-call entry points ==========

pub fn create_table<T: Record>(db_path: impl AsRef<Path>) -> Result<()> {
    SqliteStore::at(db_path).create_table::<T>()
}

pub fn drop_table<T: Record>(db_path: impl AsRef<Path>) -> Result<()> {
    SqliteStore::at(db_path).drop_table::<T>()
}

pub fn insert<T: Record>(db_path: impl AsRef<Path>, record: &T) -> Result<usize> {
    SqliteStore::at(db_path).insert(record)
}

pub fn insert_all<T: Record>(db_path: impl AsRef<Path>, records: &[T]) -> Result<usize> {
    SqliteStore::at(db_path).insert_all(records)
}

pub fn update<T: Record>(db_path: impl AsRef<Path>, record: &T) -> Result<usize> {
    SqliteStore::at(db_path).update(record)
}

pub fn update_columns<T: Record>(
    db_path: impl AsRef<Path>,
    key: impl Into<Value>,
    assignments: &Conditions,
) -> Result<usize> {
    SqliteStore::at(db_path).update_columns::<T>(key, assignments)
}

pub fn delete<T: Record>(db_path: impl AsRef<Path>, key: impl Into<Value>) -> Result<usize> {
    SqliteStore::at(db_path).delete::<T>(key)
}

/// An empty condition set deletes every row in the table.
pub fn delete_where<T: Record>(db_path: impl AsRef<Path>, conditions: &Conditions) -> Result<usize> {
    SqliteStore::at(db_path).delete_where::<T>(conditions)
}

pub fn select<T: Record>(db_path: impl AsRef<Path>, key: impl Into<Value>) -> Result<Option<T>> {
    SqliteStore::at(db_path).select(key)
}

pub fn select_where<T: Record>(db_path: impl AsRef<Path>, conditions: &Conditions) -> Result<Vec<T>> {
    SqliteStore::at(db_path).select_where(conditions)
}

pub fn count<T: Record>(db_path: impl AsRef<Path>, conditions: &Conditions) -> Result<u64> {
    SqliteStore::at(db_path).count::<T>(conditions)
}
