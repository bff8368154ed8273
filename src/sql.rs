//! SQL text and parameter generation from resolved table metadata.
//!
//! Every value reaches the store as a bound positional parameter (`?N`);
//! only identifiers are written into the statement text, and those are quoted.

use crate::error::{Error, Result};
use crate::metadata::TableDescriptor;
use crate::value::Value;

/// Positional parameter bindings for SQL queries
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: Vec<Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return the placeholder that refers to it.
    pub fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// SQL statement with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Ordered column to value equality conditions.
///
/// Used both as a WHERE filter and as the SET list of a partial update.
/// Setting a column twice replaces its value in place.
///
/// Every entry renders as `"column" = ?N`. A [`Value::Null`] filter therefore
/// compares with `=` against NULL and matches no rows; there is no `IS NULL`
/// form. As an assignment, `Null` clears the column.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Value)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conditions = Conditions::new();
        for (column, value) in iter {
            conditions.insert(&column.into(), value);
        }
        conditions
    }
}

/// Quote an identifier for SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(table: &TableDescriptor) -> String {
    table
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_values(table: &TableDescriptor, values: &[Value]) -> Result<()> {
    if values.len() != table.columns.len() {
        return Err(Error::ValueCount {
            table: table.name.clone(),
            expected: table.columns.len(),
            found: values.len(),
        });
    }
    Ok(())
}

/// `"c1" = ?1 AND "c2" = ?2 ...` for a condition set, or `None` when empty.
///
/// Every column must be declared by `table`.
pub fn where_clause(
    table: &TableDescriptor,
    conditions: &Conditions,
    params: &mut Params,
) -> Result<Option<String>> {
    if conditions.is_empty() {
        return Ok(None);
    }
    let mut clauses = Vec::with_capacity(conditions.len());
    for (column, value) in conditions.iter() {
        let column = table.column(column)?;
        let placeholder = params.bind(value.clone());
        clauses.push(format!("{} = {}", quote_ident(&column.name), placeholder));
    }
    Ok(Some(clauses.join(" AND ")))
}

fn filtered(mut statement: String, clause: Option<String>) -> String {
    if let Some(clause) = clause {
        statement.push_str(" WHERE ");
        statement.push_str(&clause);
    }
    statement
}

pub fn create_table(table: &TableDescriptor) -> SqlQuery {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut column = format!("{} {}", quote_ident(&c.name), c.sql_type);
            if c.primary_key {
                column.push_str(" PRIMARY KEY");
            }
            column
        })
        .collect();
    SqlQuery::new(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&table.name),
        columns.join(", ")
    ))
}

pub fn drop_table(table: &TableDescriptor) -> SqlQuery {
    SqlQuery::new(format!("DROP TABLE IF EXISTS {}", quote_ident(&table.name)))
}

/// `INSERT` binding one value per column, in column order.
pub fn insert(table: &TableDescriptor, values: Vec<Value>) -> Result<SqlQuery> {
    check_values(table, &values)?;
    let mut params = Params::new();
    let placeholders: Vec<String> = values.into_iter().map(|v| params.bind(v)).collect();
    let statement = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&table.name),
        column_list(table),
        placeholders.join(", ")
    );
    Ok(SqlQuery::new(statement).with_params(params))
}

/// Full-record `UPDATE` keyed on the primary key.
///
/// The key column appears in both SET and WHERE and shares one placeholder.
pub fn update(table: &TableDescriptor, values: Vec<Value>) -> Result<SqlQuery> {
    let key = table.primary_key()?;
    check_values(table, &values)?;
    let mut params = Params::new();
    let mut assignments = Vec::with_capacity(values.len());
    let mut key_placeholder = String::new();
    for (column, value) in table.columns.iter().zip(values) {
        let placeholder = params.bind(value);
        if column.name == key.name {
            key_placeholder.clone_from(&placeholder);
        }
        assignments.push(format!("{} = {}", quote_ident(&column.name), placeholder));
    }
    let statement = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_ident(&table.name),
        assignments.join(", "),
        quote_ident(&key.name),
        key_placeholder
    );
    Ok(SqlQuery::new(statement).with_params(params))
}

/// Partial `UPDATE`: only the columns in `assignments` appear in SET.
pub fn update_columns(
    table: &TableDescriptor,
    key: Value,
    assignments: &Conditions,
) -> Result<SqlQuery> {
    let key_column = table.primary_key()?;
    if assignments.is_empty() {
        return Err(Error::EmptyUpdate {
            table: table.name.clone(),
        });
    }
    let mut params = Params::new();
    let mut sets = Vec::with_capacity(assignments.len());
    for (column, value) in assignments.iter() {
        let column = table.column(column)?;
        let placeholder = params.bind(value.clone());
        sets.push(format!("{} = {}", quote_ident(&column.name), placeholder));
    }
    let key_placeholder = params.bind(key);
    let statement = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_ident(&table.name),
        sets.join(", "),
        quote_ident(&key_column.name),
        key_placeholder
    );
    Ok(SqlQuery::new(statement).with_params(params))
}

pub fn delete_by_key(table: &TableDescriptor, key: Value) -> Result<SqlQuery> {
    let key_column = table.primary_key()?;
    let mut params = Params::new();
    let placeholder = params.bind(key);
    let statement = format!(
        "DELETE FROM {} WHERE {} = {}",
        quote_ident(&table.name),
        quote_ident(&key_column.name),
        placeholder
    );
    Ok(SqlQuery::new(statement).with_params(params))
}

/// `DELETE` of every row matching `conditions`; an empty set matches every row.
pub fn delete_where(table: &TableDescriptor, conditions: &Conditions) -> Result<SqlQuery> {
    let mut params = Params::new();
    let clause = where_clause(table, conditions, &mut params)?;
    let statement = filtered(format!("DELETE FROM {}", quote_ident(&table.name)), clause);
    Ok(SqlQuery::new(statement).with_params(params))
}

pub fn select_by_key(table: &TableDescriptor, key: Value) -> Result<SqlQuery> {
    let key_column = table.primary_key()?;
    let mut params = Params::new();
    let placeholder = params.bind(key);
    let statement = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(table),
        quote_ident(&table.name),
        quote_ident(&key_column.name),
        placeholder
    );
    Ok(SqlQuery::new(statement).with_params(params))
}

pub fn select_where(table: &TableDescriptor, conditions: &Conditions) -> Result<SqlQuery> {
    let mut params = Params::new();
    let clause = where_clause(table, conditions, &mut params)?;
    let statement = filtered(format!("SELECT * FROM {}", quote_ident(&table.name)), clause);
    Ok(SqlQuery::new(statement).with_params(params))
}

pub fn count(table: &TableDescriptor, conditions: &Conditions) -> Result<SqlQuery> {
    let mut params = Params::new();
    let clause = where_clause(table, conditions, &mut params)?;
    let statement = filtered(
        format!("SELECT COUNT(*) FROM {}", quote_ident(&table.name)),
        clause,
    );
    Ok(SqlQuery::new(statement).with_params(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::resolve_table;
    use crate::record::{FieldDescriptor, FieldKind, RecordType};

    fn table() -> TableDescriptor {
        resolve_table(
            &RecordType::new("DataSample")
                .field(FieldDescriptor::new("Id", FieldKind::Integer).primary_key())
                .field(FieldDescriptor::new("Name", FieldKind::Text))
                .field(FieldDescriptor::new("Enable", FieldKind::Boolean)),
        )
        .unwrap()
    }

    fn keyless() -> TableDescriptor {
        resolve_table(&RecordType::new("Log").field(FieldDescriptor::new("Line", FieldKind::Text)))
            .unwrap()
    }

    fn row() -> Vec<Value> {
        vec![Value::Integer(1), Value::from("TEST"), Value::Boolean(false)]
    }

    #[test]
    fn create_and_drop() {
        assert_eq!(
            create_table(&table()).statement,
            r#"CREATE TABLE IF NOT EXISTS "DataSample" ("Id" INTEGER PRIMARY KEY, "Name" TEXT, "Enable" BOOLEAN)"#
        );
        assert_eq!(
            drop_table(&table()).statement,
            r#"DROP TABLE IF EXISTS "DataSample""#
        );
    }

    #[test]
    fn insert_binds_every_column() {
        let query = insert(&table(), row()).unwrap();
        assert_eq!(
            query.statement,
            r#"INSERT INTO "DataSample" ("Id", "Name", "Enable") VALUES (?1, ?2, ?3)"#
        );
        assert_eq!(query.params.values, row());
    }

    #[test]
    fn hostile_text_is_bound_not_interpolated() {
        let mut values = row();
        values[1] = Value::from("x'); DROP TABLE DataSample; --");
        let query = insert(&table(), values).unwrap();
        assert!(!query.statement.contains("DROP"));
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn insert_checks_value_count() {
        let err = insert(&table(), vec![Value::Integer(1)]).unwrap_err();
        assert!(matches!(err, Error::ValueCount { expected: 3, found: 1, .. }));
    }

    #[test]
    fn update_reuses_key_placeholder() {
        let query = update(&table(), row()).unwrap();
        assert_eq!(
            query.statement,
            r#"UPDATE "DataSample" SET "Id" = ?1, "Name" = ?2, "Enable" = ?3 WHERE "Id" = ?1"#
        );
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn partial_update_sets_only_named_columns() {
        let assignments = Conditions::new().with("Name", "renamed");
        let query = update_columns(&table(), Value::Integer(4), &assignments).unwrap();
        assert_eq!(
            query.statement,
            r#"UPDATE "DataSample" SET "Name" = ?1 WHERE "Id" = ?2"#
        );
        assert_eq!(
            query.params.values,
            vec![Value::from("renamed"), Value::Integer(4)]
        );

        let err = update_columns(&table(), Value::Integer(4), &Conditions::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyUpdate { .. }));
    }

    #[test]
    fn key_operations_need_a_primary_key() {
        let table = keyless();
        let key = || Value::Integer(1);
        assert!(matches!(update(&table, vec![Value::from("a")]), Err(Error::NoPrimaryKey { .. })));
        assert!(matches!(delete_by_key(&table, key()), Err(Error::NoPrimaryKey { .. })));
        assert!(matches!(select_by_key(&table, key()), Err(Error::NoPrimaryKey { .. })));
        assert!(matches!(
            update_columns(&table, key(), &Conditions::new().with("Line", "b")),
            Err(Error::NoPrimaryKey { .. })
        ));
    }

    #[test]
    fn select_by_key_lists_columns() {
        let query = select_by_key(&table(), Value::Integer(1)).unwrap();
        assert_eq!(
            query.statement,
            r#"SELECT "Id", "Name", "Enable" FROM "DataSample" WHERE "Id" = ?1"#
        );
    }

    #[test]
    fn empty_conditions_produce_no_where() {
        let all = Conditions::new();
        assert_eq!(select_where(&table(), &all).unwrap().statement, r#"SELECT * FROM "DataSample""#);
        assert_eq!(delete_where(&table(), &all).unwrap().statement, r#"DELETE FROM "DataSample""#);
        assert_eq!(
            count(&table(), &all).unwrap().statement,
            r#"SELECT COUNT(*) FROM "DataSample""#
        );
    }

    #[test]
    fn conditions_join_with_and() {
        let conditions = Conditions::new().with("Name", "TEST").with("Enable", true);
        let query = select_where(&table(), &conditions).unwrap();
        assert_eq!(
            query.statement,
            r#"SELECT * FROM "DataSample" WHERE "Name" = ?1 AND "Enable" = ?2"#
        );
        assert_eq!(query.params.values, vec![Value::from("TEST"), Value::Boolean(true)]);
    }

    #[test]
    fn conditions_replace_duplicate_columns() {
        let conditions: Conditions = [("Name", "a"), ("Name", "b")].into_iter().collect();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions.iter().next(), Some(("Name", &Value::from("b"))));
    }

    #[test]
    fn undeclared_condition_column_is_rejected() {
        let conditions = Conditions::new().with("Name\" OR 1=1 --", 1_i64);
        let err = select_where(&table(), &conditions).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
