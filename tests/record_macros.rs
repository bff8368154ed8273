// Tests for the impl_record macro
//
// Checks that the generated Record impl describes the struct the way the
// macro invocation declares it, and that values flow both ways through it.

use chrono::{DateTime, TimeZone, Utc};
use sqlite_orm::{
    find_primary_key, impl_record, resolve_table, Error, FieldKind, Record, Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct MyData {
    id: i32,
    text_field: String,
    number_field: u32,
    boolean_field: bool,
    float_field: f64,
    bytes_field: Vec<u8>,
    created_at: Option<DateTime<Utc>>,
}

impl_record! {
    MyData as "my_data" {
        id: Integer [primary_key],
        text_field: Text as "text",
        number_field: Integer,
        boolean_field: Boolean,
        float_field: Real,
        bytes_field: Blob,
        created_at: Timestamp as "created",
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct User {
    name: String,
    email: String,
}

impl_record! {
    User {
        name: Text,
        email: Text as "Email",
    }
}

#[test]
fn test_record_type_follows_declaration() {
    let record_type = MyData::record_type();
    assert_eq!(record_type.type_name, "MyData");
    assert_eq!(record_type.table.as_deref(), Some("my_data"));

    let names: Vec<&str> = record_type.fields.iter().map(|f| &*f.name).collect();
    assert_eq!(
        names,
        [
            "id",
            "text_field",
            "number_field",
            "boolean_field",
            "float_field",
            "bytes_field",
            "created_at"
        ]
    );
    assert_eq!(record_type.fields[6].kind, FieldKind::Timestamp);
    assert_eq!(find_primary_key(&record_type).map(|f| &*f.name), Some("id"));

    let table = resolve_table(&record_type).unwrap();
    assert_eq!(table.name, "my_data");
    assert_eq!(table.columns[1].name, "text");
    assert_eq!(table.columns[6].name, "created");
    assert_eq!(table.primary_key().unwrap().name, "id");
}

#[test]
fn test_table_defaults_to_type_name() {
    let table = resolve_table(&User::record_type()).unwrap();
    assert_eq!(table.name, "User");
    assert_eq!(table.columns[0].name, "name");
    assert_eq!(table.columns[1].name, "Email");
    assert!(matches!(table.primary_key(), Err(Error::NoPrimaryKey { .. })));
}

#[test]
fn test_values_are_in_declaration_order() {
    let created = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
    let data = MyData {
        id: 9,
        text_field: "test".to_string(),
        number_field: 42,
        boolean_field: true,
        float_field: 1.25,
        bytes_field: vec![1, 2, 3],
        created_at: Some(created),
    };
    assert_eq!(
        data.values(),
        vec![
            Value::Integer(9),
            Value::Text("test".to_string()),
            Value::Integer(42),
            Value::Boolean(true),
            Value::Real(1.25),
            Value::Blob(vec![1, 2, 3]),
            Value::Timestamp(created),
        ]
    );
    assert_eq!(MyData::default().values()[6], Value::Null);
}

#[test]
fn test_set_value_assigns_by_field_name() {
    let mut data = MyData::default();
    data.set_value("text_field", Value::from("hello")).unwrap();
    data.set_value("number_field", Value::Integer(7)).unwrap();
    data.set_value("boolean_field", Value::Integer(1)).unwrap();
    assert_eq!(data.text_field, "hello");
    assert_eq!(data.number_field, 7);
    assert!(data.boolean_field);

    let err = data.set_value("text", Value::from("column, not field")).unwrap_err();
    assert!(matches!(err, Error::UnknownField { .. }));
}

#[test]
fn test_set_value_rejects_mismatched_values() {
    let mut data = MyData::default();

    let err = data.set_value("id", Value::from("nine")).unwrap_err();
    assert!(matches!(err, Error::Conversion { expected: "INTEGER", .. }));

    let err = data.set_value("number_field", Value::Integer(-1)).unwrap_err();
    assert!(matches!(err, Error::Conversion { expected: "u32", .. }));
}
