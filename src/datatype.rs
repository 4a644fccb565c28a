// used for persistence
use rusqlite::types::{Value as SqlValue, ValueRef};
// rows and parameters are JSON-shaped so they serialize as-is
use serde_json::{Map, Number, Value};

/// A single result row: field name to value.
pub type Row = Map<String, Value>;
/// The ordered rows of one request.
pub type ResultSet = Vec<Row>;

/// Dates are stored as UTC text in this form, so they compare as strings.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn now_text() -> String {
    chrono::Utc::now().format(DATE_FORMAT).to_string()
}

// ------------- SQLite -> JSON -------------
pub fn from_sql(value: ValueRef) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(Number::from(i)),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|x| Value::Number(Number::from(*x))).collect()),
    }
}

// ------------- JSON -> SQLite -------------
/// Converts a pool value into something SQLite can bind. Lists and objects
/// travel as JSON text, which the generated SQL unpacks with `json_each`.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Identifier of a row, when it carries an integral `id`.
pub fn row_id(row: &Row) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}
