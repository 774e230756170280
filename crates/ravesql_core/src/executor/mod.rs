//! Executor capability consumed by the execution engine.
//!
//! # Responsibility
//! - Define the statement-execution contract (`SqlExecutor`).
//! - Define the raw row shape (`Record`) handed to the mapper.
//!
//! # Invariants
//! - Executors never interpret SQL text beyond binding named parameters.
//! - `execute_batch` returns one count per parameter set, in input order.
//!
//! # See also
//! - `sqlite` for the bundled SQLite executor.

use crate::params::ParameterSet;
use rusqlite::types::Value;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::error::Error;

mod sqlite;

pub use sqlite::{open_db, open_db_in_memory, BindError, SqliteExecutor};

/// Opaque executor fault, preserved as the cause of `ExecutionFailure`.
pub type ExecutorError = Box<dyn Error + Send + Sync + 'static>;

/// Statement execution against a relational store.
pub trait SqlExecutor: Send + Sync {
    /// Runs a row-returning statement.
    fn query(&self, sql: &str, params: &ParameterSet) -> Result<Vec<Record>, ExecutorError>;

    /// Runs a statement and returns the affected-row count.
    fn execute(&self, sql: &str, params: &ParameterSet) -> Result<usize, ExecutorError>;

    /// Runs one statement per parameter set and returns each affected count.
    fn execute_batch(
        &self,
        sql: &str,
        batch: &[ParameterSet],
    ) -> Result<Vec<usize>, ExecutorError>;
}

impl<E: SqlExecutor + ?Sized> SqlExecutor for std::sync::Arc<E> {
    fn query(&self, sql: &str, params: &ParameterSet) -> Result<Vec<Record>, ExecutorError> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &ParameterSet) -> Result<usize, ExecutorError> {
        (**self).execute(sql, params)
    }

    fn execute_batch(
        &self,
        sql: &str,
        batch: &[ParameterSet],
    ) -> Result<Vec<usize>, ExecutorError> {
        (**self).execute_batch(sql, batch)
    }
}

/// One result row as ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.push(column, value);
        self
    }

    /// Returns the first value whose column matches `column`, ignoring case.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            match value {
                Value::Null => map.serialize_entry(column, &Option::<i64>::None)?,
                Value::Integer(number) => map.serialize_entry(column, number)?,
                Value::Real(number) => map.serialize_entry(column, number)?,
                Value::Text(text) => map.serialize_entry(column, text)?,
                Value::Blob(bytes) => map.serialize_entry(column, bytes)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::Record;
    use rusqlite::types::Value;

    #[test]
    fn get_is_case_insensitive_and_keeps_first_match() {
        let record = Record::new()
            .with("ID", Value::Integer(1))
            .with("id", Value::Integer(2));

        assert_eq!(record.get("Id"), Some(&Value::Integer(1)));
        assert_eq!(record.column_names(), vec!["ID", "id"]);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn serializes_as_json_object() {
        let record = Record::new()
            .with("id", Value::Integer(1))
            .with("name", Value::Text("Alice".to_string()))
            .with("score", Value::Real(1.5))
            .with("note", Value::Null);

        let json = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(
            json,
            serde_json::json!({ "id": 1, "name": "Alice", "score": 1.5, "note": null })
        );
    }
}
