//! Schema introspection for a store without a fixed schema.
//!
//! Columns are discovered by sampling documents: the union of field names over
//! at most `max_sampled_documents` documents, typed from the last sample read.

use serde::Serialize;
use serde_json::Value;

use crate::error::{DbError, DbResult};
use crate::manager::Manager;
use crate::storage::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
}

impl ColumnType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ColumnType::Null,
            Value::Bool(_) => ColumnType::Bool,
            Value::Number(n) if n.is_f64() => ColumnType::Float,
            Value::Number(_) => ColumnType::Int,
            Value::String(_) => ColumnType::String,
            Value::Array(_) => ColumnType::Array,
            Value::Object(_) => ColumnType::Object,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Null => "null",
            ColumnType::Bool => "bool",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Array => "array",
            ColumnType::Object => "object",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampled column; `column_type` is `None` when the last sample lacks it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: Option<ColumnType>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Dialect;

impl Dialect {
    /// Logical key column of `table`
    pub fn get_key_name(&self, manager: &Manager, table: &str) -> String {
        manager.config().key_column(table).to_string()
    }

    pub fn get_columns(&self, manager: &Manager, table: &str) -> DbResult<Vec<Column>> {
        let limit = manager.config().max_sampled_documents;
        let connection = manager.connection_provider().get()?;
        let session = connection.session()?;
        let collection = session.collection(&connection.database(), table);

        let mut names: Vec<String> = Vec::new();
        let mut last: Option<Document> = None;
        let mut cursor = collection
            .find(None)
            .map_err(|e| DbError::store(table, e))?;
        for _ in 0..limit {
            let Some(document) = cursor.next_document().map_err(|e| DbError::store(table, e))? else {
                break;
            };
            for name in document.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            last = Some(document);
        }

        Ok(names
            .into_iter()
            .map(|name| {
                let column_type = last
                    .as_ref()
                    .and_then(|document| document.get(&name))
                    .map(ColumnType::of);
                Column { name, column_type }
            })
            .collect())
    }

    pub fn drop_table(&self, manager: &Manager, datastore: &str, table: &str) -> DbResult<()> {
        let connection = manager.connection_provider().get()?;
        let session = connection.session()?;
        tracing::warn!("Dropping table {}.{}", datastore, table);
        let dropped = session
            .collection(datastore, table)
            .drop_collection()
            .map_err(|e| DbError::store(table, e));
        dropped
    }

    pub fn get_datastores(&self, manager: &Manager) -> DbResult<Vec<String>> {
        let connection = manager.connection_provider().get()?;
        connection.session()?.database_names()
    }

    pub fn get_current_datastore(&self, manager: &Manager) -> String {
        manager.config().database.clone()
    }

    pub fn get_tables(&self, manager: &Manager, datastore: &str) -> DbResult<Vec<String>> {
        let connection = manager.connection_provider().get()?;
        connection.session()?.collection_names(datastore)
    }

    /// Records are persisted one statement at a time
    pub fn can_persist_batch(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_type_of() {
        assert_eq!(ColumnType::of(&json!(1)), ColumnType::Int);
        assert_eq!(ColumnType::of(&json!(1.5)), ColumnType::Float);
        assert_eq!(ColumnType::of(&json!("a")), ColumnType::String);
        assert_eq!(ColumnType::of(&json!(null)), ColumnType::Null);
        assert_eq!(ColumnType::of(&json!({"a": 1})).to_string(), "object");
    }

    #[test]
    fn test_no_batch_persistence() {
        assert!(!Dialect.can_persist_batch());
    }
}
