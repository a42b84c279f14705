use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::dml;
use crate::config::Config;
use crate::criteria::ParameterCursor;
use crate::error::{DbError, DbResult};
use crate::sql::{Statement, StatementKind};
use crate::storage::{Document, DocumentCollection};

/// One result row: output column names in declared order plus the values
/// keyed by those names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Document,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// Map the row onto a typed record
    pub fn decode<T: DeserializeOwned>(self) -> DbResult<T> {
        Ok(serde_json::from_value(self.into_value())?)
    }
}

/// Stream the rows of a SELECT to `handler` until it returns `false` or the
/// cursor is exhausted. Returns the number of rows delivered.
pub fn execute(
    config: &RwLock<Config>,
    collection: &dyn DocumentCollection,
    statement: &Statement,
    parameters: &[Value],
    handler: &mut dyn FnMut(Row) -> DbResult<bool>,
) -> DbResult<usize> {
    if statement.kind != StatementKind::Select {
        return Err(DbError::ParseError(format!(
            "expected SELECT on {}, found {}",
            statement.table, statement.kind
        )));
    }

    let mut cursor = ParameterCursor::new(parameters);
    let predicate = dml::keyed_predicate(config, statement, &mut cursor)?;
    let filter = (!predicate.is_empty()).then_some(&predicate);

    let mut documents = collection
        .find(filter)
        .map_err(|e| DbError::store(&statement.table, e))?;

    let mut count = 0;
    while let Some(document) = documents
        .next_document()
        .map_err(|e| DbError::store(&statement.table, e))?
    {
        count += 1;
        tracing::trace!("{} row {}", statement.table, count);
        if !handler(to_row(statement, document))? {
            break;
        }
    }
    Ok(count)
}

/// Project a document onto the statement's columns, renaming aliased ones.
/// `SELECT *` keeps every field.
fn to_row(statement: &Statement, mut document: Document) -> Row {
    if statement.columns.is_empty() {
        return Row {
            columns: document.keys().cloned().collect(),
            values: document,
        };
    }

    let mut values = Document::new();
    for column in &statement.columns {
        let value = document.remove(&column.name).unwrap_or(Value::Null);
        values.insert(column.output_name().to_string(), value);
    }
    Row {
        columns: statement.output_columns(),
        values,
    }
}
