//! INSERT, UPDATE and DELETE against one collection.
//!
//! Each call is one-shot: values and criteria are bound from a fresh
//! parameter cursor, keys resolved, then the store is called. Store failures
//! come back wrapped with the table name.

use parking_lot::RwLock;
use serde_json::Value;

use super::keys;
use crate::config::Config;
use crate::criteria::{self, ParameterCursor};
use crate::error::{DbError, DbResult};
use crate::sql::{Statement, StatementKind};
use crate::storage::{DocumentCollection, Predicate};

/// Run a modifying statement; returns the number of affected documents.
pub fn execute(
    config: &RwLock<Config>,
    collection: &dyn DocumentCollection,
    statement: &Statement,
    parameters: &[Value],
) -> DbResult<usize> {
    let mut cursor = ParameterCursor::new(parameters);
    match statement.kind {
        StatementKind::Insert => run_insert(config, collection, statement, &mut cursor),
        StatementKind::Update => run_update(config, collection, statement, &mut cursor),
        StatementKind::Delete => run_delete(config, collection, statement, &mut cursor),
        StatementKind::Select => Err(DbError::ParseError(format!(
            "expected INSERT, UPDATE or DELETE on {}, found SELECT",
            statement.table
        ))),
    }
}

fn run_insert(
    config: &RwLock<Config>,
    collection: &dyn DocumentCollection,
    statement: &Statement,
    cursor: &mut ParameterCursor<'_>,
) -> DbResult<usize> {
    let mut record = statement.column_value_map(cursor)?;
    keys::resolve_key(&config.read(), &statement.table, &mut record, false);

    collection
        .insert(record)
        .map_err(|e| DbError::store(&statement.table, e))?;
    Ok(1)
}

fn run_update(
    config: &RwLock<Config>,
    collection: &dyn DocumentCollection,
    statement: &Statement,
    cursor: &mut ParameterCursor<'_>,
) -> DbResult<usize> {
    let mut record = statement.column_value_map(cursor)?;
    let predicate = keyed_predicate(config, statement, cursor)?;

    // The store replaces whole documents; fields the statement does not set
    // are carried over from the current version.
    let previous = collection
        .find(Some(&predicate))
        .and_then(|mut found| found.next_document())
        .map_err(|e| DbError::store(&statement.table, e))?;
    if let Some(previous) = previous {
        for (field, value) in previous {
            record.entry(field).or_insert(value);
        }
    }

    collection
        .update(&predicate, record)
        .map_err(|e| DbError::store(&statement.table, e))
}

fn run_delete(
    config: &RwLock<Config>,
    collection: &dyn DocumentCollection,
    statement: &Statement,
    cursor: &mut ParameterCursor<'_>,
) -> DbResult<usize> {
    if statement.criteria.is_empty() {
        let count = collection
            .count()
            .map_err(|e| DbError::store(&statement.table, e))?;
        if count == 0 {
            return Ok(0);
        }
        tracing::warn!("Dropping {} with {} documents", statement.table, count);
        collection
            .drop_collection()
            .map_err(|e| DbError::store(&statement.table, e))?;
        return Ok(count);
    }

    let predicate = keyed_predicate(config, statement, cursor)?;
    collection
        .remove_all(&predicate)
        .map_err(|e| DbError::store(&statement.table, e))
}

/// WHERE predicate with the logical key moved to the native key field
pub(crate) fn keyed_predicate(
    config: &RwLock<Config>,
    statement: &Statement,
    cursor: &mut ParameterCursor<'_>,
) -> DbResult<Predicate> {
    let mut predicate = criteria::translate(&statement.criteria, cursor)?;
    keys::resolve_key(&config.read(), &statement.table, &mut predicate, true);
    Ok(predicate)
}
