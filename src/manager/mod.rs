//! SQL-shaped access to a document store.
//!
//! A [`Manager`] parses statement text, checks a session out of its pool and
//! runs the statement through the DML or query executor:
//!
//! ```no_run
//! use std::sync::Arc;
//! use docsql::{Config, Manager, MemoryStore};
//! use serde_json::json;
//!
//! let config = Config::new("127.0.0.1", "mydb").with_key_column("id");
//! let manager = Manager::new(config, Arc::new(MemoryStore::new()))?;
//! manager.execute("INSERT INTO users(id, name) VALUES(?, ?)", &[json!(1), json!("Name 1")])?;
//! # Ok::<(), docsql::DbError>(())
//! ```

pub mod dml;
pub mod keys;
pub mod query;

pub use query::Row;

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::connection::{ConnectionProvider, PooledConnection};
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::sql::{SqlStatementParser, Statement, StatementParser};
use crate::storage::DocumentStore;

/// Outcome of a modifying statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SqlResult {
    pub rows_affected: usize,
}

pub struct Manager {
    config: Arc<RwLock<Config>>,
    provider: ConnectionProvider,
    parser: Box<dyn StatementParser>,
    dialect: Dialect,
}

impl Manager {
    /// Create a manager over `store`; fails on a config without host or
    /// database.
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> DbResult<Self> {
        config.validate()?;
        let config = Arc::new(RwLock::new(config));
        Ok(Self {
            provider: ConnectionProvider::new(store, config.clone()),
            config,
            parser: Box::new(SqlStatementParser),
            dialect: Dialect,
        })
    }

    /// Replace the statement parser
    pub fn with_parser(mut self, parser: impl StatementParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read()
    }

    /// Change configuration in place; key columns take effect on the next
    /// statement.
    pub fn update_config(&self, update: impl FnOnce(&mut Config)) {
        update(&mut *self.config.write());
    }

    pub fn connection_provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn parse(&self, sql: &str, parameters: &[Value]) -> DbResult<Statement> {
        tracing::debug!("[{}]: {} {:?}", self.config.read().database, sql, parameters);
        self.parser.parse(sql)
    }

    /// Parse `sql` once for repeated or kind-dependent execution
    pub fn prepare(&self, sql: &str) -> DbResult<Statement> {
        self.parse(sql, &[])
    }

    /// Run an INSERT, UPDATE or DELETE
    pub fn execute(&self, sql: &str, parameters: &[Value]) -> DbResult<SqlResult> {
        let statement = self.parse(sql, parameters)?;
        self.execute_statement(&statement, parameters)
    }

    /// Run an already parsed INSERT, UPDATE or DELETE
    pub fn execute_statement(&self, statement: &Statement, parameters: &[Value]) -> DbResult<SqlResult> {
        let connection = self.provider.get()?;
        self.run_modification(&connection, statement, parameters)
    }

    pub fn execute_on_connection(
        &self,
        connection: &PooledConnection<'_>,
        sql: &str,
        parameters: &[Value],
    ) -> DbResult<SqlResult> {
        let statement = self.parse(sql, parameters)?;
        self.run_modification(connection, &statement, parameters)
    }

    fn run_modification(
        &self,
        connection: &PooledConnection<'_>,
        statement: &Statement,
        parameters: &[Value],
    ) -> DbResult<SqlResult> {
        let session = connection.session()?;
        let collection = session.collection(&connection.database(), &statement.table);
        let rows_affected = dml::execute(&self.config, collection.as_ref(), statement, parameters)?;
        Ok(SqlResult { rows_affected })
    }

    /// Stream SELECT rows to `handler`; returning `false` stops the read.
    pub fn read_all_with_handler<F>(&self, sql: &str, parameters: &[Value], handler: F) -> DbResult<()>
    where
        F: FnMut(Row) -> DbResult<bool>,
    {
        let statement = self.parse(sql, parameters)?;
        self.read_statement_with_handler(&statement, parameters, handler)
    }

    /// Stream the rows of an already parsed SELECT to `handler`
    pub fn read_statement_with_handler<F>(
        &self,
        statement: &Statement,
        parameters: &[Value],
        handler: F,
    ) -> DbResult<()>
    where
        F: FnMut(Row) -> DbResult<bool>,
    {
        let connection = self.provider.get()?;
        self.run_query(&connection, statement, parameters, handler)
    }

    pub fn read_all_on_connection_with_handler<F>(
        &self,
        connection: &PooledConnection<'_>,
        sql: &str,
        parameters: &[Value],
        handler: F,
    ) -> DbResult<()>
    where
        F: FnMut(Row) -> DbResult<bool>,
    {
        let statement = self.parse(sql, parameters)?;
        self.run_query(connection, &statement, parameters, handler)
    }

    fn run_query<F>(
        &self,
        connection: &PooledConnection<'_>,
        statement: &Statement,
        parameters: &[Value],
        mut handler: F,
    ) -> DbResult<()>
    where
        F: FnMut(Row) -> DbResult<bool>,
    {
        let session = connection.session()?;
        let collection = session.collection(&connection.database(), &statement.table);
        let count = query::execute(
            &self.config,
            collection.as_ref(),
            statement,
            parameters,
            &mut handler,
        )?;
        tracing::debug!("Read {} rows from {}", count, statement.table);
        Ok(())
    }

    /// Read every row into `T`
    pub fn read_all<T: DeserializeOwned>(&self, sql: &str, parameters: &[Value]) -> DbResult<Vec<T>> {
        let mut records = Vec::new();
        self.read_all_with_handler(sql, parameters, |row| {
            records.push(row.decode()?);
            Ok(true)
        })?;
        Ok(records)
    }

    /// Read the first row into `T`, if any
    pub fn read_single<T: DeserializeOwned>(&self, sql: &str, parameters: &[Value]) -> DbResult<Option<T>> {
        let mut record = None;
        self.read_all_with_handler(sql, parameters, |row| {
            record = Some(row.decode()?);
            Ok(false)
        })?;
        Ok(record)
    }

    /// Write records into `table`, updating those whose key already exists
    /// and inserting the rest. Returns `(inserted, updated)`.
    pub fn persist_all<T: Serialize>(&self, records: &[T], table: &str) -> DbResult<(usize, usize)> {
        let key_column = self.config.read().key_column(table).to_string();
        tracing::debug!(
            "Persisting {} records into {} (batch: {})",
            records.len(),
            table,
            self.dialect.can_persist_batch()
        );

        let connection = self.provider.get()?;
        let (mut inserted, mut updated) = (0, 0);
        for record in records {
            let document = match serde_json::to_value(record)? {
                Value::Object(document) => document,
                other => {
                    return Err(DbError::InternalError(format!(
                        "record for {} is not an object: {}",
                        table, other
                    )))
                }
            };

            let key = document.get(&key_column).filter(|v| !v.is_null()).cloned();
            let existing = match &key {
                Some(key) => self.key_exists(&connection, table, &key_column, key)?,
                None => false,
            };

            if let (true, Some(key)) = (existing, key) {
                let (names, mut values): (Vec<String>, Vec<Value>) = document
                    .into_iter()
                    .filter(|(name, _)| *name != key_column)
                    .unzip();
                if names.is_empty() {
                    // key-only record: nothing left to write
                    updated += 1;
                    continue;
                }
                let assignments: Vec<String> =
                    names.iter().map(|n| format!("{} = ?", quote_identifier(n))).collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    quote_identifier(table),
                    assignments.join(", "),
                    quote_identifier(&key_column)
                );
                values.push(key);
                updated += self.execute_on_connection(&connection, &sql, &values)?.rows_affected;
            } else {
                let (names, values): (Vec<String>, Vec<Value>) = document.into_iter().unzip();
                let columns: Vec<String> = names.iter().map(|n| quote_identifier(n)).collect();
                let sql = format!(
                    "INSERT INTO {}({}) VALUES({})",
                    quote_identifier(table),
                    columns.join(", "),
                    vec!["?"; names.len()].join(", ")
                );
                inserted += self.execute_on_connection(&connection, &sql, &values)?.rows_affected;
            }
        }
        Ok((inserted, updated))
    }

    fn key_exists(
        &self,
        connection: &PooledConnection<'_>,
        table: &str,
        key_column: &str,
        key: &Value,
    ) -> DbResult<bool> {
        let column = quote_identifier(key_column);
        let sql = format!("SELECT {} FROM {} WHERE {} = ?", column, quote_identifier(table), column);
        let mut found = false;
        self.read_all_on_connection_with_handler(connection, &sql, std::slice::from_ref(key), |_| {
            found = true;
            Ok(false)
        })?;
        Ok(found)
    }
}

/// `name` as a backtick-quoted identifier, inner backticks doubled
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &*self.config.read())
            .field("provider", &self.provider)
            .finish()
    }
}
