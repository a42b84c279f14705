pub mod config;
pub mod connection;
pub mod criteria;
pub mod dialect;
pub mod error;
pub mod manager;
pub mod sql;
pub mod storage;

pub use config::{Config, Credential, NATIVE_KEY_FIELD};
pub use connection::{ConnectionProvider, PooledConnection};
pub use criteria::{translate, Operator, ParameterCursor};
pub use dialect::{ColumnType, Dialect};
pub use error::{DbError, DbResult};
pub use manager::{Manager, Row, SqlResult};
pub use sql::{SqlStatementParser, Statement, StatementParser};
pub use storage::{Document, DocumentStore, MemoryStore, Predicate};
