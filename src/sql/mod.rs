//! SQL front end: statement tree plus the default text parser.

pub mod lexer;
pub mod parser;
pub mod statement;

pub use lexer::{SqlLexer, Token};
pub use parser::{SqlParser, SqlStatementParser, StatementParser};
pub use statement::{Column, Condition, Criteria, Criterion, Statement, StatementKind};
