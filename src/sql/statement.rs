//! Parsed statement tree consumed by the executors.
//!
//! Operands and value expressions are kept as SQL text (`?`, `'abc'`, `12`,
//! `?, ?`); binding and coercion happen at execution time against the
//! parameter cursor.

use serde_json::Value;

use crate::criteria::{self, ParameterCursor};
use crate::error::DbResult;
use crate::storage::Document;

pub const PLACEHOLDER: char = '?';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Select => "SELECT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub alias: Option<String>,
    /// Value expression of INSERT/UPDATE columns
    pub expression: Option<String>,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            expression: None,
        }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            ..Self::new(name)
        }
    }

    pub fn assigned(name: &str, expression: &str) -> Self {
        Self {
            expression: Some(expression.to_string()),
            ..Self::new(name)
        }
    }

    /// Name the column has in result rows
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Comparison between a field and a value expression
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: String,
    pub operator: String,
    pub right: String,
    pub inverse: bool,
}

impl Condition {
    pub fn new(left: &str, operator: &str, right: &str) -> Self {
        Self {
            left: left.to_string(),
            operator: operator.to_string(),
            right: right.to_string(),
            inverse: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.inverse = !self.inverse;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Condition(Condition),
    Group(Criteria),
}

/// Criteria combined by one logical operator (AND when unset)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub criteria: Vec<Criterion>,
    pub logical_operator: Option<String>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: String,
    pub columns: Vec<Column>,
    pub criteria: Criteria,
    pub placeholder_count: usize,
}

impl Statement {
    /// Column name to bound value for INSERT/UPDATE, consuming parameters from
    /// the cursor left to right.
    pub fn column_value_map(&self, cursor: &mut ParameterCursor<'_>) -> DbResult<Document> {
        let mut record = Document::new();
        for column in &self.columns {
            let value = match &column.expression {
                Some(expression) => criteria::bind_value(expression, cursor, false)?,
                None => Value::Null,
            };
            record.insert(column.name.clone(), value);
        }
        Ok(record)
    }

    /// Names rows are reported under, in declared order
    pub fn output_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| column.output_name().to_string())
            .collect()
    }
}
