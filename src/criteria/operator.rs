use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::{DbError, DbResult};

/// Comparison and membership operators understood in criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
}

/// Builds the native condition for a bound value
pub type PredicateBuilder = fn(Value) -> DbResult<Value>;

static OPERATOR_TABLE: Lazy<HashMap<Operator, PredicateBuilder>> = Lazy::new(|| {
    let mut table: HashMap<Operator, PredicateBuilder> = HashMap::new();
    table.insert(Operator::Eq, |v| Ok(json!({ "$eq": v })));
    table.insert(Operator::NotEq, |v| Ok(json!({ "$ne": v })));
    table.insert(Operator::Lt, |v| Ok(json!({ "$lt": v })));
    table.insert(Operator::LtEq, |v| Ok(json!({ "$lte": v })));
    table.insert(Operator::Gt, |v| Ok(json!({ "$gt": v })));
    table.insert(Operator::GtEq, |v| Ok(json!({ "$gte": v })));
    table.insert(Operator::In, |v| Ok(json!({ "$in": as_list(v) })));
    table.insert(Operator::NotIn, |v| Ok(json!({ "$nin": as_list(v) })));
    table
});

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Lt,
        Operator::LtEq,
        Operator::Gt,
        Operator::GtEq,
        Operator::In,
        Operator::NotIn,
    ];

    /// Parse operator text, case-insensitively
    pub fn parse(text: &str) -> DbResult<Self> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match normalized.as_str() {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::LtEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::GtEq),
            "IN" => Ok(Operator::In),
            "NOT IN" => Ok(Operator::NotIn),
            _ => Err(DbError::UnsupportedOperator(text.to_string())),
        }
    }

    /// Parse operator text and apply a criterion's inverse flag.
    ///
    /// Only `=` and `IN` have an inverse form.
    pub fn resolve(text: &str, inverse: bool) -> DbResult<Self> {
        let operator = Self::parse(text)?;
        if !inverse {
            return Ok(operator);
        }
        match operator {
            Operator::Eq => Ok(Operator::NotEq),
            Operator::In => Ok(Operator::NotIn),
            other => Err(DbError::UnsupportedOperator(format!("NOT {}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Native condition for a bound value, e.g. `{"$lt": 3}`
    pub fn build(self, value: Value) -> DbResult<Value> {
        let builder = OPERATOR_TABLE
            .get(&self)
            .ok_or_else(|| DbError::UnsupportedOperator(self.to_string()))?;
        builder(value)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership operand: text splits on commas, arrays pass through, anything
/// else becomes a one-element list.
fn as_list(value: Value) -> Value {
    match value {
        Value::String(text) => Value::Array(
            text.split(',')
                .map(|item| Value::String(item.trim().to_string()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items),
        other => Value::Array(vec![other]),
    }
}
