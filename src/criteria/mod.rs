//! Criteria translation: SQL criteria tree + bound parameters to a native
//! predicate.
//!
//! - `{"field": {"$eq": v}}` for a single condition
//! - `{"$and": [..]}` / `{"$or": [..]}` for several
//!
//! Placeholders are consumed left to right through a [`ParameterCursor`]
//! shared by the whole statement.

mod operator;

pub use operator::{Operator, PredicateBuilder};

use serde_json::Value;

use crate::error::{DbError, DbResult};
use crate::sql::statement::{Condition, Criteria, Criterion, PLACEHOLDER};
use crate::storage::document::{AND_OPERATOR, OR_OPERATOR};
use crate::storage::Predicate;

/// Positional parameters plus how many have been consumed
#[derive(Debug)]
pub struct ParameterCursor<'a> {
    parameters: &'a [Value],
    position: usize,
}

impl<'a> ParameterCursor<'a> {
    pub fn new(parameters: &'a [Value]) -> Self {
        Self {
            parameters,
            position: 0,
        }
    }

    /// Consume the next parameter
    pub fn next_value(&mut self) -> DbResult<&'a Value> {
        let value = self
            .parameters
            .get(self.position)
            .ok_or_else(|| DbError::BindingError {
                index: self.position,
                len: self.parameters.len(),
            })?;
        self.position += 1;
        Ok(value)
    }

    /// Consume the next `count` parameters
    pub fn take(&mut self, count: usize) -> DbResult<Vec<Value>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.next_value()?.clone());
        }
        Ok(values)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.parameters.len() - self.position
    }
}

pub fn has_placeholders(text: &str) -> bool {
    text.contains(PLACEHOLDER)
}

/// Translate a criteria tree into a native predicate.
///
/// Empty criteria give an empty predicate.
pub fn translate(criteria: &Criteria, cursor: &mut ParameterCursor<'_>) -> DbResult<Predicate> {
    match criteria.criteria.as_slice() {
        [] => Ok(Predicate::new()),
        [single] => translate_criterion(single, cursor),
        many => {
            let logical_operator = match criteria.logical_operator.as_deref() {
                Some(op) if op.trim().eq_ignore_ascii_case("OR") => OR_OPERATOR,
                _ => AND_OPERATOR,
            };
            let mut translated = Vec::with_capacity(many.len());
            for criterion in many {
                translated.push(Value::Object(translate_criterion(criterion, cursor)?));
            }
            let mut predicate = Predicate::new();
            predicate.insert(logical_operator.to_string(), Value::Array(translated));
            Ok(predicate)
        }
    }
}

pub fn translate_criterion(
    criterion: &Criterion,
    cursor: &mut ParameterCursor<'_>,
) -> DbResult<Predicate> {
    match criterion {
        Criterion::Condition(condition) => translate_condition(condition, cursor),
        Criterion::Group(group) => translate(group, cursor),
    }
}

/// Translate one comparison. The field is the operand without placeholders.
pub fn translate_condition(
    condition: &Condition,
    cursor: &mut ParameterCursor<'_>,
) -> DbResult<Predicate> {
    let (field, expression) = if has_placeholders(&condition.left) {
        (&condition.right, &condition.left)
    } else {
        (&condition.left, &condition.right)
    };

    let operator = Operator::resolve(&condition.operator, condition.inverse)?;
    let value = bind_value(expression, cursor, operator.is_membership())?;

    let mut predicate = Predicate::new();
    predicate.insert(field.trim().to_string(), operator.build(value)?);
    Ok(predicate)
}

/// Resolve a value expression against the cursor.
///
/// - no placeholder: literal coercion (a comma list when `membership`)
/// - one placeholder: the next parameter; text parameters are substituted
///   into the literal
/// - several placeholders: that many parameters, as an array
pub fn bind_value(
    expression: &str,
    cursor: &mut ParameterCursor<'_>,
    membership: bool,
) -> DbResult<Value> {
    match expression.matches(PLACEHOLDER).count() {
        0 if membership => coerce_literal_list(expression),
        0 => coerce_literal(expression),
        1 => match cursor.next_value()? {
            Value::String(text) => {
                let trimmed = expression.trim();
                let template = unquote(trimmed).unwrap_or_else(|| trimmed.to_string());
                Ok(Value::String(template.replacen(PLACEHOLDER, text, 1)))
            }
            other => Ok(other.clone()),
        },
        count => Ok(Value::Array(cursor.take(count)?)),
    }
}

/// Convert literal SQL text to a value: quoted text, boolean, float (when the
/// text has a `.`) or integer.
pub fn coerce_literal(text: &str) -> DbResult<Value> {
    let text = text.trim();
    if text.starts_with('\'') {
        return unquote(text)
            .map(Value::String)
            .ok_or_else(|| DbError::CoercionError(format!("unterminated string literal {}", text)));
    }
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(text.eq_ignore_ascii_case("true")));
    }
    if text.contains('.') {
        let number = text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .ok_or_else(|| DbError::CoercionError(format!("cannot convert '{}' to float", text)))?;
        return Ok(Value::Number(number));
    }
    text.parse::<i64>()
        .map(Value::from)
        .map_err(|_| DbError::CoercionError(format!("cannot convert '{}' to integer", text)))
}

fn coerce_literal_list(text: &str) -> DbResult<Value> {
    let items = split_list(text);
    if items.len() == 1 {
        return coerce_literal(items[0]);
    }
    items
        .into_iter()
        .map(coerce_literal)
        .collect::<DbResult<Vec<_>>>()
        .map(Value::Array)
}

/// Split on commas outside single quotes
fn split_list(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            ',' if !in_quote => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(text[start..].trim());
    items
}

/// Body of a `'...'` literal with doubled quotes collapsed
fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}
