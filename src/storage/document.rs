use std::cmp::Ordering;

use serde_json::{Map, Value};

/// One schemaless record: field name to value
pub type Document = Map<String, Value>;

/// Native boolean query expression, e.g. `{"id": {"$eq": 2}}` or
/// `{"$or": [{..}, {..}]}`
pub type Predicate = Map<String, Value>;

pub const AND_OPERATOR: &str = "$and";
pub const OR_OPERATOR: &str = "$or";

/// Compare two JSON values for equality.
///
/// Numbers are compared by their f64 representation so `2` equals `2.0`;
/// values of different kinds are never equal.
#[inline]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Order two JSON values of the same kind.
///
/// Returns `None` for values of different kinds, which never satisfy a range
/// comparison.
#[inline]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => {
            let a_f64 = a.as_f64().unwrap_or(0.0);
            let b_f64 = b.as_f64().unwrap_or(0.0);
            a_f64.partial_cmp(&b_f64)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Evaluate a predicate against a document.
///
/// An empty predicate matches everything. Unknown `$` operators never match.
pub fn matches(predicate: &Predicate, doc: &Document) -> bool {
    predicate.iter().all(|(key, condition)| match key.as_str() {
        AND_OPERATOR => sub_predicates(condition).all(|p| matches(p, doc)),
        OR_OPERATOR => sub_predicates(condition).any(|p| matches(p, doc)),
        field => field_matches(doc.get(field), condition),
    })
}

fn sub_predicates(condition: &Value) -> impl Iterator<Item = &Predicate> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn field_matches(field: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops
            .iter()
            .all(|(op, expected)| operator_matches(field, op, expected)),
        expected => field.is_some_and(|v| values_equal(v, expected)),
    }
}

fn operator_matches(field: Option<&Value>, op: &str, expected: &Value) -> bool {
    match op {
        "$eq" => field.is_some_and(|v| values_equal(v, expected)),
        "$ne" => !field.is_some_and(|v| values_equal(v, expected)),
        "$lt" => ordered(field, expected, |o| o == Ordering::Less),
        "$lte" => ordered(field, expected, |o| o != Ordering::Greater),
        "$gt" => ordered(field, expected, |o| o == Ordering::Greater),
        "$gte" => ordered(field, expected, |o| o != Ordering::Less),
        "$in" => field.is_some_and(|v| contains(expected, v)),
        "$nin" => !field.is_some_and(|v| contains(expected, v)),
        _ => false,
    }
}

fn ordered(field: Option<&Value>, expected: &Value, check: impl Fn(Ordering) -> bool) -> bool {
    field
        .and_then(|v| compare_values(v, expected))
        .is_some_and(check)
}

fn contains(list: &Value, value: &Value) -> bool {
    match list {
        Value::Array(items) => items.iter().any(|item| values_equal(value, item)),
        single => values_equal(value, single),
    }
}
