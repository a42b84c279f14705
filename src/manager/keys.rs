use serde_json::Value;

use crate::config::{Config, NATIVE_KEY_FIELD};
use crate::storage::Document;

/// Logical key column of `table`
pub fn key_column<'a>(config: &'a Config, table: &str) -> &'a str {
    config.key_column(table)
}

/// Copy the logical key value into the native key field.
///
/// Records already carrying `_id` are left alone. In replace mode the logical
/// key entry is removed so the key is not represented twice.
pub fn resolve_key(config: &Config, table: &str, record: &mut Document, replace: bool) {
    if record.contains_key(NATIVE_KEY_FIELD) {
        return;
    }
    let column = key_column(config, table);
    let value: Option<Value> = if replace {
        record.remove(column)
    } else {
        record.get(column).cloned()
    };
    if let Some(value) = value {
        record.insert(NATIVE_KEY_FIELD.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_key_column_precedence() {
        let config = Config::new("127.0.0.1", "test");
        assert_eq!(key_column(&config, "users"), "_id");

        let config = config.with_key_column("id");
        assert_eq!(key_column(&config, "users"), "id");

        let config = config.with_table_key_column("users", "user_id");
        assert_eq!(key_column(&config, "users"), "user_id");
        assert_eq!(key_column(&config, "orders"), "id");
    }

    #[test]
    fn test_insert_keeps_logical_key() {
        let config = Config::new("127.0.0.1", "test").with_key_column("id");
        let mut record = document(json!({"id": 1, "name": "a"}));
        resolve_key(&config, "users", &mut record, false);
        assert_eq!(Value::Object(record), json!({"_id": 1, "id": 1, "name": "a"}));
    }

    #[test]
    fn test_replace_moves_logical_key() {
        let config = Config::new("127.0.0.1", "test").with_key_column("id");
        let mut criteria = document(json!({"id": {"$eq": 2}}));
        resolve_key(&config, "users", &mut criteria, true);
        assert_eq!(Value::Object(criteria), json!({"_id": {"$eq": 2}}));
    }

    #[test]
    fn test_native_key_already_present() {
        let config = Config::new("127.0.0.1", "test").with_key_column("id");
        let mut record = document(json!({"_id": "x", "id": 1}));
        resolve_key(&config, "users", &mut record, true);
        assert_eq!(Value::Object(record), json!({"_id": "x", "id": 1}));
    }

    #[test]
    fn test_missing_key_is_noop() {
        let config = Config::new("127.0.0.1", "test").with_key_column("id");
        let mut record = document(json!({"name": "a"}));
        resolve_key(&config, "users", &mut record, false);
        assert_eq!(Value::Object(record), json!({"name": "a"}));
    }
}
