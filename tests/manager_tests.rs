//! Manager Tests
//! End-to-end statements against the in-memory store

mod common;

use common::{create_seeded_manager, create_test_manager, ids, query, raw_documents};
use docsql::sql::StatementKind;
use docsql::DbError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: i64,
    name: String,
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_read_all_users() {
    let (manager, _store) = create_seeded_manager();
    let mut users: Vec<User> = manager.read_all("SELECT id, name FROM users", &[]).unwrap();
    users.sort_by_key(|u| u.id);

    assert_eq!(users.len(), 3);
    assert_eq!(
        users[2],
        User {
            id: 2,
            name: "Name 2".to_string()
        }
    );
}

#[test]
fn test_read_by_integer_key() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(&manager, "SELECT id, name FROM users WHERE id = 2", &[]);
    assert_eq!(rows, vec![json!({"id": 2, "name": "Name 2"})]);
}

#[test]
fn test_quoted_key_does_not_match_integer() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(&manager, "SELECT id, name FROM users WHERE id = '2'", &[]);
    assert!(rows.is_empty());
}

#[test]
fn test_read_with_placeholder() {
    let (manager, _store) = create_seeded_manager();
    let user: Option<User> = manager
        .read_single("SELECT id, name FROM users WHERE id = ?", &[json!(2)])
        .unwrap();
    assert_eq!(user.map(|u| u.name), Some("Name 2".to_string()));
}

#[test]
fn test_read_with_in_placeholders() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(
        &manager,
        "SELECT id, name FROM users WHERE id IN(?, ?)",
        &[json!(1), json!(2)],
    );
    assert_eq!(ids(&rows), vec![1, 2]);
}

#[test]
fn test_read_with_not_in() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(
        &manager,
        "SELECT id, name FROM users WHERE id NOT IN(?, ?)",
        &[json!(0), json!(2)],
    );
    assert_eq!(ids(&rows), vec![1]);
}

#[test]
fn test_read_with_or_on_non_key_column() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(
        &manager,
        "SELECT id, name FROM users WHERE name = ? OR name = 'Name 2'",
        &[json!("Name 0")],
    );
    assert_eq!(ids(&rows), vec![0, 2]);
}

#[test]
fn test_read_with_partial_literal_substitution() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(
        &manager,
        "SELECT id FROM users WHERE name = 'Name ?'",
        &[json!("1")],
    );
    assert_eq!(ids(&rows), vec![1]);
}

#[test]
fn test_column_alias() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(&manager, "SELECT id, name AS label FROM users WHERE id = 0", &[]);
    assert_eq!(rows, vec![json!({"id": 0, "label": "Name 0"})]);
}

#[test]
fn test_select_star_returns_whole_document() {
    let (manager, _store) = create_seeded_manager();
    let rows = query(&manager, "SELECT * FROM users WHERE id = 1", &[]);
    assert_eq!(rows, vec![json!({"_id": 1, "id": 1, "name": "Name 1"})]);
}

#[test]
fn test_handler_stop() {
    let (manager, _store) = create_seeded_manager();
    let mut seen = 0;
    manager
        .read_all_with_handler("SELECT id FROM users", &[], |_| {
            seen += 1;
            Ok(false)
        })
        .unwrap();
    assert_eq!(seen, 1);
}

#[test]
fn test_handler_error_propagates_and_releases_connection() {
    let (manager, _store) = create_seeded_manager();
    let err = manager
        .read_all_with_handler("SELECT id FROM users", &[], |_| {
            Err(DbError::InternalError("handler failed".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, DbError::InternalError(_)));
    assert_eq!(manager.connection_provider().idle_count(), 1);
}

#[test]
fn test_read_missing_table_is_empty() {
    let (manager, _store) = create_test_manager();
    assert!(query(&manager, "SELECT * FROM nothing", &[]).is_empty());
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_insert_populates_native_key() {
    let (_manager, store) = create_seeded_manager();
    let documents = raw_documents(&store, "users");
    assert_eq!(documents.len(), 3);
    assert!(documents
        .iter()
        .all(|d| d.get("_id").is_some() && d.get("_id") == d.get("id")));
}

#[test]
fn test_update_preserves_untouched_fields() {
    let (manager, store) = create_test_manager();
    manager
        .execute(
            "INSERT INTO users(id, name, email) VALUES(?, ?, ?)",
            &[json!(7), json!("Seven"), json!("seven@example.com")],
        )
        .unwrap();

    let result = manager
        .execute("UPDATE users SET name = ? WHERE id = ?", &[json!("Sept"), json!(7)])
        .unwrap();
    assert_eq!(result.rows_affected, 1);

    let documents = raw_documents(&store, "users");
    assert_eq!(
        Value::Object(documents[0].clone()),
        json!({"_id": 7, "id": 7, "name": "Sept", "email": "seven@example.com"})
    );
}

#[test]
fn test_update_without_match() {
    let (manager, _store) = create_seeded_manager();
    let result = manager
        .execute("UPDATE users SET name = ? WHERE id = ?", &[json!("x"), json!(99)])
        .unwrap();
    assert_eq!(result.rows_affected, 0);
}

#[test]
fn test_delete_with_criteria() {
    let (manager, _store) = create_seeded_manager();
    let result = manager
        .execute("DELETE FROM users WHERE id IN(?, ?)", &[json!(0), json!(1)])
        .unwrap();
    assert_eq!(result.rows_affected, 2);
    assert_eq!(ids(&query(&manager, "SELECT id FROM users", &[])), vec![2]);
}

#[test]
fn test_delete_all_drops_collection() {
    let (manager, _store) = create_seeded_manager();
    let result = manager.execute("DELETE FROM users", &[]).unwrap();
    assert_eq!(result.rows_affected, 3);

    let tables = manager.dialect().get_tables(&manager, common::DATABASE).unwrap();
    assert!(!tables.contains(&"users".to_string()));
}

#[test]
fn test_delete_all_on_empty_collection() {
    let (manager, store) = create_test_manager();
    // A drop would fail on a read-only store
    store.set_read_only(true);
    let result = manager.execute("DELETE FROM users", &[]).unwrap();
    assert_eq!(result.rows_affected, 0);
}

#[test]
fn test_logical_key_differs_from_native_key() {
    let (manager, store) = create_test_manager();
    manager.update_config(|config| config.set_table_key_column("accounts", "account_no"));
    manager
        .execute(
            "INSERT INTO accounts(account_no, owner) VALUES(?, ?)",
            &[json!("A-1"), json!("ann")],
        )
        .unwrap();
    manager
        .execute("UPDATE accounts SET owner = ? WHERE account_no = ?", &[json!("bob"), json!("A-1")])
        .unwrap();

    let documents = raw_documents(&store, "accounts");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["_id"], json!("A-1"));
    assert_eq!(documents[0]["owner"], json!("bob"));
}

#[test]
fn test_duplicate_key_is_store_error() {
    let (manager, _store) = create_seeded_manager();
    let err = manager
        .execute("INSERT INTO users(id, name) VALUES(?, ?)", &[json!(1), json!("again")])
        .unwrap_err();
    match err {
        DbError::StoreError { table, source } => {
            assert_eq!(table, "users");
            assert!(matches!(*source, DbError::DuplicateKey { .. }));
        }
        other => panic!("Expected store error, got {:?}", other),
    }
}

#[test]
fn test_store_failure_names_table() {
    let (manager, store) = create_seeded_manager();
    store.set_read_only(true);
    let err = manager
        .execute("UPDATE users SET name = ? WHERE id = ?", &[json!("x"), json!(1)])
        .unwrap_err();
    assert!(err.to_string().contains("users"));
    assert_eq!(manager.connection_provider().idle_count(), 1);
}

#[test]
fn test_doubled_quotes_in_literals() {
    let (manager, store) = create_test_manager();
    manager
        .execute("INSERT INTO users(id, name) VALUES(?, 'O''')", &[json!(1)])
        .unwrap();
    manager
        .execute("INSERT INTO users(id, name) VALUES(?, '''quoted''')", &[json!(2)])
        .unwrap();
    manager
        .execute("INSERT INTO users(id, name) VALUES(?, ?)", &[json!(3), json!("b,c")])
        .unwrap();

    let documents = raw_documents(&store, "users");
    let name_of = |id: i64| {
        documents
            .iter()
            .find(|d| d["id"] == json!(id))
            .map(|d| d["name"].clone())
    };
    assert_eq!(name_of(1), Some(json!("O'")));
    assert_eq!(name_of(2), Some(json!("'quoted'")));

    let rows = query(&manager, "SELECT id FROM users WHERE name IN ('O''', 'b,c')", &[]);
    assert_eq!(ids(&rows), vec![1, 3]);
    let rows = query(&manager, "SELECT id FROM users WHERE name = '''quoted'''", &[]);
    assert_eq!(ids(&rows), vec![2]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_parse_error_before_store() {
    let (manager, _store) = create_seeded_manager();
    let err = manager
        .execute("UPSERT INTO users(id) VALUES(1)", &[])
        .unwrap_err();
    assert!(matches!(err, DbError::ParseError(_)));
}

#[test]
fn test_missing_parameter() {
    let (manager, _store) = create_seeded_manager();
    let err = manager
        .execute("INSERT INTO users(id, name) VALUES(?, ?)", &[json!(5)])
        .unwrap_err();
    assert!(matches!(err, DbError::BindingError { index: 1, len: 1 }));
}

#[test]
fn test_invalid_inverse_operator() {
    let (manager, _store) = create_seeded_manager();
    let err = manager
        .read_all_with_handler("SELECT id FROM users WHERE NOT id > 1", &[], |_| Ok(true))
        .unwrap_err();
    assert!(matches!(err, DbError::UnsupportedOperator(op) if op == "NOT >"));
}

#[test]
fn test_prepared_statement_runs_by_kind() {
    let (manager, _store) = create_seeded_manager();

    let select = manager.prepare("SELECT id FROM users WHERE id IN(?, ?)").unwrap();
    assert_eq!(select.kind, StatementKind::Select);
    let mut seen = Vec::new();
    manager
        .read_statement_with_handler(&select, &[json!(0), json!(2)], |row| {
            seen.push(row.into_value());
            Ok(true)
        })
        .unwrap();
    assert_eq!(ids(&seen), vec![0, 2]);

    let delete = manager.prepare("DELETE FROM users WHERE id = ?").unwrap();
    assert_eq!(delete.kind, StatementKind::Delete);
    assert_eq!(manager.execute_statement(&delete, &[json!(0)]).unwrap().rows_affected, 1);
    assert_eq!(manager.execute_statement(&delete, &[json!(0)]).unwrap().rows_affected, 0);
    assert!(matches!(
        manager.execute_statement(&select, &[json!(1), json!(2)]),
        Err(DbError::ParseError(_))
    ));
}

#[test]
fn test_select_through_execute_is_rejected() {
    let (manager, _store) = create_seeded_manager();
    assert!(matches!(
        manager.execute("SELECT id FROM users", &[]),
        Err(DbError::ParseError(_))
    ));
}

// ============================================================================
// Persist
// ============================================================================

#[test]
fn test_persist_all_inserts_and_updates() {
    let (manager, _store) = create_seeded_manager();
    let users = vec![
        User {
            id: 1,
            name: "Renamed".to_string(),
        },
        User {
            id: 10,
            name: "Name 10".to_string(),
        },
    ];

    let (inserted, updated) = manager.persist_all(&users, "users").unwrap();
    assert_eq!((inserted, updated), (1, 1));

    let renamed: Option<User> = manager
        .read_single("SELECT id, name FROM users WHERE id = ?", &[json!(1)])
        .unwrap();
    assert_eq!(renamed.unwrap().name, "Renamed");
    assert_eq!(ids(&query(&manager, "SELECT id FROM users", &[])), vec![0, 1, 2, 10]);
}

#[test]
fn test_key_column_change_applies_immediately() {
    let (manager, store) = create_test_manager();
    manager
        .execute("INSERT INTO users(code, name) VALUES(?, ?)", &[json!("c1"), json!("x")])
        .unwrap();
    assert_ne!(raw_documents(&store, "users")[0]["_id"], json!("c1"));

    manager.update_config(|config| config.key_column = "code".to_string());
    manager
        .execute("INSERT INTO users(code, name) VALUES(?, ?)", &[json!("c2"), json!("y")])
        .unwrap();
    assert_eq!(raw_documents(&store, "users")[1]["_id"], json!("c2"));
}

#[derive(Debug, Clone, Serialize)]
struct Order {
    id: i64,
    order: String,
    group: i64,
}

#[test]
fn test_persist_all_with_reserved_column_names() {
    let (manager, store) = create_test_manager();
    let mut orders = vec![Order {
        id: 1,
        order: "first".to_string(),
        group: 7,
    }];
    assert_eq!(manager.persist_all(&orders, "orders").unwrap(), (1, 0));

    orders[0].group = 8;
    assert_eq!(manager.persist_all(&orders, "orders").unwrap(), (0, 1));

    let documents = raw_documents(&store, "orders");
    assert_eq!(documents.len(), 1);
    assert_eq!(
        Value::Object(documents[0].clone()),
        json!({"_id": 1, "id": 1, "order": "first", "group": 8})
    );
}

#[derive(Debug, Serialize)]
struct Key {
    id: i64,
}

#[test]
fn test_persist_all_counts_key_only_records_as_updated() {
    let (manager, store) = create_seeded_manager();
    let (inserted, updated) = manager
        .persist_all(&[Key { id: 1 }, Key { id: 5 }], "users")
        .unwrap();
    assert_eq!((inserted, updated), (1, 1));
    assert_eq!(raw_documents(&store, "users").len(), 4);
}
