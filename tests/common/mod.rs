//! Common test utilities for manager tests
//!
//! Provides shared helper functions for:
//! - Creating managers over a fresh in-memory store
//! - Seeding the `users` table
//! - Reading raw documents back from the store

#![allow(dead_code)]

use std::sync::Arc;

use docsql::storage::{Document, DocumentStore, MemoryStore};
use docsql::{Config, Manager};
use serde_json::{json, Value};

pub const DATABASE: &str = "mydb";

pub fn create_test_config() -> Config {
    Config::new("127.0.0.1", DATABASE).with_key_column("id")
}

pub fn create_test_manager() -> (Manager, MemoryStore) {
    let store = MemoryStore::new();
    let manager =
        Manager::new(create_test_config(), Arc::new(store.clone())).expect("Failed to create manager");
    (manager, store)
}

/// Manager with `users` rows (0, "Name 0"), (1, "Name 1"), (2, "Name 2")
pub fn create_seeded_manager() -> (Manager, MemoryStore) {
    let (manager, store) = create_test_manager();
    for i in 0..3 {
        let result = manager
            .execute(
                "INSERT INTO users(id, name) VALUES(?, ?)",
                &[json!(i), json!(format!("Name {}", i))],
            )
            .unwrap();
        assert_eq!(result.rows_affected, 1);
    }
    (manager, store)
}

/// Every document of `table`, bypassing the SQL layer
pub fn raw_documents(store: &MemoryStore, table: &str) -> Vec<Document> {
    let session = store.connect(store.address(), None, None).unwrap();
    let collection = session.collection(DATABASE, table);
    let mut cursor = collection.find(None).unwrap();
    let mut documents = Vec::new();
    while let Some(document) = cursor.next_document().unwrap() {
        documents.push(document);
    }
    documents
}

/// Collect query rows as JSON values
pub fn query(manager: &Manager, sql: &str, params: &[Value]) -> Vec<Value> {
    let mut rows = Vec::new();
    manager
        .read_all_with_handler(sql, params, |row| {
            rows.push(row.into_value());
            Ok(true)
        })
        .unwrap();
    rows
}

pub fn ids(rows: &[Value]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows.iter().filter_map(|r| r["id"].as_i64()).collect();
    ids.sort();
    ids
}
