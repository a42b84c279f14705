//! In-process document store.
//!
//! Emulates a single document server reachable at one address: databases hold
//! collections, collections hold documents in insertion order with a unique
//! `_id`. Predicates are evaluated with [`document::matches`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;

use super::document::{self, Document, Predicate};
use super::store::{DocumentCollection, DocumentCursor, DocumentStore, StoreSession};
use crate::config::{Credential, DEFAULT_PORT, NATIVE_KEY_FIELD};
use crate::error::{DbError, DbResult};

type Collections = BTreeMap<String, Vec<Document>>;

struct MemoryServer {
    address: String,
    users: RwLock<HashMap<String, String>>,
    databases: RwLock<BTreeMap<String, Collections>>,
    read_only: AtomicBool,
    next_id: AtomicU64,
}

/// Shared handle on an in-memory server; clones see the same data
#[derive(Clone)]
pub struct MemoryStore {
    server: Arc<MemoryServer>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("address", &self.server.address)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store answering on `127.0.0.1:27017`
    pub fn new() -> Self {
        Self::listening_on(&format!("127.0.0.1:{}", DEFAULT_PORT))
    }

    pub fn listening_on(address: &str) -> Self {
        Self {
            server: Arc::new(MemoryServer {
                address: address.to_string(),
                users: RwLock::new(HashMap::new()),
                databases: RwLock::new(BTreeMap::new()),
                read_only: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Require authentication; sessions must log in as one of the added users.
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.server
            .users
            .write()
            .insert(username.to_string(), password.to_string());
        self
    }

    /// Reject every write with an error while set
    pub fn set_read_only(&self, read_only: bool) {
        self.server.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn address(&self) -> &str {
        &self.server.address
    }
}

impl DocumentStore for MemoryStore {
    fn connect(
        &self,
        address: &str,
        _timeout: Option<Duration>,
        credential: Option<&Credential>,
    ) -> DbResult<Box<dyn StoreSession>> {
        if address != self.server.address {
            return Err(DbError::ConnectionError {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        {
            let users = self.server.users.read();
            if !users.is_empty() {
                let authorized = credential.is_some_and(|c| {
                    users.get(&c.username).is_some_and(|p| *p == c.password)
                });
                if !authorized {
                    tracing::warn!("Rejected login on {}", address);
                    return Err(DbError::ConnectionError {
                        address: address.to_string(),
                        reason: "authentication failed".to_string(),
                    });
                }
            }
        }

        Ok(Box::new(MemorySession {
            server: self.server.clone(),
        }))
    }
}

/// Session on a [`MemoryStore`]
pub struct MemorySession {
    server: Arc<MemoryServer>,
}

impl MemorySession {
    pub fn address(&self) -> &str {
        &self.server.address
    }

    /// Typed collection handle, without going through the trait object
    pub fn collection_handle(&self, database: &str, name: &str) -> MemoryCollection<'_> {
        MemoryCollection {
            server: &self.server,
            database: database.to_string(),
            name: name.to_string(),
        }
    }
}

impl StoreSession for MemorySession {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn database_names(&self) -> DbResult<Vec<String>> {
        Ok(self.server.databases.read().keys().cloned().collect())
    }

    fn collection_names(&self, database: &str) -> DbResult<Vec<String>> {
        Ok(self
            .server
            .databases
            .read()
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn collection(&self, database: &str, name: &str) -> Box<dyn DocumentCollection + '_> {
        Box::new(self.collection_handle(database, name))
    }
}

pub struct MemoryCollection<'a> {
    server: &'a MemoryServer,
    database: String,
    name: String,
}

impl MemoryCollection<'_> {
    fn check_writable(&self) -> DbResult<()> {
        if self.server.read_only.load(Ordering::SeqCst) {
            return Err(DbError::InternalError(format!(
                "write to '{}' rejected: store is read-only",
                self.name
            )));
        }
        Ok(())
    }

    fn generate_id(&self) -> Value {
        let seq = self.server.next_id.fetch_add(1, Ordering::SeqCst);
        Value::String(format!("{:024x}", seq))
    }

    fn with_documents<T>(&self, f: impl FnOnce(Option<&Vec<Document>>) -> T) -> T {
        let databases = self.server.databases.read();
        f(databases
            .get(&self.database)
            .and_then(|collections| collections.get(&self.name)))
    }
}

impl DocumentCollection for MemoryCollection<'_> {
    fn insert(&self, mut doc: Document) -> DbResult<()> {
        self.check_writable()?;
        if !doc.contains_key(NATIVE_KEY_FIELD) {
            doc.insert(NATIVE_KEY_FIELD.to_string(), self.generate_id());
        }

        let mut databases = self.server.databases.write();
        let documents = databases
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();

        let id = &doc[NATIVE_KEY_FIELD];
        if documents
            .iter()
            .any(|existing| existing.get(NATIVE_KEY_FIELD).is_some_and(|v| document::values_equal(v, id)))
        {
            return Err(DbError::DuplicateKey {
                collection: self.name.clone(),
                key: id.to_string(),
            });
        }

        documents.push(doc);
        Ok(())
    }

    fn update(&self, filter: &Predicate, mut doc: Document) -> DbResult<usize> {
        self.check_writable()?;
        let mut databases = self.server.databases.write();
        let Some(documents) = databases
            .get_mut(&self.database)
            .and_then(|collections| collections.get_mut(&self.name))
        else {
            return Ok(0);
        };

        let Some(existing) = documents.iter_mut().find(|d| document::matches(filter, d)) else {
            return Ok(0);
        };

        let current_id = existing.get(NATIVE_KEY_FIELD).cloned().unwrap_or(Value::Null);
        match doc.get(NATIVE_KEY_FIELD) {
            Some(new_id) if !document::values_equal(new_id, &current_id) => {
                return Err(DbError::InternalError(format!(
                    "cannot change {} of a document in '{}' from {} to {}",
                    NATIVE_KEY_FIELD, self.name, current_id, new_id
                )));
            }
            Some(_) => {}
            None => {
                doc.insert(NATIVE_KEY_FIELD.to_string(), current_id);
            }
        }

        *existing = doc;
        Ok(1)
    }

    fn remove_all(&self, filter: &Predicate) -> DbResult<usize> {
        self.check_writable()?;
        let mut databases = self.server.databases.write();
        let Some(documents) = databases
            .get_mut(&self.database)
            .and_then(|collections| collections.get_mut(&self.name))
        else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|d| !document::matches(filter, d));
        Ok(before - documents.len())
    }

    fn count(&self) -> DbResult<usize> {
        Ok(self.with_documents(|docs| docs.map_or(0, Vec::len)))
    }

    fn drop_collection(&self) -> DbResult<()> {
        self.check_writable()?;
        let mut databases = self.server.databases.write();
        let removed = databases
            .get_mut(&self.database)
            .and_then(|collections| collections.remove(&self.name));

        match removed {
            Some(_) => {
                if databases.get(&self.database).is_some_and(BTreeMap::is_empty) {
                    databases.remove(&self.database);
                }
                Ok(())
            }
            None => Err(DbError::CollectionNotFound(self.name.clone())),
        }
    }

    fn find(&self, filter: Option<&Predicate>) -> DbResult<Box<dyn DocumentCursor + '_>> {
        let snapshot: Vec<Document> = self.with_documents(|docs| {
            docs.into_iter()
                .flatten()
                .filter(|d| filter.map_or(true, |f| document::matches(f, d)))
                .cloned()
                .collect()
        });
        Ok(Box::new(MemoryCursor {
            documents: snapshot.into_iter(),
        }))
    }
}

/// Cursor over a snapshot taken when the query ran
pub struct MemoryCursor {
    documents: std::vec::IntoIter<Document>,
}

impl DocumentCursor for MemoryCursor {
    fn next_document(&mut self) -> DbResult<Option<Document>> {
        Ok(self.documents.next())
    }
}
