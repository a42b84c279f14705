//! Document store client seams.
//!
//! A `DocumentStore` dials sessions; a session exposes catalog operations and
//! collection handles; collections run the native predicate operations the
//! executors need.

use std::any::Any;
use std::time::Duration;

use super::document::{Document, Predicate};
use crate::config::Credential;
use crate::error::DbResult;

/// Entry point of a document store backend
pub trait DocumentStore: Send + Sync {
    /// Open a new session against `address` (`host:port`).
    fn connect(
        &self,
        address: &str,
        timeout: Option<Duration>,
        credential: Option<&Credential>,
    ) -> DbResult<Box<dyn StoreSession>>;
}

/// An open session with the store
pub trait StoreSession: Send + Sync {
    /// The concrete session, for typed native-client access
    fn as_any(&self) -> &dyn Any;

    fn database_names(&self) -> DbResult<Vec<String>>;

    fn collection_names(&self, database: &str) -> DbResult<Vec<String>>;

    /// Handle on a collection; the collection need not exist yet.
    fn collection(&self, database: &str, name: &str) -> Box<dyn DocumentCollection + '_>;

    /// Release server-side resources; called when the pool discards a session.
    fn close(&self) {}
}

pub trait DocumentCollection {
    fn insert(&self, doc: Document) -> DbResult<()>;

    fn insert_many(&self, docs: Vec<Document>) -> DbResult<()> {
        for doc in docs {
            self.insert(doc)?;
        }
        Ok(())
    }

    /// Replace the first document matching `filter`; returns the number of
    /// documents replaced.
    fn update(&self, filter: &Predicate, doc: Document) -> DbResult<usize>;

    /// Remove every matching document; returns the number removed.
    fn remove_all(&self, filter: &Predicate) -> DbResult<usize>;

    fn count(&self) -> DbResult<usize>;

    fn drop_collection(&self) -> DbResult<()>;

    /// Cursor over matching documents; `None` reads everything.
    fn find(&self, filter: Option<&Predicate>) -> DbResult<Box<dyn DocumentCursor + '_>>;
}

pub trait DocumentCursor {
    /// Next document, or `None` once the cursor is exhausted.
    fn next_document(&mut self) -> DbResult<Option<Document>>;
}
