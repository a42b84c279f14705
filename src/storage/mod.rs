pub mod document;
pub mod memory;
pub mod store;

pub use document::{Document, Predicate};
pub use memory::{MemoryCollection, MemorySession, MemoryStore};
pub use store::{DocumentCollection, DocumentCursor, DocumentStore, StoreSession};
