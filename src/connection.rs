//! Session pool over a [`DocumentStore`].
//!
//! Sessions are dialed on demand and handed out wrapped in a
//! [`PooledConnection`]; dropping the guard gives the session back to the pool
//! while fewer than `max_pool_size` are idle, and closes it otherwise.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::storage::{DocumentStore, StoreSession};

pub struct ConnectionProvider {
    store: Arc<dyn DocumentStore>,
    config: Arc<RwLock<Config>>,
    idle: Mutex<Vec<Box<dyn StoreSession>>>,
}

impl ConnectionProvider {
    pub fn new(store: Arc<dyn DocumentStore>, config: Arc<RwLock<Config>>) -> Self {
        Self {
            store,
            config,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take an idle session or dial a new one
    pub fn get(&self) -> DbResult<PooledConnection<'_>> {
        if let Some(session) = self.idle.lock().pop() {
            return Ok(PooledConnection {
                session: Some(session),
                provider: self,
            });
        }

        let session = self.connect()?;
        Ok(PooledConnection {
            session: Some(session),
            provider: self,
        })
    }

    fn connect(&self) -> DbResult<Box<dyn StoreSession>> {
        let (address, timeout, credential) = {
            let config = self.config.read();
            config.validate()?;
            (config.address(), config.connect_timeout(), config.load_credential()?)
        };

        tracing::debug!("Connecting to {}", address);
        self.store
            .connect(&address, timeout, credential.as_ref())
            .map_err(|e| match e {
                DbError::ConnectionError { .. } => e,
                other => DbError::ConnectionError {
                    address: address.clone(),
                    reason: other.to_string(),
                },
            })
    }

    /// Number of sessions waiting in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn release(&self, session: Box<dyn StoreSession>) {
        let max_pool_size = self.config.read().max_pool_size;
        let mut idle = self.idle.lock();
        if idle.len() < max_pool_size {
            idle.push(session);
        } else {
            drop(idle);
            session.close();
        }
    }
}

impl std::fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// A session checked out of a [`ConnectionProvider`]
pub struct PooledConnection<'a> {
    session: Option<Box<dyn StoreSession>>,
    provider: &'a ConnectionProvider,
}

impl PooledConnection<'_> {
    pub fn session(&self) -> DbResult<&dyn StoreSession> {
        self.session
            .as_deref()
            .ok_or_else(|| DbError::InternalError("connection already released".to_string()))
    }

    /// Database the connection works against
    pub fn database(&self) -> String {
        self.provider.config.read().database.clone()
    }

    /// The backend's own session type, e.g. `MemorySession`
    pub fn as_native_client<T: 'static>(&self) -> DbResult<&T> {
        self.session()?.as_any().downcast_ref::<T>().ok_or_else(|| {
            DbError::CapabilityNotSupported(format!(
                "native client of type {}",
                std::any::type_name::<T>()
            ))
        })
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.provider.release(session);
        }
    }
}
