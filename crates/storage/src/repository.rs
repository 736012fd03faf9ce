use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("storage quota exceeded: {requested} bytes requested, limit is {limit}")]
    QuotaExceeded { limit: u64, requested: u64 },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Namespaced string key/value persistence.
///
/// Values are opaque strings (the ledger stores JSON). Writes replace the
/// whole value under a key.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the write would push the
    /// store past its byte budget, or other storage errors.
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

type Entries = HashMap<(String, String), String>;

/// Simple in-memory store for tests and ephemeral sessions.
///
/// An optional byte quota mimics the storage limits of constrained hosts.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<Entries>>,
    quota_bytes: Option<u64>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes once the summed value sizes would exceed `bytes`.
    #[must_use]
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Entries>, StorageError> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

/// Total bytes after replacing the value at `slot` with one of `incoming` bytes.
fn projected_size(entries: &Entries, slot: &(String, String), incoming: usize) -> u64 {
    let others: usize = entries
        .iter()
        .filter(|(k, _)| *k != slot)
        .map(|(_, v)| v.len())
        .sum();
    u64::try_from(others.saturating_add(incoming)).unwrap_or(u64::MAX)
}

#[async_trait]
impl KeyedStore for InMemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = (namespace.to_owned(), key.to_owned());
        if let Some(limit) = self.quota_bytes {
            let requested = projected_size(&guard, &slot, value.len());
            if requested > limit {
                tracing::warn!(namespace, key, limit, requested, "in-memory quota exceeded");
                return Err(StorageError::QuotaExceeded { limit, requested });
            }
        }
        guard.insert(slot, value.to_owned());
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }
}

/// Keyed store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub store: Arc<dyn KeyedStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(InMemoryStore::new())
    }

    #[must_use]
    pub fn from_store(store: impl KeyedStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}
