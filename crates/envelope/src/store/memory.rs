//! [`MemoryObjectStore`]: in-process object store.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::debug;

use super::{GetObjectResult, ObjectStore, PutObjectRequest, StoreError};

/// Thread-safe in-memory object store.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// inspect what a client wrote.
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<HashMap<String, GetObjectResult>>>,
}

impl MemoryObjectStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns `true` if no objects are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Sorted list of stored keys.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Apply `f` to the stored object under `key`, if any.
    ///
    /// Lets tests tamper with stored bodies or metadata.
    pub async fn modify<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut GetObjectResult),
    {
        match self.inner.write().await.get_mut(key) {
            Some(object) => {
                f(object);
                true
            }
            None => false,
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StoreError> {
        debug!(key = %request.key, bytes = request.body.len(), "memory store put");
        let object = GetObjectResult {
            metadata: request.metadata,
            body: request.body,
        };
        self.inner.write().await.insert(request.key, object);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<GetObjectResult, StoreError> {
        self.inner
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }
}
