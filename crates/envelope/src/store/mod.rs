//! Object storage transport.
//!
//! The envelope layer only ever needs to put a whole object with metadata and
//! get a whole object back. [`ObjectStore`] is that seam; [`MemoryObjectStore`]
//! backs tests and local runs, [`S3ObjectStore`] talks to S3.

pub mod memory;
pub mod s3;

use std::{collections::BTreeMap, future::Future};

use bytes::Bytes;
use thiserror::Error;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Errors produced by an [`ObjectStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists under the requested key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The backend rejected or failed the request.
    #[error("object store request for {key} failed: {message}")]
    Backend {
        /// Object key the request targeted.
        key: String,
        /// Backend error, flattened with its source chain.
        message: String,
    },
}

/// A whole-object write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub key: String,
    /// User metadata stored alongside the object.
    pub metadata: BTreeMap<String, String>,
    pub body: Bytes,
}

impl PutObjectRequest {
    pub fn new(key: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            metadata: BTreeMap::new(),
            body: body.into(),
        }
    }
}

/// A whole-object read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetObjectResult {
    pub metadata: BTreeMap<String, String>,
    pub body: Bytes,
}

/// Minimal object store used by the encryption client.
pub trait ObjectStore: Send + Sync {
    /// Store `request.body` and `request.metadata` under `request.key`,
    /// replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the write fails.
    fn put_object(
        &self,
        request: PutObjectRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch the object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such object, or
    /// [`StoreError::Backend`] if the read fails.
    fn get_object(&self, key: &str) -> impl Future<Output = Result<GetObjectResult, StoreError>> + Send;
}
