//! [`S3ObjectStore`]: [`ObjectStore`] over a single S3 bucket.

use std::collections::BTreeMap;

use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream};
use tracing::{debug, info};

use super::{GetObjectResult, ObjectStore, PutObjectRequest, StoreError};

/// S3-backed object store bound to one bucket.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn backend(key: &str, err: impl std::error::Error) -> StoreError {
    StoreError::Backend {
        key: key.to_owned(),
        message: DisplayErrorContext(err).to_string(),
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StoreError> {
        let PutObjectRequest {
            key,
            metadata,
            body,
        } = request;
        let len = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .set_metadata(Some(metadata.into_iter().collect()))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| backend(&key, e))?;

        info!(bucket = %self.bucket, key = %key, bytes = len, "object written to S3");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<GetObjectResult, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(key.to_owned())
                } else {
                    backend(key, e)
                }
            })?;

        let metadata: BTreeMap<String, String> = output
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| backend(key, e))?
            .into_bytes();

        debug!(bucket = %self.bucket, key = %key, bytes = body.len(), "object read from S3");
        Ok(GetObjectResult { metadata, body })
    }
}
