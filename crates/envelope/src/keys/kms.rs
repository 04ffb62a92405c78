//! [`KmsKeyProvider`]: content keys wrapped remotely by AWS KMS.
//!
//! The materials description is sent as the KMS encryption context, with the
//! CMK id added under [`KMS_CMK_ID_KEY`]. KMS refuses to decrypt unless the
//! same context is presented again, which binds the envelope's description to
//! the wrapped key.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_kms::{error::DisplayErrorContext, primitives::Blob};
use common::KeyWrapAlgorithm;
use tracing::{debug, info};

use super::{KeyProviderError, MasterKeyProvider, WrappedKey};
use crate::buffer::CryptoBuffer;

/// Materials description key naming the CMK that wrapped the content key.
pub const KMS_CMK_ID_KEY: &str = "kms_cmk_id";

/// Provider delegating wrap and unwrap to one KMS key.
#[derive(Clone, Debug)]
pub struct KmsKeyProvider {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl KmsKeyProvider {
    pub fn new(client: aws_sdk_kms::Client, key_id: impl Into<String>) -> Self {
        Self {
            client,
            key_id: key_id.into(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Materials description to record for a key wrapped by this provider.
    pub(crate) fn materials_description_for(
        &self,
        materials_description: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut description = materials_description.clone();
        description.insert(KMS_CMK_ID_KEY.to_owned(), self.key_id.clone());
        description
    }
}

fn encryption_context(description: &BTreeMap<String, String>) -> HashMap<String, String> {
    description
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl MasterKeyProvider for KmsKeyProvider {
    async fn wrap_key(
        &self,
        cek: &CryptoBuffer,
        materials_description: &BTreeMap<String, String>,
    ) -> Result<WrappedKey, KeyProviderError> {
        let description = self.materials_description_for(materials_description);

        let response = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(cek.as_slice().to_vec()))
            .set_encryption_context(Some(encryption_context(&description)))
            .send()
            .await
            .map_err(|e| KeyProviderError::Kms(DisplayErrorContext(e).to_string()))?;

        let blob = response
            .ciphertext_blob()
            .ok_or_else(|| KeyProviderError::Kms("encrypt response contained no ciphertext".into()))?;

        info!(key_id = %self.key_id, "content key wrapped by KMS");
        Ok(WrappedKey {
            algorithm: KeyWrapAlgorithm::Kms,
            encrypted_key: CryptoBuffer::from_slice(blob.as_ref()),
            materials_description: description,
        })
    }

    async fn unwrap_key(
        &self,
        wrapped: &CryptoBuffer,
        algorithm: KeyWrapAlgorithm,
        materials_description: &BTreeMap<String, String>,
    ) -> Result<CryptoBuffer, KeyProviderError> {
        if algorithm != KeyWrapAlgorithm::Kms {
            return Err(KeyProviderError::UnsupportedAlgorithm(algorithm));
        }

        let response = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(wrapped.as_slice().to_vec()))
            .set_encryption_context(Some(encryption_context(materials_description)))
            .send()
            .await
            .map_err(|e| KeyProviderError::Kms(DisplayErrorContext(e).to_string()))?;

        let plaintext = response
            .plaintext()
            .ok_or_else(|| KeyProviderError::Kms("decrypt response contained no plaintext".into()))?;

        debug!(key_id = %self.key_id, "content key unwrapped by KMS");
        Ok(CryptoBuffer::from_slice(plaintext.as_ref()))
    }
}
