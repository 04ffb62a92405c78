//! [`EncryptionClient`]: put and get whole objects with client-side envelope encryption.
//!
//! # Object layout
//!
//! ```text
//! CBC / CTR   body = ciphertext
//! GCM         body = ciphertext || tag (16)
//! ```
//!
//! The envelope lives either in the object's metadata or in `<key>.instruction`.
//! Readers accept both: metadata containing `x-amz-key-v2` wins, otherwise the
//! instruction object is fetched.

use std::collections::BTreeMap;

use bytes::Bytes;
use common::{ContentCryptoScheme, EnvelopeError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::CryptoBuffer;
use crate::crypto::{create_content_cipher, random, CipherError, KEY_LEN};
use crate::handlers::{
    CryptoMaterialHandler, EnvelopeStorage, InstructionFileHandler, MetadataHandler,
};
use crate::keys::{KeyProviderError, MasterKeyProvider};
use crate::materials::{ContentCryptoMaterial, GCM_TAG_LENGTH_BITS};
use crate::store::{ObjectStore, PutObjectRequest, StoreError};

/// Errors produced by [`EncryptionClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    KeyProvider(#[from] KeyProviderError),

    /// Neither the object's metadata nor an instruction object holds an envelope.
    #[error("object {0} has no encryption envelope")]
    NotEncrypted(String),

    /// The stored body is too short to hold the authentication tag.
    #[error("object body is {len} bytes, shorter than its {tag_len}-byte tag")]
    TruncatedObject {
        /// Body length in bytes.
        len: usize,
        /// Tag length in bytes.
        tag_len: usize,
    },
}

impl ClientError {
    /// Returns `true` if the failure indicates tampering or a wrong key.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Cipher(CipherError::AuthenticationFailure | CipherError::KeyIntegrityCheckFailed)
                | ClientError::KeyProvider(KeyProviderError::Cipher(
                    CipherError::AuthenticationFailure | CipherError::KeyIntegrityCheckFailed
                ))
        )
    }
}

/// Encrypting object store client.
#[derive(Debug, Clone)]
pub struct EncryptionClient<S, P> {
    store: S,
    provider: P,
    scheme: ContentCryptoScheme,
    storage: EnvelopeStorage,
    instruction_file: InstructionFileHandler,
}

impl<S: ObjectStore, P: MasterKeyProvider> EncryptionClient<S, P> {
    /// Create a client writing AES-GCM objects with the envelope in metadata.
    pub fn new(store: S, provider: P) -> Self {
        Self {
            store,
            provider,
            scheme: ContentCryptoScheme::Gcm,
            storage: EnvelopeStorage::default(),
            instruction_file: InstructionFileHandler::default(),
        }
    }

    /// Content encryption scheme for new objects.
    pub fn with_content_crypto_scheme(mut self, scheme: ContentCryptoScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Envelope placement for new objects. Reads accept either placement.
    pub fn with_envelope_storage(mut self, storage: EnvelopeStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encrypt `plaintext` under a fresh content key and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if key generation, encryption, key wrapping,
    /// or the store write fails.
    pub async fn put_object(
        &self,
        key: &str,
        plaintext: &[u8],
        materials_description: &BTreeMap<String, String>,
    ) -> Result<(), ClientError> {
        let cek = random::generate_key(KEY_LEN)?;
        let iv = random::generate_iv(self.scheme.iv_len())?;

        let body = {
            let mut cipher = create_content_cipher(self.scheme, cek.clone(), iv.clone(), None)?;
            let ciphertext = cipher.encrypt(plaintext)?;
            match cipher.tag() {
                Some(tag) => CryptoBuffer::concat(&[ciphertext.as_slice(), tag.as_slice()]),
                None => ciphertext,
            }
        };

        let wrapped = self.provider.wrap_key(&cek, materials_description).await?;
        drop(cek);

        let material = ContentCryptoMaterial::builder(self.scheme, wrapped.algorithm)
            .final_cek(wrapped.encrypted_key)
            .iv(iv)
            .materials_description(wrapped.materials_description)
            .build()?;

        let mut request = PutObjectRequest::new(key, body.into_vec());
        match self.storage {
            EnvelopeStorage::ObjectMetadata => {
                MetadataHandler.populate_request(&mut request, &material);
                self.store.put_object(request).await?;
            }
            EnvelopeStorage::InstructionFile => {
                let mut instruction = PutObjectRequest::new(key, Bytes::new());
                self.instruction_file
                    .populate_request(&mut instruction, &material);
                self.store.put_object(request).await?;
                self.store.put_object(instruction).await?;
            }
        }

        info!(
            key = %key,
            scheme = %self.scheme,
            wrap = %material.key_wrap_algorithm(),
            storage = %self.storage,
            bytes = plaintext.len(),
            "encrypted object stored"
        );
        Ok(())
    }

    /// Fetch the object under `key` and return its verified plaintext.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotEncrypted`] if no envelope can be found.
    /// - [`ClientError::Cipher`] with [`CipherError::AuthenticationFailure`] if
    ///   a GCM object was modified.
    /// - Any other [`ClientError`] from the store, the key provider, or envelope parsing.
    pub async fn get_object(&self, key: &str) -> Result<CryptoBuffer, ClientError> {
        let object = self.store.get_object(key).await?;

        let material = if MetadataHandler::has_envelope(&object) {
            debug!(key = %key, "envelope found in object metadata");
            MetadataHandler.read_content_crypto_material(&object)?
        } else {
            let instruction_key = self.instruction_file.instruction_key(key);
            let instruction = match self.store.get_object(&instruction_key).await {
                Ok(instruction) => instruction,
                Err(StoreError::NotFound(_)) => {
                    warn!(key = %key, "object has no envelope");
                    return Err(ClientError::NotEncrypted(key.to_owned()));
                }
                Err(e) => return Err(e.into()),
            };
            debug!(key = %key, instruction_key = %instruction_key, "envelope read from instruction file");
            self.instruction_file
                .read_content_crypto_material(&instruction)?
        };

        let cek = self
            .provider
            .unwrap_key(
                material.final_cek(),
                material.key_wrap_algorithm(),
                material.materials_description(),
            )
            .await?;

        let scheme = material.content_crypto_scheme();
        let (ciphertext, tag) = if scheme.is_authenticated() {
            let bits = material.crypto_tag_length().unwrap_or(GCM_TAG_LENGTH_BITS);
            let tag_len = bits as usize / 8;
            let len = object.body.len();
            if len < tag_len {
                return Err(ClientError::TruncatedObject { len, tag_len });
            }
            let (ciphertext, tag) = object.body.split_at(len - tag_len);
            (ciphertext, Some(CryptoBuffer::from_slice(tag)))
        } else {
            (&object.body[..], None)
        };

        let mut cipher = create_content_cipher(scheme, cek, material.iv().clone(), tag)?;
        let plaintext = cipher.decrypt(ciphertext)?;

        info!(key = %key, scheme = %scheme, bytes = plaintext.len(), "encrypted object read");
        Ok(plaintext)
    }
}
