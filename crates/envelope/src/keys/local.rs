//! [`SymmetricKeyProvider`]: content keys wrapped under a local 256-bit key.
//!
//! # Wrapped key layouts
//!
//! ```text
//! AESWrap   RFC 3394 output                        (cek len + 8)
//! AES/GCM   iv (12) || ciphertext (cek len) || tag (16)
//! ```

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use common::{ContentCryptoScheme, KeyWrapAlgorithm};
use tracing::debug;

use super::{KeyProviderError, MasterKeyProvider, WrappedKey};
use crate::buffer::CryptoBuffer;
use crate::crypto::{
    create_content_cipher, create_key_wrap_cipher, random, CipherError, SymmetricCipher,
    GCM_IV_LEN, GCM_TAG_LEN, KEY_LEN,
};

/// Provider holding a symmetric key-encrypting key in memory.
#[derive(Clone)]
pub struct SymmetricKeyProvider {
    kek: CryptoBuffer,
    algorithm: KeyWrapAlgorithm,
}

impl std::fmt::Debug for SymmetricKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKeyProvider")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SymmetricKeyProvider {
    /// Create a provider that wraps with `algorithm` under `kek`.
    ///
    /// # Errors
    ///
    /// - [`KeyProviderError::UnsupportedAlgorithm`] unless `algorithm` is
    ///   `AESWrap` or `AES/GCM`.
    /// - [`KeyProviderError::Cipher`] if `kek` is not 32 bytes.
    pub fn new(kek: CryptoBuffer, algorithm: KeyWrapAlgorithm) -> Result<Self, KeyProviderError> {
        if !matches!(
            algorithm,
            KeyWrapAlgorithm::AesKeyWrap | KeyWrapAlgorithm::AesGcm
        ) {
            return Err(KeyProviderError::UnsupportedAlgorithm(algorithm));
        }
        if kek.len() != KEY_LEN {
            return Err(CipherError::CipherInitializationFailure(format!(
                "master key must be {KEY_LEN} bytes, got {}",
                kek.len()
            ))
            .into());
        }
        Ok(Self { kek, algorithm })
    }

    /// Create a provider from a standard base64 key.
    ///
    /// # Errors
    ///
    /// As for [`SymmetricKeyProvider::new`], plus
    /// [`KeyProviderError::MalformedWrappedKey`] if `encoded` is not valid base64.
    pub fn from_base64(encoded: &str, algorithm: KeyWrapAlgorithm) -> Result<Self, KeyProviderError> {
        let kek = STANDARD
            .decode(encoded.trim())
            .map_err(|e| KeyProviderError::MalformedWrappedKey(format!("master key: {e}")))?;
        Self::new(kek.into(), algorithm)
    }

    pub fn algorithm(&self) -> KeyWrapAlgorithm {
        self.algorithm
    }

    fn wrap_rfc3394(&self, cek: &CryptoBuffer) -> Result<CryptoBuffer, KeyProviderError> {
        Ok(create_key_wrap_cipher(self.kek.clone())?.encrypt(cek)?)
    }

    fn unwrap_rfc3394(&self, wrapped: &CryptoBuffer) -> Result<CryptoBuffer, KeyProviderError> {
        Ok(create_key_wrap_cipher(self.kek.clone())?.decrypt(wrapped)?)
    }

    fn wrap_gcm(&self, cek: &CryptoBuffer) -> Result<CryptoBuffer, KeyProviderError> {
        let iv = random::generate_iv(GCM_IV_LEN)?;
        let mut cipher =
            create_content_cipher(ContentCryptoScheme::Gcm, self.kek.clone(), iv.clone(), None)?;
        let ciphertext = cipher.encrypt(cek)?;
        let tag = cipher.tag().cloned().ok_or(CipherError::MissingAuthenticationTag)?;
        Ok(CryptoBuffer::concat(&[
            iv.as_slice(),
            ciphertext.as_slice(),
            tag.as_slice(),
        ]))
    }

    fn unwrap_gcm(&self, wrapped: &CryptoBuffer) -> Result<CryptoBuffer, KeyProviderError> {
        if wrapped.len() <= GCM_IV_LEN + GCM_TAG_LEN {
            return Err(KeyProviderError::MalformedWrappedKey(format!(
                "AES/GCM wrapped key must exceed {} bytes, got {}",
                GCM_IV_LEN + GCM_TAG_LEN,
                wrapped.len()
            )));
        }
        let body_len = wrapped.len() - GCM_IV_LEN - GCM_TAG_LEN;
        let malformed = || KeyProviderError::MalformedWrappedKey("AES/GCM split failed".into());
        let iv = wrapped.slice(0, GCM_IV_LEN).ok_or_else(malformed)?;
        let ciphertext = wrapped.slice(GCM_IV_LEN, body_len).ok_or_else(malformed)?;
        let tag = wrapped
            .slice(GCM_IV_LEN + body_len, GCM_TAG_LEN)
            .ok_or_else(malformed)?;

        let mut cipher =
            create_content_cipher(ContentCryptoScheme::Gcm, self.kek.clone(), iv, Some(tag))?;
        Ok(cipher.decrypt(&ciphertext)?)
    }
}

impl MasterKeyProvider for SymmetricKeyProvider {
    async fn wrap_key(
        &self,
        cek: &CryptoBuffer,
        materials_description: &BTreeMap<String, String>,
    ) -> Result<WrappedKey, KeyProviderError> {
        let encrypted_key = match self.algorithm {
            KeyWrapAlgorithm::AesKeyWrap => self.wrap_rfc3394(cek)?,
            KeyWrapAlgorithm::AesGcm => self.wrap_gcm(cek)?,
            other => return Err(KeyProviderError::UnsupportedAlgorithm(other)),
        };
        debug!(algorithm = %self.algorithm, wrapped_len = encrypted_key.len(), "content key wrapped");
        Ok(WrappedKey {
            algorithm: self.algorithm,
            encrypted_key,
            materials_description: materials_description.clone(),
        })
    }

    async fn unwrap_key(
        &self,
        wrapped: &CryptoBuffer,
        algorithm: KeyWrapAlgorithm,
        _materials_description: &BTreeMap<String, String>,
    ) -> Result<CryptoBuffer, KeyProviderError> {
        match algorithm {
            KeyWrapAlgorithm::AesKeyWrap => self.unwrap_rfc3394(wrapped),
            KeyWrapAlgorithm::AesGcm => self.unwrap_gcm(wrapped),
            other => Err(KeyProviderError::UnsupportedAlgorithm(other)),
        }
    }
}
