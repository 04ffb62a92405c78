//! [`ContentCryptoMaterial`]: everything a reader needs to rebuild one object's
//! content key and decrypt it.
//!
//! Material is built once through [`ContentCryptoMaterialBuilder`], which
//! validates it, and is immutable afterwards.

pub mod codec;

use std::collections::BTreeMap;

use common::{ContentCryptoScheme, EnvelopeError, KeyWrapAlgorithm};
use tracing::warn;

use crate::buffer::CryptoBuffer;

pub use codec::{from_envelope_map, to_envelope_map};

/// The only tag length written or accepted for GCM, in bits.
pub const GCM_TAG_LENGTH_BITS: u32 = 128;

/// Encryption descriptor for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentCryptoMaterial {
    final_cek: CryptoBuffer,
    iv: CryptoBuffer,
    content_crypto_scheme: ContentCryptoScheme,
    key_wrap_algorithm: KeyWrapAlgorithm,
    crypto_tag_length: Option<u32>,
    materials_description: BTreeMap<String, String>,
}

impl ContentCryptoMaterial {
    /// Start building material for the given algorithms.
    pub fn builder(
        scheme: ContentCryptoScheme,
        key_wrap_algorithm: KeyWrapAlgorithm,
    ) -> ContentCryptoMaterialBuilder {
        ContentCryptoMaterialBuilder {
            scheme,
            key_wrap_algorithm,
            final_cek: CryptoBuffer::default(),
            iv: CryptoBuffer::default(),
            crypto_tag_length: None,
            materials_description: BTreeMap::new(),
        }
    }

    /// Wrapped content encryption key, exactly as stored.
    pub fn final_cek(&self) -> &CryptoBuffer {
        &self.final_cek
    }

    /// Content cipher IV.
    pub fn iv(&self) -> &CryptoBuffer {
        &self.iv
    }

    pub fn content_crypto_scheme(&self) -> ContentCryptoScheme {
        self.content_crypto_scheme
    }

    pub fn key_wrap_algorithm(&self) -> KeyWrapAlgorithm {
        self.key_wrap_algorithm
    }

    /// Tag length in bits. `Some` for authenticated schemes only.
    pub fn crypto_tag_length(&self) -> Option<u32> {
        self.crypto_tag_length
    }

    pub fn materials_description(&self) -> &BTreeMap<String, String> {
        &self.materials_description
    }
}

/// Validating builder for [`ContentCryptoMaterial`].
#[derive(Debug)]
pub struct ContentCryptoMaterialBuilder {
    scheme: ContentCryptoScheme,
    key_wrap_algorithm: KeyWrapAlgorithm,
    final_cek: CryptoBuffer,
    iv: CryptoBuffer,
    crypto_tag_length: Option<u32>,
    materials_description: BTreeMap<String, String>,
}

impl ContentCryptoMaterialBuilder {
    pub fn final_cek(mut self, final_cek: CryptoBuffer) -> Self {
        self.final_cek = final_cek;
        self
    }

    pub fn iv(mut self, iv: CryptoBuffer) -> Self {
        self.iv = iv;
        self
    }

    pub fn crypto_tag_length(mut self, bits: u32) -> Self {
        self.crypto_tag_length = Some(bits);
        self
    }

    /// Replace the whole materials description.
    pub fn materials_description(mut self, description: BTreeMap<String, String>) -> Self {
        self.materials_description = description;
        self
    }

    /// Add or overwrite one materials description entry.
    pub fn materials_description_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.materials_description.insert(key.into(), value.into());
        self
    }

    /// Validate and produce the material.
    ///
    /// A GCM tag length defaults to 128 bits when not set. A tag length given
    /// for CBC or CTR carries no meaning and is dropped.
    ///
    /// # Errors
    ///
    /// - [`EnvelopeError::MissingField`] if the wrapped key is empty.
    /// - [`EnvelopeError::InvalidField`] if the IV length does not match the
    ///   scheme, or a GCM tag length other than 128 is given.
    pub fn build(self) -> Result<ContentCryptoMaterial, EnvelopeError> {
        if self.final_cek.is_empty() {
            return Err(EnvelopeError::MissingField(common::protocol::CONTENT_KEY_HEADER));
        }

        let expected_iv = self.scheme.iv_len();
        if self.iv.len() != expected_iv {
            return Err(EnvelopeError::InvalidField {
                field: common::protocol::IV_HEADER,
                reason: format!(
                    "{} requires a {expected_iv}-byte IV, got {}",
                    self.scheme,
                    self.iv.len()
                ),
            });
        }

        let crypto_tag_length = if self.scheme.is_authenticated() {
            match self.crypto_tag_length.unwrap_or(GCM_TAG_LENGTH_BITS) {
                GCM_TAG_LENGTH_BITS => Some(GCM_TAG_LENGTH_BITS),
                other => {
                    return Err(EnvelopeError::InvalidField {
                        field: common::protocol::CRYPTO_TAG_LENGTH_HEADER,
                        reason: format!("unsupported tag length {other}, expected {GCM_TAG_LENGTH_BITS}"),
                    })
                }
            }
        } else {
            if let Some(bits) = self.crypto_tag_length {
                warn!(scheme = %self.scheme, bits, "dropping tag length for unauthenticated scheme");
            }
            None
        };

        Ok(ContentCryptoMaterial {
            final_cek: self.final_cek,
            iv: self.iv,
            content_crypto_scheme: self.scheme,
            key_wrap_algorithm: self.key_wrap_algorithm,
            crypto_tag_length,
            materials_description: self.materials_description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcm() -> ContentCryptoMaterialBuilder {
        ContentCryptoMaterial::builder(ContentCryptoScheme::Gcm, KeyWrapAlgorithm::AesKeyWrap)
            .final_cek(CryptoBuffer::zeroed(40))
            .iv(CryptoBuffer::zeroed(12))
    }

    #[test]
    fn gcm_tag_length_defaults_to_128() {
        let material = gcm().build().unwrap();
        assert_eq!(material.crypto_tag_length(), Some(128));
        assert_eq!(material.content_crypto_scheme(), ContentCryptoScheme::Gcm);
        assert_eq!(material.key_wrap_algorithm(), KeyWrapAlgorithm::AesKeyWrap);
    }

    #[test]
    fn gcm_rejects_other_tag_lengths() {
        let err = gcm().crypto_tag_length(96).build().unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::InvalidField { field: "x-amz-tag-len", .. }
        ));
    }

    #[test]
    fn cbc_drops_tag_length() {
        let material =
            ContentCryptoMaterial::builder(ContentCryptoScheme::Cbc, KeyWrapAlgorithm::Kms)
                .final_cek(CryptoBuffer::zeroed(8))
                .iv(CryptoBuffer::zeroed(16))
                .crypto_tag_length(128)
                .build()
                .unwrap();
        assert_eq!(material.crypto_tag_length(), None);
    }

    #[test]
    fn empty_cek_rejected() {
        let err = ContentCryptoMaterial::builder(ContentCryptoScheme::Ctr, KeyWrapAlgorithm::Kms)
            .iv(CryptoBuffer::zeroed(16))
            .build()
            .unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField("x-amz-key-v2"));
    }

    #[test]
    fn iv_length_must_match_scheme() {
        let err = gcm().iv(CryptoBuffer::zeroed(16)).build().unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidField { field: "x-amz-iv", .. }));
    }

    #[test]
    fn description_entries_accumulate() {
        let material = gcm()
            .materials_description_entry("b", "2")
            .materials_description_entry("a", "1")
            .materials_description_entry("b", "3")
            .build()
            .unwrap();
        let keys: Vec<_> = material.materials_description().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(material.materials_description()["b"], "3");
    }
}
