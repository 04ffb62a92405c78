//! Master key providers: wrap a content key under a key-encrypting key and back.
//!
//! The provider decides the key-wrap algorithm recorded in the envelope. On
//! read, the recorded algorithm is passed back so a provider can refuse an
//! envelope it cannot open rather than guess.

pub mod kms;
pub mod local;

use std::{collections::BTreeMap, future::Future};

use common::KeyWrapAlgorithm;
use thiserror::Error;

use crate::buffer::CryptoBuffer;
use crate::crypto::CipherError;

pub use kms::KmsKeyProvider;
pub use local::SymmetricKeyProvider;

/// Errors produced by a [`MasterKeyProvider`].
#[derive(Debug, Error)]
pub enum KeyProviderError {
    /// The provider cannot wrap or unwrap with this algorithm.
    #[error("unsupported key wrap algorithm: {0}")]
    UnsupportedAlgorithm(KeyWrapAlgorithm),

    /// A local cipher operation failed. Integrity failures stay distinguishable.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// The wrapped key does not have the layout its algorithm requires.
    #[error("malformed wrapped key: {0}")]
    MalformedWrappedKey(String),

    /// The KMS request failed.
    #[error("KMS request failed: {0}")]
    Kms(String),
}

/// Output of [`MasterKeyProvider::wrap_key`].
#[derive(Debug, Clone)]
pub struct WrappedKey {
    /// Algorithm to record in the envelope.
    pub algorithm: KeyWrapAlgorithm,
    /// The wrapped content key, stored as `x-amz-key-v2`.
    pub encrypted_key: CryptoBuffer,
    /// Materials description to record; may extend the caller's.
    pub materials_description: BTreeMap<String, String>,
}

/// Wraps and unwraps content encryption keys.
pub trait MasterKeyProvider: Send + Sync {
    /// Wrap `cek`, binding `materials_description` where the algorithm supports it.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyProviderError`] if wrapping fails.
    fn wrap_key(
        &self,
        cek: &CryptoBuffer,
        materials_description: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<WrappedKey, KeyProviderError>> + Send;

    /// Recover the content key from `wrapped`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyProviderError::UnsupportedAlgorithm`] if `algorithm` is not
    /// one this provider handles, or another [`KeyProviderError`] on failure.
    fn unwrap_key(
        &self,
        wrapped: &CryptoBuffer,
        algorithm: KeyWrapAlgorithm,
        materials_description: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<CryptoBuffer, KeyProviderError>> + Send;
}

/// Provider chosen at startup from configuration.
#[derive(Debug, Clone)]
pub enum AnyKeyProvider {
    Local(SymmetricKeyProvider),
    Kms(KmsKeyProvider),
}

impl MasterKeyProvider for AnyKeyProvider {
    async fn wrap_key(
        &self,
        cek: &CryptoBuffer,
        materials_description: &BTreeMap<String, String>,
    ) -> Result<WrappedKey, KeyProviderError> {
        match self {
            AnyKeyProvider::Local(p) => p.wrap_key(cek, materials_description).await,
            AnyKeyProvider::Kms(p) => p.wrap_key(cek, materials_description).await,
        }
    }

    async fn unwrap_key(
        &self,
        wrapped: &CryptoBuffer,
        algorithm: KeyWrapAlgorithm,
        materials_description: &BTreeMap<String, String>,
    ) -> Result<CryptoBuffer, KeyProviderError> {
        match self {
            AnyKeyProvider::Local(p) => {
                p.unwrap_key(wrapped, algorithm, materials_description).await
            }
            AnyKeyProvider::Kms(p) => p.unwrap_key(wrapped, algorithm, materials_description).await,
        }
    }
}
