//! Secure random generation of content keys and IVs.

use aes_gcm::aead::{rand_core::RngCore, OsRng};

use super::error::CipherError;
use super::runtime::{self, LockSlot};
use crate::buffer::CryptoBuffer;

/// Fill a new buffer of `len` bytes from the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CipherError::RuntimeNotInitialized`] before runtime init, or
/// [`CipherError::RandomSourceFailure`] if the OS source fails.
pub fn secure_random_bytes(len: usize) -> Result<CryptoBuffer, CipherError> {
    runtime::with_slot(LockSlot::Random, || {
        let mut buf = CryptoBuffer::zeroed(len);
        OsRng
            .try_fill_bytes(buf.as_mut_slice())
            .map_err(|e| CipherError::RandomSourceFailure(e.to_string()))?;
        Ok(buf)
    })?
}

/// Generate a fresh content encryption key of `len` bytes.
pub fn generate_key(len: usize) -> Result<CryptoBuffer, CipherError> {
    runtime::with_slot(LockSlot::KeyGeneration, || secure_random_bytes(len))?
}

/// Generate a fresh IV of `len` bytes.
pub fn generate_iv(len: usize) -> Result<CryptoBuffer, CipherError> {
    secure_random_bytes(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::runtime::CryptoRuntime;

    #[test]
    fn lengths_match_request() {
        let _rt = CryptoRuntime::init().unwrap();
        assert_eq!(generate_key(32).unwrap().len(), 32);
        assert_eq!(generate_iv(12).unwrap().len(), 12);
        assert!(secure_random_bytes(0).unwrap().is_empty());
    }

    #[test]
    fn successive_keys_differ() {
        let _rt = CryptoRuntime::init().unwrap();
        let a = generate_key(32).unwrap();
        let b = generate_key(32).unwrap();
        assert_ne!(a, b);
    }
}
