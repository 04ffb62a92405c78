//! Symmetric cipher sessions and the process-wide crypto runtime.
//!
//! This module is free of AWS and storage dependencies. It provides the
//! primitives the envelope layer builds on:
//!
//! - [`AesCbcCipher`], [`AesCtrCipher`], [`AesGcmCipher`]: content encryption
//!   under a 256-bit key.
//! - [`AesKeyWrapCipher`]: RFC 3394 wrapping of key material.
//! - [`factory`]: construction by algorithm name, gated on
//!   [`runtime::init_static_state`].
//!
//! # Ciphertext layout
//!
//! ```text
//! CBC  ciphertext = PKCS#7-padded blocks          (len rounded up to 16, +16 if aligned)
//! CTR  ciphertext = keystream XOR plaintext       (len unchanged)
//! GCM  ciphertext = keystream XOR plaintext       (len unchanged, 16-byte tag separate)
//! Wrap ciphertext = A || R[1..n]                  (len + 8)
//! ```

pub mod cbc;
pub mod ctr;
pub mod error;
pub mod factory;
pub mod gcm;
pub mod key_wrap;
pub mod random;
pub mod runtime;
pub mod session;

pub use cbc::AesCbcCipher;
pub use ctr::{counter_block_for, AesCtrCipher};
pub use error::CipherError;
pub use factory::{create_content_cipher, create_key_wrap_cipher};
pub use gcm::AesGcmCipher;
pub use key_wrap::AesKeyWrapCipher;
pub use runtime::{cleanup_static_state, init_static_state, CryptoRuntime};
pub use session::{CipherSession, SessionState, SymmetricCipher};

/// AES-256 key length in bytes. Content keys and key-encrypting keys alike.
pub const KEY_LEN: usize = 32;

/// AES block length in bytes.
pub const AES_BLOCK_LEN: usize = 16;

/// GCM IV length in bytes.
pub const GCM_IV_LEN: usize = 12;

/// GCM tag length in bytes. The only length accepted.
pub const GCM_TAG_LEN: usize = 16;

pub(crate) fn check_length(what: &str, actual: usize, expected: usize) -> Result<(), CipherError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CipherError::CipherInitializationFailure(format!(
            "{what} must be {expected} bytes, got {actual}"
        )))
    }
}
