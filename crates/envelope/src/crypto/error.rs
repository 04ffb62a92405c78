//! Errors produced by the cipher layer.

use thiserror::Error;

use super::session::SessionState;

/// Errors produced by cipher sessions, the key-wrap construction, and the crypto runtime.
///
/// [`CipherError::AuthenticationFailure`] and [`CipherError::KeyIntegrityCheckFailed`]
/// signal tampering or a wrong key. They are never folded into a generic failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// The key, IV, or other construction parameter was rejected.
    #[error("cipher initialisation failed: {0}")]
    CipherInitializationFailure(String),

    /// GCM tag verification failed at finalisation.
    #[error("authentication tag mismatch")]
    AuthenticationFailure,

    /// RFC 3394 unwrap produced an integrity check register other than the default IV.
    #[error("key integrity check failed")]
    KeyIntegrityCheckFailed,

    /// Authenticated decryption was finalised without a tag.
    #[error("authentication tag not set")]
    MissingAuthenticationTag,

    /// The supplied tag has the wrong length.
    #[error("invalid authentication tag length: expected {expected} bytes, got {actual}")]
    InvalidTagLength {
        /// Required tag length in bytes.
        expected: usize,
        /// Length of the tag supplied.
        actual: usize,
    },

    /// Key-wrap input is not a whole number of 64-bit semiblocks, or is too short.
    #[error("invalid key data: {0}")]
    InvalidKeyData(String),

    /// CBC padding on the final block is malformed.
    #[error("invalid block padding")]
    BadPadding,

    /// Ciphertext length is not compatible with the cipher's block size.
    #[error("truncated ciphertext: {0}")]
    TruncatedCiphertext(String),

    /// The operation is not valid in the session's current state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// An earlier failure poisoned the session; call `reset` to reuse it.
    #[error("cipher session poisoned by an earlier failure")]
    Poisoned,

    /// [`crate::crypto::runtime::init_static_state`] has not been called.
    #[error("crypto runtime not initialised")]
    RuntimeNotInitialized,

    /// The operating system random source failed.
    #[error("secure random source failed: {0}")]
    RandomSourceFailure(String),
}
