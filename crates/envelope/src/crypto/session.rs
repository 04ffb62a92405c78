//! The [`SymmetricCipher`] contract and the session state shared by every cipher.
//!
//! # Session lifecycle
//!
//! ```text
//!            encrypt_buffer            finalize_encryption
//!   Fresh ─────────────────▶ Encrypting ───────────────────▶ Finalized
//!     │      decrypt_buffer            finalize_decryption        │
//!     └────────────────────▶ Decrypting ───────────────────▶ Finalized
//!
//!   any primitive failure ─▶ Poisoned          reset() ─▶ Fresh (from any state)
//! ```
//!
//! A session that started encrypting cannot decrypt (and vice versa) until it
//! is reset. Poisoning is sticky: every later call returns
//! [`CipherError::Poisoned`].

use std::fmt;

use tracing::{debug, error, warn};

use super::error::CipherError;
use crate::buffer::CryptoBuffer;

/// Lifecycle state of a cipher session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed or reset; no data processed yet.
    Fresh,
    /// Accepting plaintext.
    Encrypting,
    /// Accepting ciphertext.
    Decrypting,
    /// Finalised; only `reset` is accepted.
    Finalized,
    /// A primitive failure occurred; only `reset` is accepted.
    Poisoned,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Fresh => "fresh",
            SessionState::Encrypting => "encrypting",
            SessionState::Decrypting => "decrypting",
            SessionState::Finalized => "finalized",
            SessionState::Poisoned => "poisoned",
        })
    }
}

/// Key material and lifecycle state owned by one cipher session.
///
/// Key and IV never change for the lifetime of the session. The tag is
/// written by authenticated encryption and read by authenticated decryption.
#[derive(Debug)]
pub struct CipherSession {
    name: &'static str,
    key: CryptoBuffer,
    iv: CryptoBuffer,
    tag: CryptoBuffer,
    state: SessionState,
}

impl CipherSession {
    pub(crate) fn new(
        name: &'static str,
        key: CryptoBuffer,
        iv: CryptoBuffer,
        tag: CryptoBuffer,
    ) -> Self {
        Self {
            name,
            key,
            iv,
            tag,
            state: SessionState::Fresh,
        }
    }

    /// Name of the concrete cipher, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Session key.
    pub fn key(&self) -> &CryptoBuffer {
        &self.key
    }

    /// Session IV. Empty for ciphers that take none.
    pub fn iv(&self) -> &CryptoBuffer {
        &self.iv
    }

    /// Authentication tag. Empty until set or produced.
    pub fn tag(&self) -> &CryptoBuffer {
        &self.tag
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_tag(&mut self, tag: CryptoBuffer) {
        self.tag = tag;
    }

    /// Enter (or stay in) the encrypting state.
    ///
    /// Returns `true` when this call moved the session out of `Fresh`.
    pub(crate) fn begin_encrypt(&mut self) -> Result<bool, CipherError> {
        self.begin(SessionState::Encrypting, "encrypt")
    }

    /// Enter (or stay in) the decrypting state.
    ///
    /// Returns `true` when this call moved the session out of `Fresh`.
    pub(crate) fn begin_decrypt(&mut self) -> Result<bool, CipherError> {
        self.begin(SessionState::Decrypting, "decrypt")
    }

    fn begin(&mut self, mode: SessionState, operation: &'static str) -> Result<bool, CipherError> {
        match self.state {
            SessionState::Poisoned => {
                warn!(cipher = self.name, operation, "operation on poisoned cipher session");
                Err(CipherError::Poisoned)
            }
            SessionState::Fresh => {
                debug!(cipher = self.name, state = %mode, "cipher session initialised");
                self.state = mode;
                Ok(true)
            }
            current if current == mode => Ok(false),
            state => Err(CipherError::InvalidState { operation, state }),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state = SessionState::Finalized;
    }

    /// Mark the session poisoned and hand the error back for propagation.
    pub(crate) fn poison(&mut self, err: CipherError) -> CipherError {
        error!(cipher = self.name, error = %err, "cipher operation failed; session poisoned");
        self.state = SessionState::Poisoned;
        err
    }

    pub(crate) fn reset(&mut self) {
        if self.state != SessionState::Fresh {
            debug!(cipher = self.name, from = %self.state, "cipher session reset");
        }
        self.state = SessionState::Fresh;
    }
}

/// A stateful encrypt-or-decrypt session over one key/IV/tag triple.
///
/// Each call returns `Err` instead of an empty buffer when it fails. Failures of
/// the underlying primitive also poison the session.
pub trait SymmetricCipher: Send {
    /// Shared session state.
    fn session(&self) -> &CipherSession;

    /// Feed plaintext. Returns the ciphertext available so far, possibly empty.
    fn encrypt_buffer(&mut self, plaintext: &[u8]) -> Result<CryptoBuffer, CipherError>;

    /// Flush buffered input, apply padding or compute the tag, and end the session.
    fn finalize_encryption(&mut self) -> Result<CryptoBuffer, CipherError>;

    /// Feed ciphertext. Returns the plaintext available so far, possibly empty.
    fn decrypt_buffer(&mut self, ciphertext: &[u8]) -> Result<CryptoBuffer, CipherError>;

    /// Flush buffered input, verify padding or tag, and end the session.
    fn finalize_decryption(&mut self) -> Result<CryptoBuffer, CipherError>;

    /// Return to `Fresh`, discarding buffered data. Key and IV are kept.
    fn reset(&mut self);

    /// Cipher block size in bytes.
    fn block_size_bytes(&self) -> usize;

    /// Key length in bits.
    fn key_length_bits(&self) -> usize;

    /// Current lifecycle state.
    fn state(&self) -> SessionState {
        self.session().state()
    }

    /// Authentication tag, if one has been set or produced.
    fn tag(&self) -> Option<&CryptoBuffer> {
        let tag = self.session().tag();
        (!tag.is_empty()).then_some(tag)
    }

    /// Encrypt a whole message: one `encrypt_buffer` followed by `finalize_encryption`.
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        let head = self.encrypt_buffer(plaintext)?;
        let tail = self.finalize_encryption()?;
        Ok(CryptoBuffer::concat(&[head.as_slice(), tail.as_slice()]))
    }

    /// Decrypt a whole message: one `decrypt_buffer` followed by `finalize_decryption`.
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        let head = self.decrypt_buffer(ciphertext)?;
        let tail = self.finalize_decryption()?;
        Ok(CryptoBuffer::concat(&[head.as_slice(), tail.as_slice()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CipherSession {
        CipherSession::new(
            "test",
            CryptoBuffer::zeroed(32),
            CryptoBuffer::zeroed(16),
            CryptoBuffer::default(),
        )
    }

    #[test]
    fn first_begin_reports_transition() {
        let mut s = session();
        assert!(s.begin_encrypt().unwrap());
        assert!(!s.begin_encrypt().unwrap());
        assert_eq!(s.state(), SessionState::Encrypting);
    }

    #[test]
    fn modes_are_exclusive() {
        let mut s = session();
        s.begin_encrypt().unwrap();
        assert_eq!(
            s.begin_decrypt(),
            Err(CipherError::InvalidState {
                operation: "decrypt",
                state: SessionState::Encrypting,
            })
        );
        // Misuse does not poison.
        assert_eq!(s.state(), SessionState::Encrypting);
    }

    #[test]
    fn finalized_rejects_further_input() {
        let mut s = session();
        s.begin_decrypt().unwrap();
        s.finish();
        assert!(matches!(
            s.begin_decrypt(),
            Err(CipherError::InvalidState { .. })
        ));
    }

    #[test]
    fn poison_is_sticky_until_reset() {
        let mut s = session();
        s.begin_encrypt().unwrap();
        let err = s.poison(CipherError::BadPadding);
        assert_eq!(err, CipherError::BadPadding);
        assert_eq!(s.begin_encrypt(), Err(CipherError::Poisoned));
        assert_eq!(s.begin_decrypt(), Err(CipherError::Poisoned));

        s.reset();
        assert_eq!(s.state(), SessionState::Fresh);
        assert!(s.begin_decrypt().unwrap());
    }

    #[test]
    fn reset_keeps_key_and_iv() {
        let mut s = CipherSession::new(
            "test",
            CryptoBuffer::from([7u8; 32]),
            CryptoBuffer::from([9u8; 12]),
            CryptoBuffer::default(),
        );
        s.begin_encrypt().unwrap();
        s.reset();
        assert_eq!(s.key().as_slice(), &[7u8; 32]);
        assert_eq!(s.iv().as_slice(), &[9u8; 12]);
    }
}
