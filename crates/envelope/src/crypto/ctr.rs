//! AES-256-CTR with a 128-bit big-endian counter.
//!
//! Output length always equals input length and finalisation emits nothing.
//! Because the keystream for block `i` depends only on `iv + i`, a reader can
//! decrypt any block-aligned range on its own; see [`counter_block_for`].

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

use super::error::CipherError;
use super::session::{CipherSession, SymmetricCipher};
use super::{check_length, AES_BLOCK_LEN, KEY_LEN};
use crate::buffer::CryptoBuffer;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// AES-256-CTR session.
pub struct AesCtrCipher {
    session: CipherSession,
    keystream: Option<Aes256Ctr>,
}

impl AesCtrCipher {
    /// Create a session over a 32-byte key and 16-byte initial counter block.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::CipherInitializationFailure`] on a wrong key or IV length.
    pub fn new(key: CryptoBuffer, iv: CryptoBuffer) -> Result<Self, CipherError> {
        check_length("key", key.len(), KEY_LEN)?;
        check_length("iv", iv.len(), AES_BLOCK_LEN)?;
        Ok(Self {
            session: CipherSession::new("AES_CTR", key, iv, CryptoBuffer::default()),
            keystream: None,
        })
    }

    fn init_keystream(&mut self) -> Result<(), CipherError> {
        match Aes256Ctr::new_from_slices(self.session.key(), self.session.iv()) {
            Ok(ks) => {
                self.keystream = Some(ks);
                Ok(())
            }
            Err(e) => {
                let err = CipherError::CipherInitializationFailure(e.to_string());
                Err(self.session.poison(err))
            }
        }
    }

    fn apply(&mut self, operation: &'static str, input: &[u8]) -> Result<CryptoBuffer, CipherError> {
        let mut out = CryptoBuffer::from_slice(input);
        let Some(ks) = self.keystream.as_mut() else {
            return Err(CipherError::InvalidState {
                operation,
                state: self.session.state(),
            });
        };
        if let Err(e) = ks.try_apply_keystream(out.as_mut_slice()) {
            let err = CipherError::CipherInitializationFailure(format!("keystream exhausted: {e}"));
            return Err(self.session.poison(err));
        }
        Ok(out)
    }
}

impl SymmetricCipher for AesCtrCipher {
    fn session(&self) -> &CipherSession {
        &self.session
    }

    fn encrypt_buffer(&mut self, plaintext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        if self.session.begin_encrypt()? {
            self.init_keystream()?;
        }
        self.apply("encrypt", plaintext)
    }

    fn finalize_encryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_encrypt()?;
        self.keystream = None;
        self.session.finish();
        Ok(CryptoBuffer::default())
    }

    fn decrypt_buffer(&mut self, ciphertext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        if self.session.begin_decrypt()? {
            self.init_keystream()?;
        }
        self.apply("decrypt", ciphertext)
    }

    fn finalize_decryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_decrypt()?;
        self.keystream = None;
        self.session.finish();
        Ok(CryptoBuffer::default())
    }

    fn reset(&mut self) {
        self.keystream = None;
        self.session.reset();
    }

    fn block_size_bytes(&self) -> usize {
        AES_BLOCK_LEN
    }

    fn key_length_bits(&self) -> usize {
        KEY_LEN * 8
    }
}

/// Counter block used for the `block_index`-th 16-byte block of a stream
/// started at `iv`. The counter wraps modulo 2^128.
///
/// A session created with the returned block decrypts ciphertext starting at
/// byte offset `block_index * 16`.
///
/// # Errors
///
/// Returns [`CipherError::CipherInitializationFailure`] if `iv` is not 16 bytes.
pub fn counter_block_for(iv: &[u8], block_index: u64) -> Result<CryptoBuffer, CipherError> {
    check_length("iv", iv.len(), AES_BLOCK_LEN)?;
    let mut initial = [0u8; AES_BLOCK_LEN];
    initial.copy_from_slice(iv);
    let counter = u128::from_be_bytes(initial).wrapping_add(u128::from(block_index));
    Ok(CryptoBuffer::from(counter.to_be_bytes()))
}
