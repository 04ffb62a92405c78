//! AES-256-GCM with a 96-bit IV and 128-bit tag.
//!
//! The AEAD is one-shot: input is accumulated until finalisation, which
//! encrypts or decrypts the whole message in place. Decrypted plaintext is
//! never released before the tag verifies; on mismatch it is zeroed.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};

use super::error::CipherError;
use super::session::{CipherSession, SymmetricCipher};
use super::{check_length, AES_BLOCK_LEN, GCM_IV_LEN, GCM_TAG_LEN, KEY_LEN};
use crate::buffer::{wipe, CryptoBuffer};

/// AES-256-GCM session.
pub struct AesGcmCipher {
    session: CipherSession,
    pending: Vec<u8>,
}

impl AesGcmCipher {
    /// Create a session over a 32-byte key and 12-byte IV with no tag.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::CipherInitializationFailure`] on a wrong key or IV length.
    pub fn new(key: CryptoBuffer, iv: CryptoBuffer) -> Result<Self, CipherError> {
        Self::with_tag(key, iv, CryptoBuffer::default())
    }

    /// Create a session with a tag ready for decryption.
    ///
    /// The tag length is checked when decryption is finalised.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::CipherInitializationFailure`] on a wrong key or IV length.
    pub fn with_tag(
        key: CryptoBuffer,
        iv: CryptoBuffer,
        tag: CryptoBuffer,
    ) -> Result<Self, CipherError> {
        check_length("key", key.len(), KEY_LEN)?;
        check_length("iv", iv.len(), GCM_IV_LEN)?;
        Ok(Self {
            session: CipherSession::new("AES_GCM", key, iv, tag),
            pending: Vec::new(),
        })
    }

    /// Supply the tag to verify against. Must be called before `finalize_decryption`.
    pub fn set_tag(&mut self, tag: CryptoBuffer) {
        self.session.set_tag(tag);
    }

    fn aead(&mut self) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(self.session.key()).map_err(|e| {
            let err = CipherError::CipherInitializationFailure(e.to_string());
            self.session.poison(err)
        })
    }
}

impl SymmetricCipher for AesGcmCipher {
    fn session(&self) -> &CipherSession {
        &self.session
    }

    fn encrypt_buffer(&mut self, plaintext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_encrypt()?;
        self.pending.extend_from_slice(plaintext);
        Ok(CryptoBuffer::default())
    }

    fn finalize_encryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_encrypt()?;
        let aead = self.aead()?;
        let mut message = std::mem::take(&mut self.pending);

        let sealed =
            aead.encrypt_in_place_detached(Nonce::from_slice(self.session.iv()), b"", &mut message);
        match sealed {
            Ok(tag) => {
                self.session.set_tag(CryptoBuffer::from_slice(tag.as_slice()));
                self.session.finish();
                Ok(message.into())
            }
            Err(_) => {
                wipe(&mut message);
                let err =
                    CipherError::CipherInitializationFailure("message exceeds GCM length limit".into());
                Err(self.session.poison(err))
            }
        }
    }

    fn decrypt_buffer(&mut self, ciphertext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_decrypt()?;
        self.pending.extend_from_slice(ciphertext);
        Ok(CryptoBuffer::default())
    }

    fn finalize_decryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_decrypt()?;

        // Tag problems are caller errors: the buffered ciphertext is kept so the
        // tag can be supplied and finalisation retried.
        let supplied = self.session.tag().len();
        if supplied == 0 {
            return Err(CipherError::MissingAuthenticationTag);
        }
        if supplied != GCM_TAG_LEN {
            return Err(CipherError::InvalidTagLength {
                expected: GCM_TAG_LEN,
                actual: supplied,
            });
        }
        let tag = Tag::clone_from_slice(self.session.tag());

        let aead = self.aead()?;
        let mut message = std::mem::take(&mut self.pending);
        let opened = aead.decrypt_in_place_detached(
            Nonce::from_slice(self.session.iv()),
            b"",
            &mut message,
            &tag,
        );
        match opened {
            Ok(()) => {
                self.session.finish();
                Ok(message.into())
            }
            Err(_) => {
                wipe(&mut message);
                Err(self.session.poison(CipherError::AuthenticationFailure))
            }
        }
    }

    /// Also drops the tag, so a decrypting caller must supply it again.
    fn reset(&mut self) {
        wipe(&mut self.pending);
        self.session.set_tag(CryptoBuffer::default());
        self.session.reset();
    }

    fn block_size_bytes(&self) -> usize {
        AES_BLOCK_LEN
    }

    fn key_length_bits(&self) -> usize {
        KEY_LEN * 8
    }
}
