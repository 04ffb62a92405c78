//! AES-256-CBC with PKCS#7 padding.
//!
//! Encryption emits whole blocks as soon as they are available and keeps the
//! remainder (under one block) until more input or finalisation. Decryption
//! always holds back the last full block, because only finalisation knows it
//! carries the padding.

use aes::{Aes256, Block};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::error::CipherError;
use super::session::{CipherSession, SymmetricCipher};
use super::{check_length, AES_BLOCK_LEN, KEY_LEN};
use crate::buffer::{wipe, CryptoBuffer};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

enum Engine {
    Idle,
    Encrypt(Aes256CbcEnc),
    Decrypt(Aes256CbcDec),
}

/// AES-256-CBC session. Not authenticated; integrity must come from an outer layer.
pub struct AesCbcCipher {
    session: CipherSession,
    engine: Engine,
    pending: Vec<u8>,
}

impl AesCbcCipher {
    /// Create a session over a 32-byte key and 16-byte IV.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::CipherInitializationFailure`] on a wrong key or IV length.
    pub fn new(key: CryptoBuffer, iv: CryptoBuffer) -> Result<Self, CipherError> {
        check_length("key", key.len(), KEY_LEN)?;
        check_length("iv", iv.len(), AES_BLOCK_LEN)?;
        Ok(Self {
            session: CipherSession::new("AES_CBC", key, iv, CryptoBuffer::default()),
            engine: Engine::Idle,
            pending: Vec::new(),
        })
    }

    fn start_encrypt(&mut self) -> Result<(), CipherError> {
        if self.session.begin_encrypt()? {
            match Aes256CbcEnc::new_from_slices(self.session.key(), self.session.iv()) {
                Ok(enc) => self.engine = Engine::Encrypt(enc),
                Err(e) => {
                    let err = CipherError::CipherInitializationFailure(e.to_string());
                    return Err(self.session.poison(err));
                }
            }
        }
        Ok(())
    }

    fn start_decrypt(&mut self) -> Result<(), CipherError> {
        if self.session.begin_decrypt()? {
            match Aes256CbcDec::new_from_slices(self.session.key(), self.session.iv()) {
                Ok(dec) => self.engine = Engine::Decrypt(dec),
                Err(e) => {
                    let err = CipherError::CipherInitializationFailure(e.to_string());
                    return Err(self.session.poison(err));
                }
            }
        }
        Ok(())
    }

    fn encrypt_blocks(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        match &mut self.engine {
            Engine::Encrypt(enc) => {
                for chunk in data.chunks_exact_mut(AES_BLOCK_LEN) {
                    enc.encrypt_block_mut(Block::from_mut_slice(chunk));
                }
                Ok(())
            }
            _ => Err(CipherError::InvalidState {
                operation: "encrypt",
                state: self.session.state(),
            }),
        }
    }

    fn decrypt_blocks(&mut self, data: &mut [u8]) -> Result<(), CipherError> {
        match &mut self.engine {
            Engine::Decrypt(dec) => {
                for chunk in data.chunks_exact_mut(AES_BLOCK_LEN) {
                    dec.decrypt_block_mut(Block::from_mut_slice(chunk));
                }
                Ok(())
            }
            _ => Err(CipherError::InvalidState {
                operation: "decrypt",
                state: self.session.state(),
            }),
        }
    }
}

impl SymmetricCipher for AesCbcCipher {
    fn session(&self) -> &CipherSession {
        &self.session
    }

    fn encrypt_buffer(&mut self, plaintext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        self.start_encrypt()?;
        self.pending.extend_from_slice(plaintext);

        let ready = self.pending.len() - self.pending.len() % AES_BLOCK_LEN;
        let mut out: Vec<u8> = self.pending.drain(..ready).collect();
        self.encrypt_blocks(&mut out)?;
        Ok(out.into())
    }

    fn finalize_encryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.start_encrypt()?;

        // PKCS#7: always pad, a whole block of padding when already aligned.
        let pad = AES_BLOCK_LEN - self.pending.len() % AES_BLOCK_LEN;
        let mut last = std::mem::take(&mut self.pending);
        last.resize(last.len() + pad, pad as u8);

        self.encrypt_blocks(&mut last)?;
        self.session.finish();
        Ok(last.into())
    }

    fn decrypt_buffer(&mut self, ciphertext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        self.start_decrypt()?;
        self.pending.extend_from_slice(ciphertext);

        let mut ready = self.pending.len() - self.pending.len() % AES_BLOCK_LEN;
        if ready == self.pending.len() {
            ready = ready.saturating_sub(AES_BLOCK_LEN);
        }
        let mut out: Vec<u8> = self.pending.drain(..ready).collect();
        self.decrypt_blocks(&mut out)?;
        Ok(out.into())
    }

    fn finalize_decryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.start_decrypt()?;

        if self.pending.len() != AES_BLOCK_LEN {
            let trailing = self.pending.len();
            wipe(&mut self.pending);
            let err = CipherError::TruncatedCiphertext(format!(
                "{trailing} trailing bytes, expected one {AES_BLOCK_LEN}-byte block"
            ));
            return Err(self.session.poison(err));
        }

        let mut last = std::mem::take(&mut self.pending);
        self.decrypt_blocks(&mut last)?;

        let pad = usize::from(last[AES_BLOCK_LEN - 1]);
        let valid = (1..=AES_BLOCK_LEN).contains(&pad)
            && last[AES_BLOCK_LEN - pad..]
                .iter()
                .all(|b| usize::from(*b) == pad);
        if !valid {
            wipe(&mut last);
            return Err(self.session.poison(CipherError::BadPadding));
        }

        last.truncate(AES_BLOCK_LEN - pad);
        self.session.finish();
        Ok(last.into())
    }

    fn reset(&mut self) {
        wipe(&mut self.pending);
        self.engine = Engine::Idle;
        self.session.reset();
    }

    fn block_size_bytes(&self) -> usize {
        AES_BLOCK_LEN
    }

    fn key_length_bits(&self) -> usize {
        KEY_LEN * 8
    }
}
