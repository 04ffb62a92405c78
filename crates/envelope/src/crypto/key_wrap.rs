//! AES Key Wrap (RFC 3394) under a 256-bit key-encrypting key.
//!
//! The session only accumulates input; the whole wrap or unwrap runs at
//! finalisation. Input to wrap must be at least two 64-bit semiblocks and a
//! whole number of them. Wrapped output is one semiblock longer than its input.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};

use super::error::CipherError;
use super::session::{CipherSession, SymmetricCipher};
use super::{check_length, KEY_LEN};
use crate::buffer::{wipe, CryptoBuffer};

/// Default initial value from RFC 3394 section 2.2.3.1.
pub const DEFAULT_IV: u64 = 0xA6A6_A6A6_A6A6_A6A6;

/// Size of one semiblock in bytes.
pub const SEMIBLOCK_LEN: usize = 8;

const ROUNDS: u64 = 6;

/// RFC 3394 key-wrap session. The IV is always empty.
pub struct AesKeyWrapCipher {
    session: CipherSession,
    working: Vec<u8>,
}

impl AesKeyWrapCipher {
    /// Create a session over a 32-byte key-encrypting key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::CipherInitializationFailure`] if `kek` is not 32 bytes.
    pub fn new(kek: CryptoBuffer) -> Result<Self, CipherError> {
        check_length("key", kek.len(), KEY_LEN)?;
        Ok(Self {
            session: CipherSession::new(
                "AES_KeyWrap",
                kek,
                CryptoBuffer::default(),
                CryptoBuffer::default(),
            ),
            working: Vec::new(),
        })
    }

    fn block_cipher(&mut self) -> Result<Aes256, CipherError> {
        Aes256::new_from_slice(self.session.key()).map_err(|e| {
            let err = CipherError::CipherInitializationFailure(e.to_string());
            self.session.poison(err)
        })
    }
}

impl SymmetricCipher for AesKeyWrapCipher {
    fn session(&self) -> &CipherSession {
        &self.session
    }

    fn encrypt_buffer(&mut self, plaintext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_encrypt()?;
        self.working.extend_from_slice(plaintext);
        Ok(CryptoBuffer::default())
    }

    fn finalize_encryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_encrypt()?;
        let mut input = std::mem::take(&mut self.working);

        if input.len() % SEMIBLOCK_LEN != 0 || input.len() < 2 * SEMIBLOCK_LEN {
            let err = CipherError::InvalidKeyData(format!(
                "key data must be a multiple of {SEMIBLOCK_LEN} bytes and at least {}, got {}",
                2 * SEMIBLOCK_LEN,
                input.len()
            ));
            wipe(&mut input);
            return Err(self.session.poison(err));
        }

        let aes = self.block_cipher()?;
        let mut r = to_semiblocks(&input);
        wipe(&mut input);

        let a = wrap_semiblocks(&aes, DEFAULT_IV, &mut r);
        let out = from_semiblocks(a, &r);
        r.iter_mut().for_each(|x| *x = 0);

        self.session.finish();
        Ok(out)
    }

    fn decrypt_buffer(&mut self, ciphertext: &[u8]) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_decrypt()?;
        self.working.extend_from_slice(ciphertext);
        Ok(CryptoBuffer::default())
    }

    fn finalize_decryption(&mut self) -> Result<CryptoBuffer, CipherError> {
        self.session.begin_decrypt()?;
        let input = std::mem::take(&mut self.working);

        if input.len() % SEMIBLOCK_LEN != 0 || input.len() < 3 * SEMIBLOCK_LEN {
            let err = CipherError::InvalidKeyData(format!(
                "wrapped key must be a multiple of {SEMIBLOCK_LEN} bytes and at least {}, got {}",
                3 * SEMIBLOCK_LEN,
                input.len()
            ));
            return Err(self.session.poison(err));
        }

        let aes = self.block_cipher()?;
        let blocks = to_semiblocks(&input);
        let mut r = blocks[1..].to_vec();

        let a = unwrap_semiblocks(&aes, blocks[0], &mut r);
        if a != DEFAULT_IV {
            r.iter_mut().for_each(|x| *x = 0);
            return Err(self.session.poison(CipherError::KeyIntegrityCheckFailed));
        }

        let mut out = CryptoBuffer::zeroed(r.len() * SEMIBLOCK_LEN);
        for (chunk, block) in out.as_mut_slice().chunks_exact_mut(SEMIBLOCK_LEN).zip(&r) {
            chunk.copy_from_slice(&block.to_be_bytes());
        }
        r.iter_mut().for_each(|x| *x = 0);

        self.session.finish();
        Ok(out)
    }

    fn reset(&mut self) {
        wipe(&mut self.working);
        self.session.reset();
    }

    fn block_size_bytes(&self) -> usize {
        SEMIBLOCK_LEN
    }

    fn key_length_bits(&self) -> usize {
        KEY_LEN * 8
    }
}

/// The `bits` most significant bits of `x`.
pub(crate) fn msb(bits: u32, x: u128) -> u128 {
    match bits {
        0 => 0,
        128.. => x,
        _ => x >> (128 - bits),
    }
}

/// The `bits` least significant bits of `x`.
pub(crate) fn lsb(bits: u32, x: u128) -> u128 {
    match bits {
        0 => 0,
        128.. => x,
        _ => x & ((1u128 << bits) - 1),
    }
}

fn wrap_semiblocks(aes: &Aes256, mut a: u64, r: &mut [u64]) -> u64 {
    let n = r.len() as u64;
    for j in 0..ROUNDS {
        for (i, ri) in r.iter_mut().enumerate() {
            let t = n * j + i as u64 + 1;
            let b = encrypt_block(aes, (u128::from(a) << 64) | u128::from(*ri));
            a = msb(64, b) as u64 ^ t;
            *ri = lsb(64, b) as u64;
        }
    }
    a
}

fn unwrap_semiblocks(aes: &Aes256, mut a: u64, r: &mut [u64]) -> u64 {
    let n = r.len() as u64;
    for j in (0..ROUNDS).rev() {
        for i in (0..r.len()).rev() {
            let t = n * j + i as u64 + 1;
            let b = decrypt_block(aes, (u128::from(a ^ t) << 64) | u128::from(r[i]));
            a = msb(64, b) as u64;
            r[i] = lsb(64, b) as u64;
        }
    }
    a
}

fn encrypt_block(aes: &Aes256, input: u128) -> u128 {
    let mut block = Block::clone_from_slice(&input.to_be_bytes());
    aes.encrypt_block(&mut block);
    block_to_u128(&block)
}

fn decrypt_block(aes: &Aes256, input: u128) -> u128 {
    let mut block = Block::clone_from_slice(&input.to_be_bytes());
    aes.decrypt_block(&mut block);
    block_to_u128(&block)
}

fn block_to_u128(block: &Block) -> u128 {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(block.as_slice());
    u128::from_be_bytes(bytes)
}

fn to_semiblocks(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(SEMIBLOCK_LEN)
        .map(|chunk| {
            let mut semiblock = [0u8; SEMIBLOCK_LEN];
            semiblock.copy_from_slice(chunk);
            u64::from_be_bytes(semiblock)
        })
        .collect()
}

fn from_semiblocks(a: u64, r: &[u64]) -> CryptoBuffer {
    let mut out = CryptoBuffer::zeroed((r.len() + 1) * SEMIBLOCK_LEN);
    let blocks = std::iter::once(&a).chain(r);
    for (chunk, block) in out.as_mut_slice().chunks_exact_mut(SEMIBLOCK_LEN).zip(blocks) {
        chunk.copy_from_slice(&block.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::session::SessionState;
    use aes_kw::KekAes256;
    use proptest::prelude::*;

    fn kek_bytes() -> [u8; 32] {
        let mut kek = [0u8; 32];
        for (i, b) in kek.iter_mut().enumerate() {
            *b = i as u8;
        }
        kek
    }

    fn wrap(kek: [u8; 32], key: &[u8]) -> Result<CryptoBuffer, CipherError> {
        AesKeyWrapCipher::new(CryptoBuffer::from(kek))?.encrypt(key)
    }

    fn unwrap(kek: [u8; 32], wrapped: &[u8]) -> Result<CryptoBuffer, CipherError> {
        AesKeyWrapCipher::new(CryptoBuffer::from(kek))?.decrypt(wrapped)
    }

    #[test]
    fn rfc3394_256_bit_data_with_256_bit_kek() {
        let key_data = hex::decode(
            "00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F",
        )
        .unwrap();
        let expected = hex::decode(
            "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21",
        )
        .unwrap();

        let wrapped = wrap(kek_bytes(), &key_data).unwrap();
        assert_eq!(wrapped.as_slice(), expected.as_slice());
        assert_eq!(unwrap(kek_bytes(), &wrapped).unwrap().as_slice(), key_data.as_slice());
    }

    #[test]
    fn zero_cek_wraps_to_forty_bytes() {
        let wrapped = wrap([0x5Cu8; 32], &[0u8; 32]).unwrap();
        assert_eq!(wrapped.len(), 40);
        assert_eq!(unwrap([0x5Cu8; 32], &wrapped).unwrap().as_slice(), &[0u8; 32]);
    }

    #[test]
    fn corrupted_wrap_fails_integrity_check() {
        let mut wrapped = wrap(kek_bytes(), &[0x33u8; 32]).unwrap().into_vec();
        wrapped[20] ^= 0x80;

        let mut cipher = AesKeyWrapCipher::new(CryptoBuffer::from(kek_bytes())).unwrap();
        assert_eq!(cipher.decrypt(&wrapped), Err(CipherError::KeyIntegrityCheckFailed));
        assert_eq!(cipher.state(), SessionState::Poisoned);
    }

    #[test]
    fn wrong_kek_fails_integrity_check() {
        let wrapped = wrap(kek_bytes(), &[0x33u8; 16]).unwrap();
        assert_eq!(
            unwrap([0xEEu8; 32], &wrapped),
            Err(CipherError::KeyIntegrityCheckFailed)
        );
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(wrap(kek_bytes(), &[0u8; 8]), Err(CipherError::InvalidKeyData(_))));
        assert!(matches!(wrap(kek_bytes(), &[0u8; 20]), Err(CipherError::InvalidKeyData(_))));
        assert!(matches!(unwrap(kek_bytes(), &[0u8; 16]), Err(CipherError::InvalidKeyData(_))));
        assert!(matches!(unwrap(kek_bytes(), &[0u8; 30]), Err(CipherError::InvalidKeyData(_))));
    }

    #[test]
    fn buffered_input_is_emitted_at_finalize() {
        let mut cipher = AesKeyWrapCipher::new(CryptoBuffer::from(kek_bytes())).unwrap();
        assert!(cipher.encrypt_buffer(&[1u8; 16]).unwrap().is_empty());
        assert!(cipher.encrypt_buffer(&[2u8; 16]).unwrap().is_empty());
        assert_eq!(cipher.finalize_encryption().unwrap().len(), 40);
        assert!(cipher.session().iv().is_empty());
        assert_eq!(cipher.block_size_bytes(), 8);
        assert_eq!(cipher.key_length_bits(), 256);
    }

    #[test]
    fn msb_lsb_split() {
        let x = 0x0011_2233_4455_6677_8899_AABB_CCDD_EEFFu128;
        assert_eq!(msb(64, x), 0x0011_2233_4455_6677);
        assert_eq!(lsb(64, x), 0x8899_AABB_CCDD_EEFF);
        assert_eq!(msb(0, x), 0);
        assert_eq!(lsb(128, x), x);
    }

    proptest! {
        #[test]
        fn matches_reference_implementation(
            kek in any::<[u8; 32]>(),
            semiblocks in 2usize..8,
            seed in any::<u8>(),
        ) {
            let key_data: Vec<u8> = (0..semiblocks * 8)
                .map(|i| seed.wrapping_add(i as u8))
                .collect();

            let ours = wrap(kek, &key_data).unwrap();

            let mut reference = vec![0u8; key_data.len() + 8];
            KekAes256::from(kek).wrap(&key_data, &mut reference).unwrap();
            prop_assert_eq!(ours.as_slice(), reference.as_slice());

            let recovered = unwrap(kek, &ours).unwrap();
            prop_assert_eq!(recovered.as_slice(), key_data.as_slice());
        }

        #[test]
        fn any_corrupted_byte_fails_integrity_check(
            position in 0usize..40,
            mask in 1u8..=255,
        ) {
            let mut wrapped = wrap(kek_bytes(), &[0x33u8; 32]).unwrap().into_vec();
            wrapped[position] ^= mask;

            let mut cipher = AesKeyWrapCipher::new(CryptoBuffer::from(kek_bytes())).unwrap();
            prop_assert_eq!(cipher.decrypt(&wrapped), Err(CipherError::KeyIntegrityCheckFailed));
            prop_assert_eq!(cipher.state(), SessionState::Poisoned);
        }
    }
}
