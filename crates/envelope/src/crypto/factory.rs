//! Cipher construction by algorithm.
//!
//! Every constructor here requires the crypto runtime to be initialised.

use common::ContentCryptoScheme;
use tracing::{debug, warn};

use super::error::CipherError;
use super::runtime;
use super::session::SymmetricCipher;
use super::{AesCbcCipher, AesCtrCipher, AesGcmCipher, AesKeyWrapCipher};
use crate::buffer::CryptoBuffer;

/// Create a content cipher session for `scheme`.
///
/// `tag` is only meaningful for GCM, where it is the tag to verify on decrypt.
/// It is ignored for unauthenticated schemes.
///
/// # Errors
///
/// - [`CipherError::RuntimeNotInitialized`] before [`runtime::init_static_state`].
/// - [`CipherError::CipherInitializationFailure`] on a wrong key or IV length.
pub fn create_content_cipher(
    scheme: ContentCryptoScheme,
    key: CryptoBuffer,
    iv: CryptoBuffer,
    tag: Option<CryptoBuffer>,
) -> Result<Box<dyn SymmetricCipher>, CipherError> {
    runtime::ensure_initialized()?;
    debug!(scheme = %scheme, "creating content cipher");

    let tag = match tag {
        Some(tag) if !scheme.is_authenticated() => {
            warn!(scheme = %scheme, tag_len = tag.len(), "ignoring tag for unauthenticated scheme");
            None
        }
        other => other,
    };

    let cipher: Box<dyn SymmetricCipher> = match scheme {
        ContentCryptoScheme::Cbc => Box::new(AesCbcCipher::new(key, iv)?),
        ContentCryptoScheme::Ctr => Box::new(AesCtrCipher::new(key, iv)?),
        ContentCryptoScheme::Gcm => Box::new(AesGcmCipher::with_tag(
            key,
            iv,
            tag.unwrap_or_default(),
        )?),
    };
    Ok(cipher)
}

/// Create an RFC 3394 key-wrap session under `kek`.
///
/// # Errors
///
/// - [`CipherError::RuntimeNotInitialized`] before [`runtime::init_static_state`].
/// - [`CipherError::CipherInitializationFailure`] if `kek` is not 32 bytes.
pub fn create_key_wrap_cipher(kek: CryptoBuffer) -> Result<AesKeyWrapCipher, CipherError> {
    runtime::ensure_initialized()?;
    AesKeyWrapCipher::new(kek)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::runtime::CryptoRuntime;

    #[test]
    fn builds_each_scheme() {
        let _rt = CryptoRuntime::init().unwrap();
        for scheme in ContentCryptoScheme::ALL {
            let iv = CryptoBuffer::zeroed(scheme.iv_len());
            let mut cipher =
                create_content_cipher(scheme, CryptoBuffer::zeroed(32), iv, None).unwrap();
            assert_eq!(cipher.key_length_bits(), 256);
            assert_eq!(cipher.block_size_bytes(), 16);
            let ciphertext = cipher.encrypt(b"factory").unwrap();
            assert_eq!(cipher.tag().is_some(), scheme.is_authenticated());
            assert!(!ciphertext.is_empty());
        }
    }

    #[test]
    fn gcm_tag_is_passed_through() {
        let _rt = CryptoRuntime::init().unwrap();
        let key = CryptoBuffer::from([9u8; 32]);
        let iv = CryptoBuffer::from([3u8; 12]);

        let mut enc =
            create_content_cipher(ContentCryptoScheme::Gcm, key.clone(), iv.clone(), None).unwrap();
        let ciphertext = enc.encrypt(b"tagged").unwrap();
        let tag = enc.tag().cloned();

        let mut dec = create_content_cipher(ContentCryptoScheme::Gcm, key, iv, tag).unwrap();
        assert_eq!(dec.decrypt(&ciphertext).unwrap().as_slice(), b"tagged");
    }

    #[test]
    fn rejects_wrong_iv_for_scheme() {
        let _rt = CryptoRuntime::init().unwrap();
        let err = create_content_cipher(
            ContentCryptoScheme::Gcm,
            CryptoBuffer::zeroed(32),
            CryptoBuffer::zeroed(16),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(err, CipherError::CipherInitializationFailure(_)));
    }

    #[test]
    fn key_wrap_session_has_no_iv() {
        let _rt = CryptoRuntime::init().unwrap();
        let cipher = create_key_wrap_cipher(CryptoBuffer::zeroed(32)).unwrap();
        assert!(cipher.session().iv().is_empty());
    }
}
