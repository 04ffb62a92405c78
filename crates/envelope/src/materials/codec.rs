//! Conversion between [`ContentCryptoMaterial`] and the flat envelope map.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use common::protocol::{
    deserialize_map, serialize_map, CONTENT_CRYPTO_SCHEME_HEADER, CONTENT_KEY_HEADER,
    CRYPTO_TAG_LENGTH_HEADER, IV_HEADER, KEY_WRAP_ALGORITHM_HEADER, MATERIALS_DESCRIPTION_HEADER,
};
use common::{ContentCryptoScheme, EnvelopeError, KeyWrapAlgorithm};
use tracing::warn;

use super::ContentCryptoMaterial;
use crate::buffer::CryptoBuffer;

/// Render material as the envelope map.
///
/// The tag length header is written only when the material carries one.
pub fn to_envelope_map(material: &ContentCryptoMaterial) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(
        CONTENT_KEY_HEADER.to_owned(),
        STANDARD.encode(material.final_cek()),
    );
    map.insert(IV_HEADER.to_owned(), STANDARD.encode(material.iv()));
    map.insert(
        MATERIALS_DESCRIPTION_HEADER.to_owned(),
        serialize_map(material.materials_description()),
    );
    map.insert(
        CONTENT_CRYPTO_SCHEME_HEADER.to_owned(),
        material.content_crypto_scheme().name().to_owned(),
    );
    map.insert(
        KEY_WRAP_ALGORITHM_HEADER.to_owned(),
        material.key_wrap_algorithm().name().to_owned(),
    );
    if let Some(bits) = material.crypto_tag_length() {
        map.insert(CRYPTO_TAG_LENGTH_HEADER.to_owned(), bits.to_string());
    }
    map
}

/// Rebuild material from an envelope map. Keys not in the envelope are ignored.
///
/// # Errors
///
/// - [`EnvelopeError::UnknownAlgorithm`] for a scheme or wrap name outside the closed sets.
/// - [`EnvelopeError::MissingField`] when a required header is absent.
/// - [`EnvelopeError::InvalidField`] when a value cannot be decoded.
/// - [`EnvelopeError::MalformedMap`] when the materials description is not a string map.
pub fn from_envelope_map(
    map: &BTreeMap<String, String>,
) -> Result<ContentCryptoMaterial, EnvelopeError> {
    let scheme: ContentCryptoScheme = required(map, CONTENT_CRYPTO_SCHEME_HEADER)?.parse()?;
    let key_wrap_algorithm: KeyWrapAlgorithm = required(map, KEY_WRAP_ALGORITHM_HEADER)?.parse()?;

    let final_cek = decode_base64(map, CONTENT_KEY_HEADER)?;
    let iv = decode_base64(map, IV_HEADER)?;
    let materials_description = deserialize_map(required(map, MATERIALS_DESCRIPTION_HEADER)?)?;

    let mut builder = ContentCryptoMaterial::builder(scheme, key_wrap_algorithm)
        .final_cek(final_cek)
        .iv(iv)
        .materials_description(materials_description);

    if let Some(raw) = map.get(CRYPTO_TAG_LENGTH_HEADER) {
        if scheme.is_authenticated() {
            let bits = raw.trim().parse::<u32>().map_err(|e| EnvelopeError::InvalidField {
                field: CRYPTO_TAG_LENGTH_HEADER,
                reason: e.to_string(),
            })?;
            builder = builder.crypto_tag_length(bits);
        } else {
            warn!(scheme = %scheme, value = %raw, "ignoring tag length on unauthenticated envelope");
        }
    }

    builder.build()
}

fn required<'a>(
    map: &'a BTreeMap<String, String>,
    field: &'static str,
) -> Result<&'a str, EnvelopeError> {
    map.get(field)
        .map(String::as_str)
        .ok_or(EnvelopeError::MissingField(field))
}

fn decode_base64(
    map: &BTreeMap<String, String>,
    field: &'static str,
) -> Result<CryptoBuffer, EnvelopeError> {
    let raw = required(map, field)?;
    STANDARD
        .decode(raw.trim())
        .map(CryptoBuffer::from)
        .map_err(|e| EnvelopeError::InvalidField {
            field,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(scheme: ContentCryptoScheme) -> ContentCryptoMaterial {
        ContentCryptoMaterial::builder(scheme, KeyWrapAlgorithm::AesKeyWrap)
            .final_cek(CryptoBuffer::from([0xABu8; 40]))
            .iv(CryptoBuffer::zeroed(scheme.iv_len()))
            .materials_description_entry("kms-key", "abc")
            .build()
            .unwrap()
    }

    #[test]
    fn gcm_material_round_trips() {
        let material = sample(ContentCryptoScheme::Gcm);
        let map = to_envelope_map(&material);

        assert_eq!(map[CONTENT_CRYPTO_SCHEME_HEADER], "AES/GCM/NoPadding");
        assert_eq!(map[KEY_WRAP_ALGORITHM_HEADER], "AESWrap");
        assert_eq!(map[CRYPTO_TAG_LENGTH_HEADER], "128");
        assert_eq!(map[MATERIALS_DESCRIPTION_HEADER], r#"{"kms-key":"abc"}"#);
        assert_eq!(map[IV_HEADER], "AAAAAAAAAAAAAAAA");

        assert_eq!(from_envelope_map(&map).unwrap(), material);
    }

    #[test]
    fn cbc_omits_tag_length() {
        let map = to_envelope_map(&sample(ContentCryptoScheme::Cbc));
        assert!(!map.contains_key(CRYPTO_TAG_LENGTH_HEADER));
    }

    #[test]
    fn stray_tag_length_on_ctr_is_tolerated() {
        let material = sample(ContentCryptoScheme::Ctr);
        let mut map = to_envelope_map(&material);
        map.insert(CRYPTO_TAG_LENGTH_HEADER.to_owned(), "128".to_owned());
        let parsed = from_envelope_map(&map).unwrap();
        assert_eq!(parsed.crypto_tag_length(), None);
        assert_eq!(parsed, material);
    }

    #[test]
    fn empty_and_multi_entry_descriptions() {
        let empty = ContentCryptoMaterial::builder(ContentCryptoScheme::Gcm, KeyWrapAlgorithm::Kms)
            .final_cek(CryptoBuffer::from([1u8; 16]))
            .iv(CryptoBuffer::zeroed(12))
            .build()
            .unwrap();
        let map = to_envelope_map(&empty);
        assert_eq!(map[MATERIALS_DESCRIPTION_HEADER], "{}");
        assert_eq!(from_envelope_map(&map).unwrap(), empty);

        let multi = ContentCryptoMaterial::builder(ContentCryptoScheme::Gcm, KeyWrapAlgorithm::Kms)
            .final_cek(CryptoBuffer::from([1u8; 16]))
            .iv(CryptoBuffer::zeroed(12))
            .materials_description_entry("z", "last")
            .materials_description_entry("a", "first")
            .materials_description_entry("quote", "say \"hi\"")
            .build()
            .unwrap();
        assert_eq!(from_envelope_map(&to_envelope_map(&multi)).unwrap(), multi);
    }

    #[test]
    fn missing_description_is_rejected() {
        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.remove(MATERIALS_DESCRIPTION_HEADER);
        assert_eq!(
            from_envelope_map(&map).unwrap_err(),
            EnvelopeError::MissingField(MATERIALS_DESCRIPTION_HEADER)
        );
    }

    #[test]
    fn unknown_algorithms_are_reported_as_such() {
        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.insert(CONTENT_CRYPTO_SCHEME_HEADER.to_owned(), "AES/XTS/NoPadding".to_owned());
        assert!(from_envelope_map(&map).unwrap_err().is_unknown_algorithm());

        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.insert(KEY_WRAP_ALGORITHM_HEADER.to_owned(), "ROT13".to_owned());
        assert_eq!(
            from_envelope_map(&map).unwrap_err(),
            EnvelopeError::UnknownAlgorithm("ROT13".into())
        );
    }

    #[test]
    fn missing_and_invalid_fields() {
        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.remove(CONTENT_KEY_HEADER);
        assert_eq!(
            from_envelope_map(&map).unwrap_err(),
            EnvelopeError::MissingField(CONTENT_KEY_HEADER)
        );

        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.insert(IV_HEADER.to_owned(), "not base64!".to_owned());
        assert!(matches!(
            from_envelope_map(&map).unwrap_err(),
            EnvelopeError::InvalidField { field: IV_HEADER, .. }
        ));

        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.insert(CRYPTO_TAG_LENGTH_HEADER.to_owned(), "lots".to_owned());
        assert!(matches!(
            from_envelope_map(&map).unwrap_err(),
            EnvelopeError::InvalidField { field: CRYPTO_TAG_LENGTH_HEADER, .. }
        ));
    }

    #[test]
    fn malformed_description_rejected() {
        let mut map = to_envelope_map(&sample(ContentCryptoScheme::Gcm));
        map.insert(MATERIALS_DESCRIPTION_HEADER.to_owned(), r#"{"n":1}"#.to_owned());
        assert!(matches!(
            from_envelope_map(&map).unwrap_err(),
            EnvelopeError::MalformedMap(_)
        ));
    }

    fn any_material() -> impl Strategy<Value = ContentCryptoMaterial> {
        (
            prop::sample::select(ContentCryptoScheme::ALL.to_vec()),
            prop::sample::select(KeyWrapAlgorithm::ALL.to_vec()),
            prop::collection::vec(any::<u8>(), 1..64),
            prop::collection::vec(any::<u8>(), 16),
            prop::collection::btree_map(".*", ".*", 0..6),
        )
            .prop_map(|(scheme, wrap, cek, iv, description)| {
                ContentCryptoMaterial::builder(scheme, wrap)
                    .final_cek(cek.into())
                    .iv(CryptoBuffer::from_slice(&iv[..scheme.iv_len()]))
                    .materials_description(description)
                    .build()
                    .unwrap()
            })
    }

    proptest! {
        #[test]
        fn any_material_round_trips(material in any_material()) {
            let map = to_envelope_map(&material);
            prop_assert_eq!(from_envelope_map(&map).unwrap(), material);
        }
    }
}
