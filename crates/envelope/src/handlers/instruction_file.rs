//! [`InstructionFileHandler`]: envelope stored in a companion `.instruction` object.

use common::protocol::{
    deserialize_map, serialize_map, DEFAULT_INSTRUCTION_FILE_SUFFIX, INSTRUCTION_FILE_HEADER,
    INSTRUCTION_FILE_HEADER_VALUE,
};
use common::EnvelopeError;
use tracing::{debug, warn};

use super::CryptoMaterialHandler;
use crate::materials::{from_envelope_map, to_envelope_map, ContentCryptoMaterial};
use crate::store::{GetObjectResult, PutObjectRequest};

/// Handler for instruction objects.
///
/// `populate_request` turns a request for the data object into the request
/// for its instruction object: the key gains the suffix, the metadata is
/// replaced by the instruction marker, and the body becomes the JSON envelope.
#[derive(Debug, Clone)]
pub struct InstructionFileHandler {
    suffix: String,
}

impl Default for InstructionFileHandler {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_INSTRUCTION_FILE_SUFFIX.to_owned(),
        }
    }
}

impl InstructionFileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default key suffix.
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Key of the instruction object for `object_key`.
    pub fn instruction_key(&self, object_key: &str) -> String {
        format!("{object_key}{}", self.suffix)
    }
}

impl CryptoMaterialHandler for InstructionFileHandler {
    fn populate_request(&self, request: &mut PutObjectRequest, material: &ContentCryptoMaterial) {
        let body = serialize_map(&to_envelope_map(material));

        request.key = self.instruction_key(&request.key);
        request.metadata.clear();
        request.metadata.insert(
            INSTRUCTION_FILE_HEADER.to_owned(),
            INSTRUCTION_FILE_HEADER_VALUE.to_owned(),
        );
        request.body = body.into_bytes().into();

        debug!(key = %request.key, "instruction file request populated");
    }

    fn read_content_crypto_material(
        &self,
        result: &GetObjectResult,
    ) -> Result<ContentCryptoMaterial, EnvelopeError> {
        if result.metadata.get(INSTRUCTION_FILE_HEADER).map(String::as_str)
            != Some(INSTRUCTION_FILE_HEADER_VALUE)
        {
            warn!("instruction object lacks the instruction file marker");
        }

        let text = std::str::from_utf8(&result.body)
            .map_err(|e| EnvelopeError::MalformedInstructionFile(e.to_string()))?;

        deserialize_map(text)
            .and_then(|map| from_envelope_map(&map))
            .map_err(|e| {
                if e.is_unknown_algorithm() {
                    e
                } else {
                    EnvelopeError::MalformedInstructionFile(e.to_string())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CryptoBuffer;
    use common::{ContentCryptoScheme, KeyWrapAlgorithm};

    fn material() -> ContentCryptoMaterial {
        ContentCryptoMaterial::builder(ContentCryptoScheme::Gcm, KeyWrapAlgorithm::AesKeyWrap)
            .final_cek(CryptoBuffer::from([0x44u8; 40]))
            .iv(CryptoBuffer::from([0x01u8; 12]))
            .materials_description_entry("kms-key", "abc")
            .build()
            .unwrap()
    }

    fn as_result(request: PutObjectRequest) -> GetObjectResult {
        GetObjectResult {
            metadata: request.metadata,
            body: request.body,
        }
    }

    #[test]
    fn populate_then_read_round_trips() {
        let handler = InstructionFileHandler::new();
        let mut request = PutObjectRequest::new("object1", b"ciphertext".to_vec());
        request.metadata.insert("x-amz-key-v2".into(), "stale".into());

        handler.populate_request(&mut request, &material());

        assert_eq!(request.key, "object1.instruction");
        assert_eq!(request.metadata.len(), 1);
        assert_eq!(
            request.metadata["x-amz-crypto-instr-file"],
            "default instruction file header"
        );
        let body = std::str::from_utf8(&request.body).unwrap();
        assert!(body.starts_with('{'));
        assert!(body.contains(r#""x-amz-wrap-alg":"AESWrap""#));

        let read = handler.read_content_crypto_material(&as_result(request)).unwrap();
        assert_eq!(read, material());
    }

    #[test]
    fn custom_suffix() {
        let handler = InstructionFileHandler::with_suffix(".env");
        assert_eq!(handler.instruction_key("a/b"), "a/b.env");
    }

    #[test]
    fn garbage_body_is_malformed() {
        let handler = InstructionFileHandler::new();
        let result = GetObjectResult {
            body: bytes::Bytes::from_static(b"not json"),
            ..Default::default()
        };
        assert!(matches!(
            handler.read_content_crypto_material(&result),
            Err(EnvelopeError::MalformedInstructionFile(_))
        ));

        let result = GetObjectResult {
            body: bytes::Bytes::from_static(&[0xFF, 0xFE]),
            ..Default::default()
        };
        assert!(matches!(
            handler.read_content_crypto_material(&result),
            Err(EnvelopeError::MalformedInstructionFile(_))
        ));
    }

    #[test]
    fn missing_field_is_malformed() {
        let handler = InstructionFileHandler::new();
        let result = GetObjectResult {
            body: bytes::Bytes::from_static(br#"{"x-amz-cek-alg":"AES/GCM/NoPadding"}"#),
            ..Default::default()
        };
        assert!(matches!(
            handler.read_content_crypto_material(&result),
            Err(EnvelopeError::MalformedInstructionFile(_))
        ));
    }

    #[test]
    fn missing_materials_description_is_malformed() {
        let handler = InstructionFileHandler::new();
        let mut map = to_envelope_map(&material());
        map.remove("x-amz-matdesc");
        let result = GetObjectResult {
            body: serialize_map(&map).into_bytes().into(),
            ..Default::default()
        };
        assert!(matches!(
            handler.read_content_crypto_material(&result),
            Err(EnvelopeError::MalformedInstructionFile(_))
        ));
    }

    #[test]
    fn unknown_algorithm_stays_distinct() {
        let handler = InstructionFileHandler::new();
        let mut request = PutObjectRequest::new("object1", Vec::new());
        handler.populate_request(&mut request, &material());

        let text = std::str::from_utf8(&request.body)
            .unwrap()
            .replace("AES/GCM/NoPadding", "AES/OCB/NoPadding");
        let result = GetObjectResult {
            body: text.into_bytes().into(),
            ..as_result(request)
        };
        assert_eq!(
            handler.read_content_crypto_material(&result),
            Err(EnvelopeError::UnknownAlgorithm("AES/OCB/NoPadding".into()))
        );
    }
}
