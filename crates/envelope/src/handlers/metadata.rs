//! [`MetadataHandler`]: envelope stored in the encrypted object's own metadata.

use common::protocol::CONTENT_KEY_HEADER;
use common::EnvelopeError;

use super::CryptoMaterialHandler;
use crate::materials::{from_envelope_map, to_envelope_map, ContentCryptoMaterial};
use crate::store::{GetObjectResult, PutObjectRequest};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataHandler;

impl MetadataHandler {
    /// Returns `true` if `result` carries an envelope in its metadata.
    ///
    /// Readers use this to choose between this handler and the instruction file.
    pub fn has_envelope(result: &GetObjectResult) -> bool {
        result.metadata.contains_key(CONTENT_KEY_HEADER)
    }
}

impl CryptoMaterialHandler for MetadataHandler {
    fn populate_request(&self, request: &mut PutObjectRequest, material: &ContentCryptoMaterial) {
        request.metadata.extend(to_envelope_map(material));
    }

    fn read_content_crypto_material(
        &self,
        result: &GetObjectResult,
    ) -> Result<ContentCryptoMaterial, EnvelopeError> {
        from_envelope_map(&result.metadata)
    }
}
