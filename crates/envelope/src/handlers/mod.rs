//! Placement of envelope metadata relative to the encrypted object.
//!
//! Two placements exist:
//!
//! - [`MetadataHandler`]: the envelope map becomes the object's own metadata.
//! - [`InstructionFileHandler`]: the envelope map is serialized into the body
//!   of a companion object named `<key>.instruction`.

pub mod instruction_file;
pub mod metadata;

use std::{fmt, str::FromStr};

use common::EnvelopeError;
use serde::Deserialize;

use crate::materials::ContentCryptoMaterial;
use crate::store::{GetObjectResult, PutObjectRequest};

pub use instruction_file::InstructionFileHandler;
pub use metadata::MetadataHandler;

/// Writes material into a put request and reads it back from a get result.
pub trait CryptoMaterialHandler {
    /// Rewrite `request` so that it carries `material`.
    fn populate_request(&self, request: &mut PutObjectRequest, material: &ContentCryptoMaterial);

    /// Rebuild the material carried by `result`.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] if the envelope is absent or malformed.
    fn read_content_crypto_material(
        &self,
        result: &GetObjectResult,
    ) -> Result<ContentCryptoMaterial, EnvelopeError>;
}

/// Where a writer places the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStorage {
    /// In the encrypted object's metadata.
    #[default]
    ObjectMetadata,
    /// In a separate instruction object.
    InstructionFile,
}

impl fmt::Display for EnvelopeStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvelopeStorage::ObjectMetadata => "object_metadata",
            EnvelopeStorage::InstructionFile => "instruction_file",
        })
    }
}

impl FromStr for EnvelopeStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object_metadata" => Ok(EnvelopeStorage::ObjectMetadata),
            "instruction_file" => Ok(EnvelopeStorage::InstructionFile),
            other => Err(format!(
                "unknown envelope storage {other:?}; expected object_metadata or instruction_file"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_names_round_trip() {
        for storage in [EnvelopeStorage::ObjectMetadata, EnvelopeStorage::InstructionFile] {
            assert_eq!(storage.to_string().parse::<EnvelopeStorage>().unwrap(), storage);
        }
        assert!("s3".parse::<EnvelopeStorage>().is_err());
    }
}
