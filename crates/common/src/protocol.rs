//! Envelope header names, algorithm name registries, and the flat map codec.
//!
//! An envelope is a flat `string -> string` map. Binary values are standard
//! base64, integers are decimal, and algorithm names come from the closed sets
//! below. The same map is either written into an object's metadata or
//! serialized as JSON into the body of an instruction object.

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::EnvelopeError;

// ---------------------------------------------------------------------------
// Header names
// ---------------------------------------------------------------------------

/// Base64 of the wrapped content encryption key.
pub const CONTENT_KEY_HEADER: &str = "x-amz-key-v2";

/// Base64 of the content cipher IV.
pub const IV_HEADER: &str = "x-amz-iv";

/// Materials description, itself a serialized map.
pub const MATERIALS_DESCRIPTION_HEADER: &str = "x-amz-matdesc";

/// Name of the content encryption algorithm.
pub const CONTENT_CRYPTO_SCHEME_HEADER: &str = "x-amz-cek-alg";

/// Name of the key-wrap algorithm.
pub const KEY_WRAP_ALGORITHM_HEADER: &str = "x-amz-wrap-alg";

/// Authentication tag length in bits. Written for authenticated schemes only.
pub const CRYPTO_TAG_LENGTH_HEADER: &str = "x-amz-tag-len";

/// Metadata key marking an object as an instruction file.
pub const INSTRUCTION_FILE_HEADER: &str = "x-amz-crypto-instr-file";

/// Sentinel value stored under [`INSTRUCTION_FILE_HEADER`].
pub const INSTRUCTION_FILE_HEADER_VALUE: &str = "default instruction file header";

/// Suffix appended to an object key to name its instruction object.
pub const DEFAULT_INSTRUCTION_FILE_SUFFIX: &str = ".instruction";

// ---------------------------------------------------------------------------
// Content crypto scheme
// ---------------------------------------------------------------------------

/// Content encryption algorithm applied to the object payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCryptoScheme {
    /// AES-256-CBC with PKCS#7 padding. Not authenticated.
    Cbc,
    /// AES-256-CTR. Not authenticated; supports ranged decryption.
    Ctr,
    /// AES-256-GCM with a 128-bit tag.
    Gcm,
}

impl ContentCryptoScheme {
    /// Every scheme, in registry order.
    pub const ALL: [ContentCryptoScheme; 3] = [
        ContentCryptoScheme::Cbc,
        ContentCryptoScheme::Ctr,
        ContentCryptoScheme::Gcm,
    ];

    /// Wire name of the scheme.
    pub fn name(&self) -> &'static str {
        match self {
            ContentCryptoScheme::Cbc => "AES/CBC/PKCS5Padding",
            ContentCryptoScheme::Ctr => "AES/CTR/NoPadding",
            ContentCryptoScheme::Gcm => "AES/GCM/NoPadding",
        }
    }

    /// IV length in bytes expected by the scheme.
    pub fn iv_len(&self) -> usize {
        match self {
            ContentCryptoScheme::Cbc | ContentCryptoScheme::Ctr => 16,
            ContentCryptoScheme::Gcm => 12,
        }
    }

    /// Returns `true` if the scheme produces an authentication tag.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ContentCryptoScheme::Gcm)
    }
}

impl fmt::Display for ContentCryptoScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentCryptoScheme {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.name() == s)
            .ok_or_else(|| EnvelopeError::UnknownAlgorithm(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Key wrap algorithm
// ---------------------------------------------------------------------------

/// Algorithm used to wrap the content encryption key under the master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyWrapAlgorithm {
    /// Wrapped remotely by AWS KMS.
    Kms,
    /// RFC 3394 AES Key Wrap under a local 256-bit key.
    AesKeyWrap,
    /// AES-256-GCM under a local key; stored as `iv || ciphertext || tag`.
    AesGcm,
    /// RSA-OAEP with SHA-1 under an asymmetric key pair.
    RsaOaepSha1,
}

impl KeyWrapAlgorithm {
    /// Every algorithm, in registry order.
    pub const ALL: [KeyWrapAlgorithm; 4] = [
        KeyWrapAlgorithm::Kms,
        KeyWrapAlgorithm::AesKeyWrap,
        KeyWrapAlgorithm::AesGcm,
        KeyWrapAlgorithm::RsaOaepSha1,
    ];

    /// Wire name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            KeyWrapAlgorithm::Kms => "kms",
            KeyWrapAlgorithm::AesKeyWrap => "AESWrap",
            KeyWrapAlgorithm::AesGcm => "AES/GCM",
            KeyWrapAlgorithm::RsaOaepSha1 => "RSA-OAEP-SHA1",
        }
    }
}

impl fmt::Display for KeyWrapAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyWrapAlgorithm {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == s)
            .ok_or_else(|| EnvelopeError::UnknownAlgorithm(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Map codec
// ---------------------------------------------------------------------------

/// Serialize a string map into its canonical JSON object form.
///
/// Keys are emitted in lexicographic order, so equal maps always produce
/// identical strings.
pub fn serialize_map(map: &BTreeMap<String, String>) -> String {
    // A map of strings always serializes; the fallback is unreachable.
    serde_json::to_string(map).unwrap_or_else(|_| String::from("{}"))
}

/// Parse the output of [`serialize_map`] back into a map.
///
/// # Errors
///
/// Returns [`EnvelopeError::MalformedMap`] if `s` is not a JSON object whose
/// values are all strings.
pub fn deserialize_map(s: &str) -> Result<BTreeMap<String, String>, EnvelopeError> {
    serde_json::from_str(s.trim()).map_err(|e| EnvelopeError::MalformedMap(e.to_string()))
}
