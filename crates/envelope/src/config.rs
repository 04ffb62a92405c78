//! Configuration loading and validation for the `s3-envelope` binary.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use common::{ContentCryptoScheme, KeyWrapAlgorithm};
use serde::Deserialize;

use crate::crypto::KEY_LEN;
use crate::handlers::EnvelopeStorage;

/// Which master key provider wraps content keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProviderKind {
    /// AWS KMS, keyed by `KMS_KEY_ID`.
    Kms,
    /// Local 256-bit key from `MASTER_KEY_B64`.
    Local,
}

/// Validated configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bucket holding encrypted objects. **Required.**
    pub s3_bucket: String,

    /// Override for the S3 endpoint, e.g. a local S3-compatible server.
    #[serde(default)]
    pub s3_endpoint_url: Option<String>,

    /// `kms` or `local`.
    #[serde(default = "default_key_provider")]
    pub key_provider: String,

    /// KMS key id or ARN. **Required** when `KEY_PROVIDER=kms`.
    #[serde(default)]
    pub kms_key_id: Option<String>,

    /// Base64 of a 32-byte master key. **Required** when `KEY_PROVIDER=local`.
    #[serde(default)]
    pub master_key_b64: Option<String>,

    /// Wrap algorithm for the local provider: `AESWrap` or `AES/GCM`.
    #[serde(default = "default_local_wrap_algorithm")]
    pub local_wrap_algorithm: String,

    /// Content encryption scheme for new objects.
    #[serde(default = "default_content_crypto_scheme")]
    pub content_crypto_scheme: String,

    /// `object_metadata` or `instruction_file`.
    #[serde(default)]
    pub envelope_storage: EnvelopeStorage,

    /// OTLP endpoint. Spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_key_provider() -> String {
    "kms".into()
}
fn default_local_wrap_algorithm() -> String {
    KeyWrapAlgorithm::AesKeyWrap.name().into()
}
fn default_content_crypto_scheme() -> String {
    ContentCryptoScheme::Gcm.name().into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::load(config::Config::builder().add_source(config::Environment::default()))
    }

    fn load(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let cfg = builder
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.s3_bucket, "S3_BUCKET")?;
        self.content_crypto_scheme()?;

        match self.key_provider()? {
            KeyProviderKind::Kms => {
                ensure_non_empty(self.kms_key_id.as_deref().unwrap_or(""), "KMS_KEY_ID")?;
            }
            KeyProviderKind::Local => {
                self.local_wrap_algorithm()?;
                self.master_key()?;
            }
        }
        Ok(())
    }

    pub fn key_provider(&self) -> Result<KeyProviderKind> {
        match self.key_provider.trim() {
            "kms" => Ok(KeyProviderKind::Kms),
            "local" => Ok(KeyProviderKind::Local),
            other => anyhow::bail!("KEY_PROVIDER must be kms or local, got {other:?}"),
        }
    }

    pub fn content_crypto_scheme(&self) -> Result<ContentCryptoScheme> {
        self.content_crypto_scheme
            .trim()
            .parse()
            .context("CONTENT_CRYPTO_SCHEME is not a supported scheme")
    }

    pub fn local_wrap_algorithm(&self) -> Result<KeyWrapAlgorithm> {
        let algorithm: KeyWrapAlgorithm = self
            .local_wrap_algorithm
            .trim()
            .parse()
            .context("LOCAL_WRAP_ALGORITHM is not a supported algorithm")?;
        if !matches!(algorithm, KeyWrapAlgorithm::AesKeyWrap | KeyWrapAlgorithm::AesGcm) {
            anyhow::bail!("LOCAL_WRAP_ALGORITHM must be AESWrap or AES/GCM, got {algorithm}");
        }
        Ok(algorithm)
    }

    /// Decoded `MASTER_KEY_B64`.
    pub fn master_key(&self) -> Result<Vec<u8>> {
        let encoded = self.master_key_b64.as_deref().unwrap_or("");
        ensure_non_empty(encoded, "MASTER_KEY_B64")?;
        let key = STANDARD
            .decode(encoded.trim())
            .context("MASTER_KEY_B64 is not valid base64")?;
        if key.len() != KEY_LEN {
            anyhow::bail!("MASTER_KEY_B64 must decode to {KEY_LEN} bytes, got {}", key.len());
        }
        Ok(key)
    }

    /// OTLP endpoint, treating an empty value as unset.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// S3 endpoint override, treating an empty value as unset.
    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
