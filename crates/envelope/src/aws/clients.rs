//! AWS SDK client bundle for KMS and S3.

use anyhow::Result;
use aws_config::BehaviorVersion;
use tracing::info;

/// Bundle of AWS SDK clients sharing one [`aws_config::SdkConfig`], so
/// credentials and region are resolved once and reused.
#[derive(Clone, Debug)]
pub struct AwsClients {
    /// KMS client used by [`crate::keys::KmsKeyProvider`].
    pub kms: aws_sdk_kms::Client,
    /// S3 client used by [`crate::store::S3ObjectStore`].
    pub s3: aws_sdk_s3::Client,
}

impl AwsClients {
    /// Initialise all AWS SDK clients from the standard provider chain.
    ///
    /// When `s3_endpoint_url` is set (for example a local S3-compatible
    /// server), the S3 client targets it with path-style addressing.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK config cannot be loaded.
    pub async fn init(s3_endpoint_url: Option<&str>) -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let kms = aws_sdk_kms::Client::new(&config);

        let mut s3_config = aws_sdk_s3::config::Builder::from(&config);
        if let Some(endpoint) = s3_endpoint_url {
            info!(endpoint = %endpoint, "using custom S3 endpoint");
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }
        let s3 = aws_sdk_s3::Client::from_conf(s3_config.build());

        Ok(Self { kms, s3 })
    }
}
