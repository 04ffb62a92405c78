//! AWS SDK client initialisation for KMS and S3.
//!
//! Credentials and region come from the standard AWS provider chain. Only the
//! S3 endpoint can be overridden.

pub mod clients;

pub use clients::AwsClients;
