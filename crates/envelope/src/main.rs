//! `s3-envelope`: encrypt objects into S3 and decrypt them back out.
//!
//! Startup sequence, after argument parsing:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing, optional OTLP).
//! 3. Initialise the crypto runtime.
//! 4. Initialise AWS SDK clients.
//! 5. Build the master key provider and the encryption client.
//! 6. Run the command.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use s3_envelope::aws::AwsClients;
use s3_envelope::config::{Config, KeyProviderKind};
use s3_envelope::crypto::CryptoRuntime;
use s3_envelope::keys::{AnyKeyProvider, KmsKeyProvider, MasterKeyProvider, SymmetricKeyProvider};
use s3_envelope::store::{ObjectStore, S3ObjectStore};
use s3_envelope::{telemetry, EncryptionClient};

/// Client-side envelope encryption for S3 objects.
#[derive(Parser)]
#[command(name = "s3-envelope", version)]
#[command(about = "Client-side envelope encryption for S3 objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encrypt a local file and store it under KEY.
    Put {
        /// File to encrypt.
        file: PathBuf,

        /// Object key.
        key: String,

        /// Materials description entry, as KEY=VALUE. May be repeated.
        #[arg(long = "matdesc", value_parser = parse_key_value)]
        matdesc: Vec<(String, String)>,
    },

    /// Fetch and decrypt the object under KEY into a local file.
    Get {
        /// Object key.
        key: String,

        /// Destination file.
        file: PathBuf,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_owned(), v.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        bucket = %cfg.s3_bucket,
        "s3-envelope starting"
    );

    // -----------------------------------------------------------------------
    // 3. Crypto runtime
    // -----------------------------------------------------------------------
    let _crypto = CryptoRuntime::init().context("failed to initialise crypto runtime")?;

    // -----------------------------------------------------------------------
    // 4. AWS clients
    // -----------------------------------------------------------------------
    let aws = AwsClients::init(cfg.s3_endpoint()).await?;

    // -----------------------------------------------------------------------
    // 5. Key provider and client
    // -----------------------------------------------------------------------
    let provider = match cfg.key_provider()? {
        KeyProviderKind::Kms => {
            let key_id = cfg.kms_key_id.clone().context("KMS_KEY_ID is required")?;
            AnyKeyProvider::Kms(KmsKeyProvider::new(aws.kms.clone(), key_id))
        }
        KeyProviderKind::Local => AnyKeyProvider::Local(
            SymmetricKeyProvider::new(cfg.master_key()?.into(), cfg.local_wrap_algorithm()?)
                .context("failed to build local key provider")?,
        ),
    };

    let store = S3ObjectStore::new(aws.s3.clone(), cfg.s3_bucket.clone());
    let client = EncryptionClient::new(store, provider)
        .with_content_crypto_scheme(cfg.content_crypto_scheme()?)
        .with_envelope_storage(cfg.envelope_storage);

    // -----------------------------------------------------------------------
    // 6. Command
    // -----------------------------------------------------------------------
    let result = run(&client, cli.command).await;
    telemetry::shutdown_telemetry();
    result
}

async fn run<S, P>(client: &EncryptionClient<S, P>, command: Command) -> Result<()>
where
    S: ObjectStore,
    P: MasterKeyProvider,
{
    match command {
        Command::Put { file, key, matdesc } => {
            let plaintext = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let description: BTreeMap<String, String> = matdesc.into_iter().collect();

            client
                .put_object(&key, &plaintext, &description)
                .await
                .with_context(|| format!("failed to store encrypted object {key}"))?;
            println!("Stored {key} ({} bytes)", plaintext.len());
        }

        Command::Get { key, file } => {
            let plaintext = client
                .get_object(&key)
                .await
                .with_context(|| format!("failed to read encrypted object {key}"))?;

            tokio::fs::write(&file, plaintext.as_slice())
                .await
                .with_context(|| format!("failed to write {}", file.display()))?;
            println!("Wrote {} ({} bytes)", file.display(), plaintext.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_parsing() {
        assert_eq!(
            parse_key_value("kms-key=abc").unwrap(),
            ("kms-key".to_owned(), "abc".to_owned())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_owned(), "a=b".to_owned())
        );
        assert_eq!(parse_key_value("empty=").unwrap().1, "");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn cli_parses_put_and_get() {
        let cli = Cli::try_parse_from([
            "s3-envelope",
            "put",
            "in.bin",
            "object1",
            "--matdesc",
            "kms-key=abc",
            "--matdesc",
            "team=data",
        ])
        .unwrap();
        match cli.command {
            Command::Put { file, key, matdesc } => {
                assert_eq!(file, PathBuf::from("in.bin"));
                assert_eq!(key, "object1");
                assert_eq!(matdesc.len(), 2);
            }
            Command::Get { .. } => panic!("expected put"),
        }

        let cli = Cli::try_parse_from(["s3-envelope", "get", "object1", "out.bin"]).unwrap();
        assert!(matches!(cli.command, Command::Get { .. }));
    }
}
