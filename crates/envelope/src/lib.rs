//! Client-side envelope encryption for object storage.
//!
//! Payloads are encrypted locally under a fresh per-object content key. The
//! content key is wrapped by a [`keys::MasterKeyProvider`], and the wrapped
//! key plus algorithm names travel with the object as an envelope, either in
//! its metadata or in a companion instruction object.
//!
//! Layers, leaves first:
//!
//! - [`buffer`]: zero-on-drop byte buffers for keys and cipher output.
//! - [`crypto`]: AES-CBC, AES-CTR, AES-GCM and RFC 3394 key-wrap sessions,
//!   plus the process-wide crypto runtime.
//! - [`materials`]: the per-object envelope descriptor and its map codec.
//! - [`handlers`]: envelope placement in metadata or instruction objects.
//! - [`keys`], [`store`]: master key providers and object stores.
//! - [`client`]: [`client::EncryptionClient`], tying the above together.

pub mod aws;
pub mod buffer;
pub mod client;
pub mod config;
pub mod crypto;
pub mod handlers;
pub mod keys;
pub mod materials;
pub mod store;
pub mod telemetry;

pub use buffer::CryptoBuffer;
pub use client::{ClientError, EncryptionClient};
pub use common::{ContentCryptoScheme, EnvelopeError, KeyWrapAlgorithm};
pub use materials::ContentCryptoMaterial;
