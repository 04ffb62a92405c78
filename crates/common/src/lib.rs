//! Envelope metadata protocol shared by every reader and writer of `s3-envelope` objects.
//!
//! Header names, the closed sets of algorithm names, and the flat map codec live
//! here so that a writer and a reader built from different crates agree on the
//! wire format byte for byte.

pub mod error;
pub mod protocol;

pub use error::EnvelopeError;
pub use protocol::{ContentCryptoScheme, KeyWrapAlgorithm};
