//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No key material, IV, or plaintext** may appear in any span attribute or
//!   log field. Lengths and algorithm names only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`) and overridden
//!   by `RUST_LOG` when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
