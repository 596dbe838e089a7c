//! # Clamstream
//!
//! An async client for ClamAV's `clamd` daemon over TCP.
//!
//! ## Overview
//!
//! Clamstream speaks the three clamd commands an application needs to scan
//! untrusted content:
//!
//! - `PING` - liveness check
//! - `INSTREAM` - stream bytes or any `AsyncRead` in length-prefixed chunks
//! - `SCAN <path>` - let the daemon read a file from a shared filesystem
//!
//! Replies are classified into a [`ScanResult`]: passed, found (with the
//! signature name), or error. The daemon's `INSTREAM size limit exceeded.`
//! reply surfaces as its own error kind, whether it arrives mid-stream or
//! as the final answer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clamstream::{ClamdClient, ClamdConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClamdConfig::new("localhost", 3310)
//!         .with_read_timeout(Duration::from_secs(30))
//!         .with_max_stream_size(25 * 1024 * 1024);
//!     let client = ClamdClient::new(config)?;
//!
//!     let reply = client.scan_bytes(b"file content").await?;
//!     if ClamdClient::is_clean_reply(&reply) {
//!         println!("File is clean!");
//!     }
//!
//!     let result = client.scan_with_result(&b"more content"[..]).await;
//!     println!("{} {:?}", result.status(), result.signature());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: errors, reply classification, `ScanResult`, inputs
//! - **Protocol**: frame encoding, the size guard, the per-connection session
//! - **Client**: configuration and the public command surface
//! - **Audit**: structured scan events via `tracing`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod client;
pub mod core;
pub mod protocol;

// Re-export commonly used types at the crate root
pub use crate::client::{ClamdClient, ClamdConfig};
pub use crate::core::{is_clean_reply, ScanError, ScanInput, ScanResult, ScanStatus};
pub use crate::protocol::{InstreamOutcome, SessionState};

/// Prelude module for convenient imports.
///
/// ```rust
/// use clamstream::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{ClamdClient, ClamdConfig};
    pub use crate::core::{is_clean_reply, ScanError, ScanInput, ScanResult, ScanStatus};
}
