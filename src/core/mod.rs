//! Core types for the clamstream library.
//!
//! - [`error`] - Structured error types
//! - [`reply`] - Reply normalization and classification
//! - [`result`] - The `ScanResult` sum type
//! - [`input`] - Scan input abstraction

pub mod error;
pub mod input;
pub mod reply;
pub mod result;

pub use error::{Result, ScanError};
pub use input::ScanInput;
pub use reply::{is_clean_reply, ReplyKind};
pub use result::{ScanResult, ScanStatus};
