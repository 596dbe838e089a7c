//! Reply decoding and classification.
//!
//! clamd answers every command with a short ASCII line, usually NUL
//! terminated when the command was sent with the `z` prefix:
//!
//! ```text
//! stream: OK
//! stream: Eicar-Test-Signature FOUND
//! /tmp/missing: File path check failure: No such file or directory. ERROR
//! INSTREAM size limit exceeded. ERROR
//! ```
//!
//! # Limitations
//!
//! The signature of a `FOUND` reply is the text between the last `':'`
//! and the trailing ` FOUND`. A signature name containing a colon would
//! be cut at that colon. clamd signature names do not contain colons, and
//! this parser relies on that.

use crate::core::error::ScanError;

/// Suffix of a clean reply.
pub const OK_SUFFIX: &str = ": OK";

/// Suffix of an infected reply.
pub const FOUND_SUFFIX: &str = "FOUND";

/// Suffix of a daemon-reported error.
pub const ERROR_SUFFIX: &str = "ERROR";

/// Prefix clamd uses when a stream exceeds its `StreamMaxLength`.
pub const SIZE_LIMIT_PREFIX: &str = "INSTREAM size limit exceeded.";

/// Classification of a normalized reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// `<label>: OK`
    Passed,
    /// `<label>: <signature> FOUND`
    Found {
        /// Extracted signature name.
        signature: String,
    },
    /// `... ERROR` reported by the daemon.
    DaemonError,
    /// Anything else.
    Unrecognized,
}

/// Decodes reply bytes as ASCII, strips NUL bytes and surrounding whitespace.
///
/// Non-ASCII bytes become U+FFFD.
pub fn normalize(raw: &[u8]) -> String {
    let text: String = raw
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| {
            if b.is_ascii() {
                b as char
            } else {
                char::REPLACEMENT_CHARACTER
            }
        })
        .collect();
    text.trim().to_string()
}

/// Classifies an already normalized reply. First match wins.
pub fn classify(normalized: &str) -> ReplyKind {
    if normalized.ends_with(OK_SUFFIX) {
        ReplyKind::Passed
    } else if let Some(body) = normalized.strip_suffix(FOUND_SUFFIX) {
        match extract_signature(body) {
            Some(signature) => ReplyKind::Found { signature },
            None => ReplyKind::Unrecognized,
        }
    } else if normalized.ends_with(ERROR_SUFFIX) {
        ReplyKind::DaemonError
    } else {
        ReplyKind::Unrecognized
    }
}

fn extract_signature(body: &str) -> Option<String> {
    let after_label = match body.rsplit_once(':') {
        Some((_, rest)) => rest,
        None => body,
    };
    let signature = after_label.trim();
    (!signature.is_empty()).then(|| signature.to_string())
}

/// Loose clean-vs-not check: the reply mentions `OK` and never `FOUND`.
///
/// This does not look at the reply structure; use
/// [`ScanResult`](crate::core::ScanResult) for a full classification.
pub fn is_clean_reply(raw: &[u8]) -> bool {
    let text = normalize(raw);
    text.contains("OK") && !text.contains(FOUND_SUFFIX)
}

/// Returns `true` if the reply starts with the daemon's size-limit message.
pub fn is_size_limit_reply(raw: &[u8]) -> bool {
    normalize(raw).starts_with(SIZE_LIMIT_PREFIX)
}

/// Fails with [`ScanError::SizeLimitExceeded`] if `raw` is the size-limit
/// message, otherwise hands the reply back untouched.
pub fn assert_size_limit(raw: Vec<u8>) -> Result<Vec<u8>, ScanError> {
    let text = normalize(&raw);
    if text.starts_with(SIZE_LIMIT_PREFIX) {
        return Err(ScanError::SizeLimitExceeded { reply: text });
    }
    Ok(raw)
}
