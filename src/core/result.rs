//! Scan result structures.
//!
//! [`ScanResult`] is the terminal outcome of one scan attempt. It is a sum
//! type so that a signature can only exist on an infected result and a
//! failure can only exist on an attempt that did not complete.

use crate::core::error::ScanError;
use crate::core::reply::{self, ReplyKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse status of a scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// No threat was found.
    Passed,
    /// A signature matched.
    Found,
    /// The daemon reported an error, the reply was unrecognized, or the
    /// call did not complete.
    Error,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Found => write!(f, "found"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The outcome of a scan attempt.
///
/// Built once from either a raw daemon reply or a failure, never mutated.
#[derive(Debug)]
pub enum ScanResult {
    /// The daemon reported the content clean.
    Passed {
        /// Normalized reply text.
        reply: String,
    },

    /// The daemon matched a signature.
    Found {
        /// Normalized reply text.
        reply: String,
        /// Name of the matched signature.
        signature: String,
    },

    /// The daemon answered, but with an error or an unrecognized reply.
    Error {
        /// Normalized reply text, kept for diagnostics.
        reply: String,
    },

    /// The call could not complete.
    Failed(ScanError),
}

impl ScanResult {
    /// Classifies raw reply bytes.
    pub fn from_reply(raw: &[u8]) -> Self {
        let reply = reply::normalize(raw);
        match reply::classify(&reply) {
            ReplyKind::Passed => Self::Passed { reply },
            ReplyKind::Found { signature } => Self::Found { reply, signature },
            ReplyKind::DaemonError | ReplyKind::Unrecognized => Self::Error { reply },
        }
    }

    /// Wraps a failure.
    pub fn from_error(error: ScanError) -> Self {
        Self::Failed(error)
    }

    /// Returns the coarse status.
    pub fn status(&self) -> ScanStatus {
        match self {
            Self::Passed { .. } => ScanStatus::Passed,
            Self::Found { .. } => ScanStatus::Found,
            Self::Error { .. } | Self::Failed(_) => ScanStatus::Error,
        }
    }

    /// Returns `true` if the content was reported clean.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// Returns `true` if a signature matched.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Returns the signature name of an infected result.
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Found { signature, .. } => Some(signature),
            _ => None,
        }
    }

    /// Returns the normalized reply text, if the daemon answered.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Passed { reply } | Self::Found { reply, .. } | Self::Error { reply } => {
                Some(reply)
            }
            Self::Failed(_) => None,
        }
    }

    /// Returns the failure, if the call did not complete.
    pub fn failure(&self) -> Option<&ScanError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Converts back into the propagating form.
    pub fn into_result(self) -> Result<Self, ScanError> {
        match self {
            Self::Failed(error) => Err(error),
            other => Ok(other),
        }
    }
}

impl From<ScanError> for ScanResult {
    fn from(error: ScanError) -> Self {
        Self::from_error(error)
    }
}

impl From<Result<Vec<u8>, ScanError>> for ScanResult {
    fn from(outcome: Result<Vec<u8>, ScanError>) -> Self {
        match outcome {
            Ok(raw) => Self::from_reply(&raw),
            Err(error) => Self::from_error(error),
        }
    }
}
