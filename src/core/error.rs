//! Error types for the clamstream library.
//!
//! Failures are split the way callers need to branch on them: transport
//! problems (connect, timeout, I/O), protocol aborts where the daemon
//! answered before the stream was terminated, and the daemon's own
//! stream size limit. A daemon that ran but reported `ERROR` is not an
//! error here; it is a [`ScanResult`](crate::core::ScanResult) state.

use std::time::Duration;
use thiserror::Error;

/// The main error type for clamd operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Could not open a TCP connection to the daemon.
    #[error("connection to clamd at {address} failed: {source}")]
    ConnectionFailed {
        /// `host:port` that was dialled.
        address: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// A single connect, read or write did not finish within the read timeout.
    #[error("clamd did not respond within {limit:?} while {operation}")]
    Timeout {
        /// What the session was doing when the timeout fired.
        operation: &'static str,
        /// The configured limit that elapsed.
        limit: Duration,
    },

    /// An I/O error occurred on the connection or while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon replied before the terminator frame was sent.
    #[error("scan aborted, reply from clamd: {reply}")]
    ProtocolAbort {
        /// Normalized reply text received mid-stream.
        reply: String,
    },

    /// The daemon rejected the stream because its own size limit was hit.
    #[error("clamd size limit exceeded, full reply from clamd: {reply}")]
    SizeLimitExceeded {
        /// Normalized reply text, starting with `INSTREAM size limit exceeded.`.
        reply: String,
    },

    /// A chunk could not be framed: empty, or larger than the chunk ceiling.
    #[error("chunk of {len} bytes cannot be framed (allowed 1..={max})")]
    InvalidChunk {
        /// Length of the rejected chunk.
        len: usize,
        /// Chunk ceiling.
        max: usize,
    },

    /// Client configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` for connectivity problems: refused, reset, timed out.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }

    /// Returns `true` if the daemon reported its stream size limit.
    ///
    /// Callers typically react by retrying with a smaller payload or a
    /// lower `max_stream_size`.
    pub fn is_size_limit(&self) -> bool {
        matches!(self, Self::SizeLimitExceeded { .. })
    }

    /// Returns `true` if the daemon answered early with anything else.
    pub fn is_protocol_abort(&self) -> bool {
        matches!(self, Self::ProtocolAbort { .. })
    }

    /// Returns `true` if repeating the same call may succeed.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_recoverable(&self) -> bool {
        self.is_transport()
    }

    /// Returns the daemon's reply text, if the error carries one.
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::ProtocolAbort { reply } | Self::SizeLimitExceeded { reply } => Some(reply),
            _ => None,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: &'static str, limit: Duration) -> Self {
        Self::Timeout { operation, limit }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for clamd operations.
pub type Result<T> = std::result::Result<T, ScanError>;
