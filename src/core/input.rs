//! Scan input abstraction.
//!
//! [`ScanInput`] lets one entry point accept in-memory bytes, a reader the
//! caller keeps owning, or a path that the daemon opens itself.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;

/// Content to scan.
///
/// Bytes and readers are streamed with `INSTREAM`. Paths are sent with
/// `SCAN`, so the file must be readable by the daemon, not by this process.
///
/// # Examples
///
/// ```rust
/// use clamstream::core::ScanInput;
/// use std::path::Path;
///
/// let bytes = ScanInput::from(&b"hello"[..]);
/// assert!(bytes.is_bytes());
///
/// let path = ScanInput::from(Path::new("/srv/uploads/report.pdf"));
/// assert!(path.is_path());
/// ```
pub enum ScanInput<'a> {
    /// In-memory content.
    Bytes(&'a [u8]),

    /// A reader owned by the caller. It is read only as far as streamed
    /// and is never shut down by the client.
    Reader(&'a mut (dyn AsyncRead + Send + Unpin)),

    /// A file on a filesystem shared with the daemon.
    Path(&'a Path),
}

impl<'a> ScanInput<'a> {
    /// Creates an input from a caller-owned reader.
    pub fn from_reader(reader: &'a mut (dyn AsyncRead + Send + Unpin)) -> Self {
        Self::Reader(reader)
    }

    /// Returns `true` for in-memory input.
    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// Returns `true` for reader input.
    pub fn is_reader(&self) -> bool {
        matches!(self, Self::Reader(_))
    }

    /// Returns `true` for path input.
    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    /// Returns the size in bytes, when known without I/O.
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            Self::Bytes(data) => Some(data.len() as u64),
            _ => None,
        }
    }
}

impl fmt::Debug for ScanInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(data) => f
                .debug_struct("Bytes")
                .field("data_len", &data.len())
                .finish(),
            Self::Reader(_) => f.debug_struct("Reader").finish_non_exhaustive(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

impl<'a> From<&'a [u8]> for ScanInput<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::Bytes(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ScanInput<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::Bytes(data)
    }
}

impl<'a> From<&'a Vec<u8>> for ScanInput<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}

impl<'a> From<&'a Path> for ScanInput<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for ScanInput<'a> {
    fn from(path: &'a PathBuf) -> Self {
        Self::Path(path)
    }
}
