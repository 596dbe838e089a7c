//! INSTREAM wire framing.
//!
//! ```text
//! +----------------------+---------------------+
//! | length (u32, BE)     | chunk (length bytes)|
//! +----------------------+---------------------+
//!        4 bytes              1..=2048 bytes
//! ```
//!
//! A frame with length zero and no body terminates the stream.

use crate::core::ScanError;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest chunk sent in a single frame.
///
/// Must stay below clamd's `StreamMaxLength`, otherwise the daemon replies
/// with a size-limit error and closes the connection.
pub const CHUNK_SIZE: usize = 2048;

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Zero-length frame that ends a stream.
pub const TERMINATOR: [u8; FRAME_HEADER_LEN] = [0; FRAME_HEADER_LEN];

/// Starts a streaming scan.
pub const INSTREAM_COMMAND: &[u8] = b"zINSTREAM\0";

/// Liveness check.
pub const PING_COMMAND: &[u8] = b"zPING\0";

/// Expected answer to [`PING_COMMAND`].
pub const PONG_REPLY: &[u8] = b"PONG";

/// Daemon and database version query.
pub const VERSION_COMMAND: &[u8] = b"zVERSION\0";

/// Builds the `SCAN` command for a path the daemon will open itself.
///
/// The path is sent as raw bytes, newline terminated.
pub fn scan_path_command(path: &std::path::Path) -> Vec<u8> {
    let encoded = path.as_os_str().as_encoded_bytes();
    let mut command = Vec::with_capacity(5 + encoded.len() + 1);
    command.extend_from_slice(b"SCAN ");
    command.extend_from_slice(encoded);
    command.push(b'\n');
    command
}

/// Encodes one chunk as `<length><chunk>` into `out`, replacing its contents.
///
/// Empty chunks would read as a terminator and are rejected, as are chunks
/// over [`CHUNK_SIZE`].
pub fn encode_chunk(chunk: &[u8], out: &mut Vec<u8>) -> Result<(), ScanError> {
    if chunk.is_empty() || chunk.len() > CHUNK_SIZE {
        return Err(ScanError::InvalidChunk {
            len: chunk.len(),
            max: CHUNK_SIZE,
        });
    }

    // CHUNK_SIZE fits in u32
    let len = chunk.len() as u32;
    out.clear();
    out.reserve(FRAME_HEADER_LEN + chunk.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(chunk);
    Ok(())
}

/// Reads the next chunk of at most [`CHUNK_SIZE`] bytes from `source`.
///
/// Returns `0` at end of input. A short read is not end of input.
pub async fn read_chunk<R>(source: &mut R, buf: &mut [u8; CHUNK_SIZE]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    source.read(buf).await
}
