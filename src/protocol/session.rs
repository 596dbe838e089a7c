//! A single clamd connection driven through the INSTREAM state machine.
//!
//! ```text
//! Connecting -> Handshaking -> Streaming -> Terminating -> AwaitingReply -> Done
//!                                  |
//!                                  +-> Aborted   (daemon replied mid-stream)
//!
//! any state -> Failed (I/O error, timeout, size limit)
//! ```
//!
//! The session owns its `TcpStream`; dropping the session closes the socket
//! on every exit path. The caller's source reader is only borrowed.

use crate::client::ClamdConfig;
use crate::core::reply::{self, assert_size_limit};
use crate::core::ScanError;
use crate::protocol::frame::{self, CHUNK_SIZE, FRAME_HEADER_LEN, INSTREAM_COMMAND, TERMINATOR};
use crate::protocol::guard::SizeGuard;

use std::fmt;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Where a session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// TCP connection being opened.
    Connecting,
    /// Command marker being sent.
    Handshaking,
    /// Chunks being framed and written.
    Streaming,
    /// Zero-length frame being written.
    Terminating,
    /// Reading the reply until the daemon closes.
    AwaitingReply,
    /// Reply collected.
    Done,
    /// Daemon replied before the stream was terminated.
    Aborted,
    /// An error ended the session.
    Failed,
}

impl SessionState {
    /// Returns `true` for `Done`, `Aborted` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Terminating => "terminating",
            Self::AwaitingReply => "awaiting_reply",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a completed INSTREAM exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstreamOutcome {
    /// Raw reply bytes, as received.
    pub reply: Vec<u8>,
    /// Payload bytes actually framed and sent.
    pub bytes_sent: u64,
    /// Whether the size guard cut the stream short.
    pub truncated: bool,
}

/// How long a failed write waits for a reply that explains it.
const SALVAGE_WAIT: Duration = Duration::from_millis(50);

/// Runs one I/O step under the optional per-operation timeout.
async fn bounded<T, F>(
    limit: Option<Duration>,
    operation: &'static str,
    io: F,
) -> Result<T, ScanError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, io).await {
            Ok(result) => result.map_err(ScanError::from),
            Err(_) => Err(ScanError::timeout(operation, limit)),
        },
        None => io.await.map_err(ScanError::from),
    }
}

/// One connection to clamd.
#[derive(Debug)]
pub struct StreamSession {
    stream: TcpStream,
    timeout: Option<Duration>,
    state: SessionState,
    address: String,
}

impl StreamSession {
    /// Opens a connection to the configured daemon.
    pub async fn connect(config: &ClamdConfig) -> Result<Self, ScanError> {
        let address = config.address();
        let timeout = config.timeout();
        trace!(%address, state = %SessionState::Connecting, "opening clamd connection");

        let connect = TcpStream::connect((config.host.as_str(), config.port));
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| ScanError::timeout("connecting", limit))?,
            None => connect.await,
        }
        .map_err(|e| ScanError::connection_failed(address.clone(), e))?;

        Ok(Self {
            stream,
            timeout,
            state: SessionState::Connecting,
            address,
        })
    }

    /// Current protocol state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Address of the daemon this session talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Writes a command marker such as `zINSTREAM\0` and flushes.
    pub async fn send_command(&mut self, command: &[u8]) -> Result<(), ScanError> {
        self.transition(SessionState::Handshaking);
        let result = self.write_all(command, "sending command").await;
        self.settle(result)
    }

    /// Streams `source` as INSTREAM frames until end of input or until the
    /// guard refuses a chunk.
    ///
    /// After every frame the socket is checked, without blocking, for reply
    /// bytes. A reply at this point aborts the stream.
    pub async fn stream_from<R>(
        &mut self,
        source: &mut R,
        guard: &mut SizeGuard,
    ) -> Result<(), ScanError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.transition(SessionState::Streaming);
        let result = self.pump(source, guard).await;
        self.settle(result)
    }

    /// Writes the zero-length terminator frame and flushes.
    pub async fn terminate(&mut self) -> Result<(), ScanError> {
        self.transition(SessionState::Terminating);
        let result = match self.write_all(&TERMINATOR, "terminating stream").await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.salvage(err).await),
        };
        self.settle(result)
    }

    /// Reads until the daemon closes its side, then checks for the
    /// size-limit reply.
    pub async fn read_reply(&mut self) -> Result<Vec<u8>, ScanError> {
        self.transition(SessionState::AwaitingReply);
        let mut reply = Vec::new();
        let result = match self.read_to_close(&mut reply).await {
            Ok(()) => assert_size_limit(reply),
            // clamd may reset once its reply is out; a size-limit reply still wins
            Err(err) if !reply.is_empty() => {
                debug!(error = %err, "connection ended while reading reply");
                assert_size_limit(reply).and(Err(err))
            }
            Err(err) => Err(err),
        };
        self.settle(result)
    }

    /// Reads at most `len` bytes, stopping early at end of stream.
    pub async fn read_prefix(&mut self, len: usize) -> Result<Vec<u8>, ScanError> {
        self.transition(SessionState::AwaitingReply);
        let result = self.fill(len).await;
        self.settle(result)
    }

    async fn pump<R>(&mut self, source: &mut R, guard: &mut SizeGuard) -> Result<(), ScanError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + CHUNK_SIZE);

        loop {
            let read = frame::read_chunk(source, &mut chunk).await?;
            if read == 0 {
                break;
            }
            if !guard.admit(read) {
                debug!(
                    ceiling = guard.ceiling(),
                    bytes_sent = guard.sent(),
                    "stream ceiling reached, terminating early"
                );
                break;
            }

            frame::encode_chunk(&chunk[..read], &mut frame)?;
            if let Err(err) = self.write_all(&frame, "streaming chunk").await {
                return Err(self.salvage(err).await);
            }

            if let Some(reply) = self.poll_early_reply().await? {
                return Err(self.abort(reply));
            }
        }

        trace!(bytes_sent = guard.sent(), "source exhausted");
        Ok(())
    }

    /// Non-blocking check for reply bytes that arrived while streaming.
    ///
    /// Returns the whole early reply, read until the daemon closes.
    async fn poll_early_reply(&mut self) -> Result<Option<Vec<u8>>, ScanError> {
        let mut probe = [0u8; CHUNK_SIZE];
        match self.stream.try_read(&mut probe) {
            // closed without a word
            Ok(0) => Ok(Some(Vec::new())),
            Ok(read) => {
                let mut reply = probe[..read].to_vec();
                if let Err(err) = self.read_to_close(&mut reply).await {
                    // clamd may reset right after replying; keep what arrived
                    debug!(error = %err, "connection ended while draining early reply");
                }
                Ok(Some(reply))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// A write failed. If the daemon had already replied, that
    /// reply explains the failure better than the broken pipe does.
    async fn salvage(&mut self, err: ScanError) -> ScanError {
        // the reset may have been seen by the write before the reactor saw the reply
        let _ = tokio::time::timeout(SALVAGE_WAIT, self.stream.readable()).await;
        match self.poll_early_reply().await {
            Ok(Some(reply)) if !reply.is_empty() => self.abort(reply),
            _ => err,
        }
    }

    fn abort(&mut self, reply: Vec<u8>) -> ScanError {
        self.transition(SessionState::Aborted);
        let error = match assert_size_limit(reply) {
            Err(size_limit) => size_limit,
            Ok(reply) => ScanError::ProtocolAbort {
                reply: reply::normalize(&reply),
            },
        };
        warn!(
            address = %self.address,
            error = %error,
            "clamd replied before the stream was terminated"
        );
        error
    }

    async fn write_all(&mut self, bytes: &[u8], operation: &'static str) -> Result<(), ScanError> {
        let stream = &mut self.stream;
        bounded(self.timeout, operation, async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await
    }

    async fn read_to_close(&mut self, buf: &mut Vec<u8>) -> Result<(), ScanError> {
        let mut scratch = [0u8; CHUNK_SIZE];
        loop {
            let read =
                bounded(self.timeout, "reading reply", self.stream.read(&mut scratch)).await?;
            if read == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&scratch[..read]);
        }
    }

    async fn fill(&mut self, len: usize) -> Result<Vec<u8>, ScanError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let read = bounded(
                self.timeout,
                "reading reply",
                self.stream.read(&mut buf[filled..]),
            )
            .await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn transition(&mut self, next: SessionState) {
        trace!(address = %self.address, from = %self.state, to = %next, "session state change");
        self.state = next;
    }

    /// Moves to `Done` or `Failed` once a step has finished, unless the
    /// step already ended the session.
    fn settle<T>(&mut self, result: Result<T, ScanError>) -> Result<T, ScanError> {
        match &result {
            Ok(_) if self.state == SessionState::AwaitingReply => {
                self.transition(SessionState::Done)
            }
            Err(_) if !self.state.is_terminal() => self.transition(SessionState::Failed),
            _ => {}
        }
        result
    }
}

/// Runs a complete INSTREAM scan of `source` on a fresh connection.
pub async fn run_instream<R>(
    config: &ClamdConfig,
    source: &mut R,
) -> Result<InstreamOutcome, ScanError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut guard = SizeGuard::new(config.max_stream_size);
    let mut session = StreamSession::connect(config).await?;

    session.send_command(INSTREAM_COMMAND).await?;
    session.stream_from(source, &mut guard).await?;
    session.terminate().await?;
    let reply = session.read_reply().await?;

    debug!(
        address = %session.address(),
        bytes_sent = guard.sent(),
        truncated = guard.is_truncated(),
        "instream exchange complete"
    );

    Ok(InstreamOutcome {
        reply,
        bytes_sent: guard.sent(),
        truncated: guard.is_truncated(),
    })
}

/// Sends a single command and reads the full reply.
pub async fn run_command(config: &ClamdConfig, command: &[u8]) -> Result<Vec<u8>, ScanError> {
    let mut session = StreamSession::connect(config).await?;
    session.send_command(command).await?;
    session.read_reply().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, ClamdConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config =
            ClamdConfig::new("127.0.0.1", port).with_read_timeout(Duration::from_secs(5));
        (listener, config)
    }

    #[tokio::test]
    async fn test_session_walks_through_states() {
        let (listener, config) = listener().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // command, one 2-byte frame, terminator
            let mut received = vec![0u8; INSTREAM_COMMAND.len() + 6 + 4];
            socket.read_exact(&mut received).await.unwrap();
            socket.write_all(b"stream: OK\0").await.unwrap();
            received
        });

        let mut session = StreamSession::connect(&config).await.unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        session.send_command(INSTREAM_COMMAND).await.unwrap();
        assert_eq!(session.state(), SessionState::Handshaking);

        let mut guard = SizeGuard::unlimited();
        let mut source: &[u8] = b"hi";
        session.stream_from(&mut source, &mut guard).await.unwrap();
        assert_eq!(session.state(), SessionState::Streaming);

        session.terminate().await.unwrap();
        assert_eq!(session.state(), SessionState::Terminating);

        let reply = session.read_reply().await.unwrap();
        assert_eq!(reply, b"stream: OK\0");
        assert_eq!(session.state(), SessionState::Done);

        let received = server.await.unwrap();
        assert_eq!(received, b"zINSTREAM\0\0\0\0\x02hi\0\0\0\0");
    }

    #[tokio::test]
    async fn test_read_timeout_fails_session() {
        let (listener, config) = listener().await;
        let config = config.with_read_timeout(Duration::from_millis(50));
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut session = StreamSession::connect(&config).await.unwrap();
        session.send_command(b"zVERSION\0").await.unwrap();
        let err = session.read_reply().await.unwrap_err();

        assert!(matches!(err, ScanError::Timeout { operation: "reading reply", .. }));
        assert_eq!(session.state(), SessionState::Failed);
        server.abort();
    }

    #[tokio::test]
    async fn test_read_prefix_stops_at_eof() {
        let (listener, config) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"PO").await.unwrap();
        });

        let mut session = StreamSession::connect(&config).await.unwrap();
        let reply = session.read_prefix(4).await.unwrap();
        assert_eq!(reply, b"PO");
        assert_eq!(session.state(), SessionState::Done);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, config) = listener().await;
        drop(listener);

        let err = StreamSession::connect(&config).await.unwrap_err();
        assert!(matches!(err, ScanError::ConnectionFailed { .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Done.is_terminal());
        assert!(SessionState::Aborted.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert_eq!(SessionState::AwaitingReply.to_string(), "awaiting_reply");
    }
}
