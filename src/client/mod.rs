//! The public clamd client.
//!
//! [`ClamdClient`] is an immutable configuration value. Each call opens its
//! own TCP connection and closes it before returning, so one client can be
//! shared freely across tasks. There is no pooling and no internal retry.

mod config;

pub use config::{ClamdConfig, DEFAULT_PORT, DEFAULT_READ_TIMEOUT};

use crate::audit::{self, ScanAuditEvent, ScanCommand};
use crate::core::{reply, ScanError, ScanInput, ScanResult};
use crate::protocol::frame::{self, PING_COMMAND, PONG_REPLY, VERSION_COMMAND};
use crate::protocol::session::{self, StreamSession};

use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncRead;
use tracing::{debug, trace};

/// Client for a single clamd daemon reachable over TCP.
///
/// # Example
///
/// ```rust,ignore
/// use clamstream::{ClamdClient, ClamdConfig, ScanStatus};
///
/// let client = ClamdClient::new(ClamdConfig::new("localhost", 3310))?;
///
/// if client.ping().await? {
///     let result = client.scan_with_result(&upload_bytes).await;
///     match result.status() {
///         ScanStatus::Passed => store(upload_bytes),
///         ScanStatus::Found => reject(result.signature()),
///         ScanStatus::Error => retry_later(result.failure()),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ClamdClient {
    config: ClamdConfig,
}

impl ClamdClient {
    /// Creates a client after validating the configuration.
    pub fn new(config: ClamdConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Creates a client for `host:port` with default timeouts.
    pub fn tcp(host: impl Into<String>, port: u16) -> Result<Self, ScanError> {
        Self::new(ClamdConfig::new(host, port))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClamdConfig {
        &self.config
    }

    /// Sets the client-side stream ceiling. `0` streams everything.
    ///
    /// When non-zero, at most the first `max_stream_size` bytes are sent,
    /// cut at a chunk boundary. This should usually match the daemon's
    /// `StreamMaxLength`.
    pub fn set_max_stream_size(&mut self, max_stream_size: u64) {
        self.config.max_stream_size = max_stream_size;
    }

    /// Interprets a raw reply loosely: `true` if it says `OK` and not `FOUND`.
    pub fn is_clean_reply(reply: &[u8]) -> bool {
        reply::is_clean_reply(reply)
    }

    /// Sends `PING` and checks for `PONG`.
    ///
    /// An unreachable daemon is an error, not `false`.
    pub async fn ping(&self) -> Result<bool, ScanError> {
        let mut session = StreamSession::connect(&self.config).await?;
        session.send_command(PING_COMMAND).await?;
        let reply = session.read_prefix(PONG_REPLY.len()).await?;

        let alive = reply == PONG_REPLY;
        trace!(address = %session.address(), alive, "ping");
        Ok(alive)
    }

    /// Returns the daemon's version string, e.g. `ClamAV 1.3.1/27400/...`.
    pub async fn version(&self) -> Result<String, ScanError> {
        let reply = session::run_command(&self.config, VERSION_COMMAND).await?;
        Ok(reply::normalize(&reply))
    }

    /// Streams `data` with INSTREAM and returns the raw reply.
    pub async fn scan_bytes(&self, data: &[u8]) -> Result<Vec<u8>, ScanError> {
        let mut source = data;
        self.scan_reader(&mut source).await
    }

    /// Streams everything `reader` yields and returns the raw reply.
    ///
    /// The reader stays with the caller and is not shut down. When the
    /// stream ceiling truncates the scan, the reader is left positioned
    /// just past the refused chunk.
    pub async fn scan_reader<R>(&self, reader: &mut R) -> Result<Vec<u8>, ScanError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let event = ScanAuditEvent::new(ScanCommand::Instream, self.config.address());
        audit::emit_scan_started(&event);
        let started = Instant::now();

        match session::run_instream(&self.config, reader).await {
            Ok(outcome) => {
                let result = ScanResult::from_reply(&outcome.reply);
                audit::emit_scan_finished(
                    &event
                        .with_transfer(outcome.bytes_sent, outcome.truncated)
                        .completed(&result, started.elapsed()),
                );
                Ok(outcome.reply)
            }
            Err(err) => {
                audit::emit_scan_finished(&event.failed(&err, started.elapsed()));
                Err(err)
            }
        }
    }

    /// Asks the daemon to scan a file itself with `SCAN <absolute path>`.
    ///
    /// The path is made absolute against this process's working directory.
    /// A file the daemon cannot read is reported in the reply, not as an
    /// error.
    pub async fn scan_path(&self, path: &Path) -> Result<Vec<u8>, ScanError> {
        let absolute = std::path::absolute(path)?;
        let event = ScanAuditEvent::new(ScanCommand::Scan, self.config.address());
        audit::emit_scan_started(&event);
        let started = Instant::now();
        debug!(path = %absolute.display(), "requesting daemon-side scan");

        match session::run_command(&self.config, &frame::scan_path_command(&absolute)).await {
            Ok(reply) => {
                let result = ScanResult::from_reply(&reply);
                audit::emit_scan_finished(&event.completed(&result, started.elapsed()));
                Ok(reply)
            }
            Err(err) => {
                audit::emit_scan_finished(&event.failed(&err, started.elapsed()));
                Err(err)
            }
        }
    }

    /// Scans any input and returns the raw reply.
    pub async fn scan(&self, input: ScanInput<'_>) -> Result<Vec<u8>, ScanError> {
        match input {
            ScanInput::Bytes(data) => self.scan_bytes(data).await,
            ScanInput::Reader(reader) => self.scan_reader(reader).await,
            ScanInput::Path(path) => self.scan_path(path).await,
        }
    }

    /// Scans any input and classifies the reply, capturing failures in the
    /// result instead of returning them.
    pub async fn scan_with_result<'a>(&self, input: impl Into<ScanInput<'a>>) -> ScanResult {
        ScanResult::from(self.scan(input.into()).await)
    }
}
