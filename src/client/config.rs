//! Connection parameters for a clamd daemon.

use crate::core::ScanError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default clamd TCP port.
pub const DEFAULT_PORT: u16 = 3310;

/// Default per-operation read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// clamd connection configuration.
///
/// Durations serialize as milliseconds.
///
/// # Example
///
/// ```rust
/// use clamstream::ClamdConfig;
/// use std::time::Duration;
///
/// let config = ClamdConfig::new("clamav.internal", 3310)
///     .with_read_timeout(Duration::from_secs(30))
///     .with_max_stream_size(25 * 1024 * 1024);
///
/// assert_eq!(config.address(), "clamav.internal:3310");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClamdConfig {
    /// Hostname or IP address of the daemon.
    pub host: String,

    /// TCP port clamd listens on (`TCPSocket` in clamd.conf).
    pub port: u16,

    /// Limit for each connect, read and write. `Duration::ZERO` waits forever.
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,

    /// Client-side cap on streamed bytes. `0` streams everything.
    ///
    /// Usually set to the daemon's `StreamMaxLength`.
    pub max_stream_size: u64,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_stream_size: 0,
        }
    }
}

impl ClamdConfig {
    /// Creates a configuration for the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the read timeout. `Duration::ZERO` disables it.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the client-side stream ceiling. `0` disables it.
    pub fn with_max_stream_size(mut self, size: u64) -> Self {
        self.max_stream_size = size;
        self
    }

    /// Returns the timeout to apply, or `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        (!self.read_timeout.is_zero()).then_some(self.read_timeout)
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks that the configuration can be used to dial the daemon.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.host.trim().is_empty() {
            return Err(ScanError::configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(ScanError::configuration("port must not be 0"));
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
