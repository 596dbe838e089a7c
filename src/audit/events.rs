//! Audit event types and emission functions.

use crate::core::{ScanError, ScanResult, ScanStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which clamd command produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanCommand {
    /// Streamed content (`zINSTREAM`).
    Instream,
    /// Daemon-side file read (`SCAN <path>`).
    Scan,
}

impl ScanCommand {
    fn as_str(self) -> &'static str {
        match self {
            Self::Instream => "instream",
            Self::Scan => "scan",
        }
    }
}

/// Audit record for one scan call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    /// `scan_completed` or `scan_failed`.
    pub event_type: String,

    /// When the scan finished.
    pub timestamp: DateTime<Utc>,

    /// Unique scan ID.
    pub scan_id: String,

    /// Command used.
    pub command: ScanCommand,

    /// Daemon address.
    pub daemon: String,

    /// Classified status; absent when the call failed.
    pub status: Option<ScanStatus>,

    /// Matched signature, if infected.
    pub signature: Option<String>,

    /// Payload bytes streamed (INSTREAM only).
    pub bytes_sent: Option<u64>,

    /// Whether the client-side ceiling cut the stream short.
    pub truncated: bool,

    /// Scan duration in milliseconds.
    pub duration_ms: u64,

    /// Failure description, if the call failed.
    pub error: Option<String>,
}

impl ScanAuditEvent {
    /// Starts a record for a new scan with a fresh ID.
    pub fn new(command: ScanCommand, daemon: impl Into<String>) -> Self {
        Self {
            event_type: "scan_started".to_string(),
            timestamp: Utc::now(),
            scan_id: uuid::Uuid::new_v4().to_string(),
            command,
            daemon: daemon.into(),
            status: None,
            signature: None,
            bytes_sent: None,
            truncated: false,
            duration_ms: 0,
            error: None,
        }
    }

    /// Records streaming statistics.
    pub fn with_transfer(mut self, bytes_sent: u64, truncated: bool) -> Self {
        self.bytes_sent = Some(bytes_sent);
        self.truncated = truncated;
        self
    }

    /// Marks the scan as completed with the given classification.
    ///
    /// Transport and protocol failures go through [`failed`](Self::failed).
    pub fn completed(mut self, result: &ScanResult, elapsed: Duration) -> Self {
        self.event_type = "scan_completed".to_string();
        self.timestamp = Utc::now();
        self.status = Some(result.status());
        self.signature = result.signature().map(str::to_string);
        self.duration_ms = elapsed.as_millis() as u64;
        self
    }

    /// Marks the scan as failed.
    pub fn failed(mut self, error: &ScanError, elapsed: Duration) -> Self {
        self.event_type = "scan_failed".to_string();
        self.timestamp = Utc::now();
        self.status = None;
        self.error = Some(error.to_string());
        self.duration_ms = elapsed.as_millis() as u64;
        self
    }

    /// Renders the event as a JSON line for external sinks.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Emits an audit event for a scan starting.
pub fn emit_scan_started(event: &ScanAuditEvent) {
    tracing::debug!(
        target: "clamstream::audit",
        event_type = "scan_started",
        scan_id = %event.scan_id,
        command = event.command.as_str(),
        daemon = %event.daemon,
        "Scan started"
    );
}

/// Emits an audit event for a finished scan, completed or failed.
pub fn emit_scan_finished(event: &ScanAuditEvent) {
    let status = event.status.map(|s| s.to_string());
    if event.error.is_some() {
        tracing::warn!(
            target: "clamstream::audit",
            event_type = %event.event_type,
            scan_id = %event.scan_id,
            command = event.command.as_str(),
            daemon = %event.daemon,
            status = ?status,
            bytes_sent = ?event.bytes_sent,
            truncated = event.truncated,
            duration_ms = event.duration_ms,
            error = ?event.error,
            "Scan failed"
        );
    } else {
        tracing::info!(
            target: "clamstream::audit",
            event_type = %event.event_type,
            scan_id = %event.scan_id,
            command = event.command.as_str(),
            daemon = %event.daemon,
            status = ?status,
            signature = ?event.signature,
            bytes_sent = ?event.bytes_sent,
            truncated = event.truncated,
            duration_ms = event.duration_ms,
            "Scan completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_event_carries_signature() {
        let result = ScanResult::from_reply(b"stream: Eicar-Test-Signature FOUND\0");
        let event = ScanAuditEvent::new(ScanCommand::Instream, "127.0.0.1:3310")
            .with_transfer(68, false)
            .completed(&result, Duration::from_millis(12));

        assert_eq!(event.event_type, "scan_completed");
        assert_eq!(event.status, Some(ScanStatus::Found));
        assert_eq!(event.signature.as_deref(), Some("Eicar-Test-Signature"));
        assert_eq!(event.bytes_sent, Some(68));
        assert_eq!(event.duration_ms, 12);
        assert!(event.error.is_none());
    }

    #[test]
    fn test_completed_daemon_error_has_no_transport_error() {
        let result = ScanResult::from_reply(b"/srv/missing: No such file or directory. ERROR\n");
        let event = ScanAuditEvent::new(ScanCommand::Scan, "clamd:3310")
            .completed(&result, Duration::from_millis(2));

        assert_eq!(event.status, Some(ScanStatus::Error));
        assert!(event.signature.is_none());
        assert!(event.error.is_none());
    }

    #[test]
    fn test_failed_event() {
        let error = ScanError::SizeLimitExceeded {
            reply: "INSTREAM size limit exceeded. ERROR".into(),
        };
        let event = ScanAuditEvent::new(ScanCommand::Instream, "clamd:3310")
            .failed(&error, Duration::from_millis(3));

        assert_eq!(event.event_type, "scan_failed");
        assert!(event.status.is_none());
        assert!(event.error.unwrap().contains("size limit"));
    }

    #[test]
    fn test_event_json() {
        let result = ScanResult::from_reply(b"/srv/a.txt: OK\0");
        let event = ScanAuditEvent::new(ScanCommand::Scan, "clamd:3310")
            .completed(&result, Duration::from_millis(1));

        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["command"], "scan");
        assert_eq!(json["status"], "passed");
        assert_eq!(json["scan_id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_scan_ids_are_unique() {
        let a = ScanAuditEvent::new(ScanCommand::Scan, "clamd:3310");
        let b = ScanAuditEvent::new(ScanCommand::Scan, "clamd:3310");
        assert_ne!(a.scan_id, b.scan_id);
    }
}
