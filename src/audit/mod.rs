//! Structured audit logging.
//!
//! Every scan emits one event with target `clamstream::audit` through the
//! `tracing` crate, so any subscriber (JSON file, OpenTelemetry, ...) can
//! capture it. [`ScanAuditEvent`] is also serializable for sinks that
//! want the record itself.

mod events;

pub use events::{emit_scan_finished, emit_scan_started, ScanAuditEvent, ScanCommand};
