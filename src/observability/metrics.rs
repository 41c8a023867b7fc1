//! Metrics collection.
//!
//! # Metrics
//! - `gateway_body_streams_total` (counter): body streams by terminal outcome
//! - `gateway_body_bytes_total` (counter): body bytes pulled from upload files
//! - `gateway_inspect_requests_total` (counter): inspections by outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - `observability.metrics_enabled` decides whether the embedding process
//!   installs a recorder at all

use metrics::counter;

/// Record a body stream reaching its terminal state.
pub fn record_body_outcome(outcome: &'static str) {
    counter!("gateway_body_streams_total", "outcome" => outcome).increment(1);
}

/// Record bytes pulled out of an upload file.
pub fn record_upload_bytes(bytes: usize) {
    counter!("gateway_body_bytes_total").increment(bytes as u64);
}

/// Record an inspection request reaching its terminal state.
pub fn record_inspect_outcome(outcome: &'static str) {
    counter!("gateway_inspect_requests_total", "outcome" => outcome).increment(1);
}
