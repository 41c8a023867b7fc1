//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Body streams and inspection requests produce:
//!     → logging.rs (structured log events keyed by rid / inspect id)
//!     → metrics.rs (outcome counters, upload byte counter)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request identity flows through every log line
//! - Metrics are cheap and optional

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
