//! HTTP request metadata.
//!
//! # Data Flow
//! ```text
//! frontend packet
//!     → request.rs (method, path, headers)
//!     → body stream accessors / inspection request packet
//! ```

pub mod request;

pub use request::HttpRequestData;
