//! Inspection subsystem.
//!
//! # Data Flow
//! ```text
//! HttpRequestData (method, path, headers)
//!     → request.rs (InspectRequest::start, deferred send, timer armed)
//!     → manager.rs (write to inspection service, route reply by id)
//!     → request.rs (reply → InspectData, or timeout / unavailable)
//!     → owner pulls exactly one Finished | Error
//! ```
//!
//! # Design Decisions
//! - Ids are random UUIDs, unique per outstanding request
//! - No internal retries; the proxy layer decides what a failure means
//! - Timeout is fixed per request (`inspect.timeout_secs`)

pub mod manager;
pub mod request;
pub mod types;

pub use manager::{ChannelInspectManager, InspectManager};
pub use request::{InspectRequest, InspectState};
pub use types::{
    InspectData, InspectError, InspectEvent, InspectId, InspectRequestPacket, InspectResponsePacket,
    ReplySender,
};
