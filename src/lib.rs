//! Request lifecycle core for a reverse proxy gateway.
//!
//! ```text
//!     Frontend packet ──▶ body::FrontendRegistry ──▶ body::RequestBodyStream ──▶ proxy layer
//!                                                        │
//!                                              upload file + watch
//!
//!     HttpRequestData ──▶ inspect::InspectRequest ──▶ inspect::InspectManager ──▶ inspection service
//!                                  ▲                                                   │
//!                                  └──────────────── reply routed by id ◀──────────────┘
//! ```

pub mod body;
pub mod config;
pub mod http;
pub mod inspect;
pub mod observability;

pub use body::{FrontendRegistry, RequestBodyStream};
pub use config::GatewayConfig;
pub use inspect::{ChannelInspectManager, InspectRequest};
