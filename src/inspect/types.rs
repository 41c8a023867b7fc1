//! Inspection ids, packets, results and errors.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Method};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::inspect::request::Turn;

/// Unique id of one outstanding inspection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InspectId(Uuid);

impl InspectId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InspectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound message to the inspection service.
#[derive(Debug, Clone)]
pub struct InspectRequestPacket {
    pub id: InspectId,
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

/// Reply from the inspection service.
#[derive(Debug, Clone)]
pub struct InspectResponsePacket {
    pub id: InspectId,
    pub no_proxy: bool,
    pub sharing_key: Bytes,
    pub user_data: serde_json::Value,
}

/// Proxying policy returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectData {
    pub allow_proxying: bool,
    pub sharing_key: Bytes,
    pub user_data: serde_json::Value,
}

impl From<InspectResponsePacket> for InspectData {
    fn from(packet: InspectResponsePacket) -> Self {
        Self {
            allow_proxying: !packet.no_proxy,
            sharing_key: packet.sharing_key,
            user_data: packet.user_data,
        }
    }
}

/// Why an inspection produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InspectError {
    /// The channel to the inspection service could not take a write.
    #[error("inspection service unavailable")]
    Unavailable,

    /// No reply arrived before the deadline.
    #[error("inspection request timed out")]
    Timeout,
}

/// Terminal event of an inspection request. Exactly one is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum InspectEvent {
    Finished(InspectData),
    Error(InspectError),
}

/// Delivers a routed reply to the inspection request that is waiting for it.
#[derive(Debug, Clone)]
pub struct ReplySender {
    tx: mpsc::UnboundedSender<Turn>,
}

impl ReplySender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Turn>) -> Self {
        Self { tx }
    }

    /// Returns `false` if the request no longer exists.
    pub fn send(&self, reply: InspectResponsePacket) -> bool {
        self.tx.send(Turn::Reply(reply)).is_ok()
    }
}
